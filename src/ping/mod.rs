pub mod legacy;
pub mod modern;
