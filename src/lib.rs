//! Minecraft server status probe.
//!
//! Speaks the server's own wire protocols and returns a normalized
//! [ServerStatus] record: the pre-1.7 and 1.7+
//! [Server List Ping](https://wiki.vg/Server_List_Ping) over TCP and the
//! UT3-derived [Query](https://wiki.vg/Query) protocol (basic and full
//! stat) over UDP.
//!
//! All I/O is synchronous and blocking, bounded by a per-probe timeout;
//! one connection per probe, no retries. Use [Conf] for direct calls that
//! surface [McstatError], or the [Status] dispatcher when a `None`
//! sentinel plus recorded history suits a monitoring loop better.

mod conf;
mod error;
mod ping;
mod query;
mod share;
mod status;
mod varint;

pub use conf::{Conf, DEFAULT_TIMEOUT};
pub use error::McstatError;
pub use status::{
    probe, DebugPayload, ProbeMethod, ProbeOutcome, ProbeRecord, ServerStatus, Status,
};
