use std::io;

/// Probe errors. One variant per failure kind a protocol run can hit.
///
/// Protocol implementations always fail loudly with one of these; only the
/// [Status](crate::Status) dispatcher downgrades them to a sentinel.
#[derive(Debug, thiserror::Error)]
pub enum McstatError {
    /// The socket could not be opened or the target did not resolve.
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    /// No data arrived before the configured deadline.
    #[error("connection timed out")]
    Timeout,

    /// Fewer bytes than required arrived before the stream ended.
    #[error("short read: wanted {want} bytes, got {got}")]
    ShortRead { want: usize, got: usize },

    /// The stream or datagram ended before the response was complete.
    #[error("truncated response")]
    Truncated,

    /// An expected byte literal did not match the received bytes.
    #[error("expected {expected} but received {received}, problem byte: {byte:02x} (position {position})")]
    ProtocolMismatch {
        expected: String,
        received: String,
        byte: u8,
        position: usize,
    },

    /// Handshake response type or session id did not match the request.
    #[error("bad handshake response: {0}")]
    BadHandshake(String),

    /// Stat response type or session id did not match the request.
    #[error("bad query response: {0}")]
    BadQueryResponse(String),

    /// Server List Ping response did not follow the protocol.
    #[error("bad reply from server: {0}")]
    BadReply(String),

    /// A VarInt did not terminate within its 5 byte maximum.
    #[error("VarInt too big")]
    VarIntTooLong,

    /// A null-terminated string exceeded the read bound.
    #[error("string not terminated within {limit} bytes")]
    StringTooLong { limit: usize },

    /// The modern ping status body was not parseable as JSON.
    #[error("malformed status JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// A response field could not be converted to its expected type.
    #[error("malformed field: {0}")]
    MalformedField(String),

    /// Any other socket error.
    #[error("i/o error: {0}")]
    Io(io::Error),
}

impl McstatError {
    /// Stable label for this error kind, recorded in probe history.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Timeout => "timeout",
            Self::ShortRead { .. } => "short_read",
            Self::Truncated => "truncated",
            Self::ProtocolMismatch { .. } => "protocol_mismatch",
            Self::BadHandshake(_) => "bad_handshake",
            Self::BadQueryResponse(_) => "bad_query_response",
            Self::BadReply(_) => "bad_reply",
            Self::VarIntTooLong => "varint_too_long",
            Self::StringTooLong { .. } => "string_too_long",
            Self::MalformedJson(_) => "malformed_json",
            Self::MalformedField(_) => "malformed_field",
            Self::Io(_) => "io",
        }
    }
}

impl From<io::Error> for McstatError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            // Timed-out reads surface as WouldBlock on some platforms.
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => McstatError::Timeout,
            io::ErrorKind::UnexpectedEof => McstatError::Truncated,
            _ => McstatError::Io(err),
        }
    }
}

impl From<std::num::ParseIntError> for McstatError {
    fn from(err: std::num::ParseIntError) -> Self {
        McstatError::MalformedField(err.to_string())
    }
}
