use thiserror::Error;

/// A common error type.
///
/// Packet-level errors (`MalformedLine`, `UnknownCode`, `CorruptPayload`) are
/// local to one packet: the pipeline logs them and keeps running. Entity-level
/// errors (`CorruptState`, `MultipleControllers`) surface to the caller that
/// triggered the mutation and are not retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The line failed framing or structural validation.
    #[error("malformed line: {0}")]
    MalformedLine(String),

    /// No decoder is registered for the packet code.
    #[error("unknown packet code: {0:04X}")]
    UnknownCode(u16),

    /// The payload failed a decoder's length/range assertions.
    #[error("the payload is inconsistent: {0} (check any RQ)")]
    CorruptPayload(String),

    /// An immutable relation of the entity graph contradicts a prior value.
    #[error("the system state is inconsistent: {0} (try restarting the client library)")]
    CorruptState(String),

    /// A second controller appeared on the same gateway.
    #[error("there is more than one controller: {0} (use an allow/block list to prevent this)")]
    MultipleControllers(String),

    /// A registered QoS callback outlived its deadline without a match.
    #[error("the callback expired before a reply was received: {0}")]
    ExpiredCallback(String),

    /// A schedule or fault-log operation exceeded its overall deadline.
    #[error("the operation timed out: {0}")]
    Timeout(String),

    /// The installation schema or a filter list failed validation.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// An I/O error on the serial line or a log file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A common result type.
pub type Result<T> = std::result::Result<T, Error>;
