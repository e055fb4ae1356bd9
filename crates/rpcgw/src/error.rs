//! Error types for the gateway RPC bind core

use thiserror::Error;

/// Errors surfaced by the secure bind core.
///
/// All of these are terminal for the virtual connection; the caller decides
/// whether to tear down and re-establish. `Cancelled` is a user-initiated
/// abort rather than a protocol failure and is expected to be matched on.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("buffer allocation failed ({0} bytes)")]
    AllocFailure(usize),

    #[error("security context could not be established")]
    AuthOracleInitFailed,

    #[error("malformed PDU: {0}")]
    MalformedPdu(String),

    #[error("channel I/O error: {0}")]
    ChannelIoError(std::io::Error),

    #[error("duplicate call id {0} in registry")]
    DuplicateCall(u32),

    #[error("unknown call id {0}")]
    UnknownCall(u32),

    #[error("cancelled")]
    Cancelled,

    #[error("timeout waiting for response")]
    Timeout,
}

impl BindError {
    /// Wrap an error coming back from a channel operation.
    ///
    /// An `Interrupted` read or write is how the host signals cancellation
    /// through the byte pipes; everything else is a transport failure.
    pub fn channel(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::Interrupted {
            BindError::Cancelled
        } else {
            BindError::ChannelIoError(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, BindError>;
