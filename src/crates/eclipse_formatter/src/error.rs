use std::io;

use thiserror::Error;

/// Result alias for formatter operations.
pub type FormatterResult<T> = Result<T, FormatterError>;

/// Errors that can occur while configuring the formatter or exchanging frames.
///
/// The transport never returns these to its callers; faults after
/// construction are logged and turn the session into a no-op.
#[derive(Debug, Error)]
pub enum FormatterError {
    #[error(
        "port not specified; set CUCUMBER_ECLIPSE_PORT or pass -D cucumber_eclipse_port=<port>"
    )]
    MissingPort,
    #[error("invalid port number: {0}")]
    InvalidPort(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("frame payload of {0} bytes does not fit a u32 length prefix")]
    FrameTooLarge(usize),
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),
    #[error("peer connection closed")]
    ConnectionClosed,
    #[error("endpoint thread panicked")]
    EndpointPanicked,
}

impl FormatterError {
    pub(crate) fn unexpected(message: impl Into<String>) -> Self {
        FormatterError::UnexpectedFrame(message.into())
    }

    /// Whether the error belongs to the configuration class (no usable port).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FormatterError::MissingPort | FormatterError::InvalidPort(_)
        )
    }
}
