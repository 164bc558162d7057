use crate::splitter::FanOutError;

/// Errors that can occur in byte transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying source or sink.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source was exhausted before the requested bytes arrived.
    #[error("end of stream ({got} of {needed} bytes available)")]
    EndOfStream { needed: usize, got: usize },

    /// The sink accepted zero bytes.
    #[error("connection closed (sink accepted no bytes)")]
    ConnectionClosed,

    /// The stream does not support this kind of write or read.
    #[error("operation not supported by this stream: {0}")]
    Unsupported(&'static str),

    /// One or more fan-out destinations failed.
    #[error(transparent)]
    FanOut(#[from] FanOutError),
}

impl TransportError {
    /// True when the source ran dry mid-request.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TransportError::EndOfStream { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
