use serprims_transport::TransportError;

/// Errors that can occur while reading or writing typed batches.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The byte transport below failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reader and writer disagree on batch boundaries. The reader is
    /// poisoned afterwards.
    #[error("batch stream desynchronized: {reason}")]
    Desync { reason: String },

    /// A batch index record carried an impossible count.
    #[error("invalid batch index: slot {slot} holds {value}")]
    InvalidIndex { slot: usize, value: i32 },

    /// A length-prefixed string was not valid modified UTF-8.
    #[error("invalid modified UTF-8 string: {0}")]
    InvalidUtf(String),

    /// An earlier desynchronization left the reader unusable.
    #[error("batch reader poisoned by an earlier protocol failure")]
    Poisoned,
}

impl BatchError {
    /// True when the source ran dry mid-request.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, BatchError::Transport(err) if err.is_end_of_stream())
    }

    /// True for failures that leave the stream position unknown.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            BatchError::Desync { .. } | BatchError::InvalidIndex { .. } | BatchError::Poisoned
        )
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
