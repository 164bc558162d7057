use serprims_batch::BatchError;
use serprims_transport::TransportError;

/// Errors that can occur while writing or reading object graphs.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Batch or byte transport failure.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The stream contradicts itself: unknown handle, back-reference to an
    /// unshared object, array shape mismatch, out-of-order type code.
    #[error("corrupt object stream: {0}")]
    Corrupt(String),

    /// A type name read off the wire matched neither the registry nor the
    /// fallback resolver.
    #[error("cannot resolve type {name:?}")]
    TypeResolution { name: String },

    /// An object being written names a type the registry does not know.
    #[error("type {0:?} is not registered")]
    UnregisteredType(String),

    /// An object rejected a field access.
    #[error("field error on {type_name}: {reason}")]
    Field { type_name: String, reason: String },

    /// The object or type does not support the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl GraphError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        GraphError::Corrupt(reason.into())
    }

    pub fn field(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::Field {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// True when the stream can no longer be read or written in step with
    /// its peer.
    pub fn is_fatal(&self) -> bool {
        match self {
            GraphError::Corrupt(_) => true,
            GraphError::Batch(err) => err.is_protocol() || matches!(err, BatchError::Transport(_)),
            GraphError::TypeResolution { .. }
            | GraphError::UnregisteredType(_)
            | GraphError::Field { .. }
            | GraphError::Unsupported(_) => false,
        }
    }

    /// True when the source ran dry mid-request.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, GraphError::Batch(err) if err.is_end_of_stream())
    }
}

impl From<TransportError> for GraphError {
    fn from(err: TransportError) -> Self {
        GraphError::Batch(BatchError::Transport(err))
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
