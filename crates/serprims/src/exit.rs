use std::fmt;
use std::io;

use serprims_batch::BatchError;
use serprims_graph::GraphError;
use serprims_transport::TransportError;

// Exit codes follow sysexits-style semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_INVALID: i32 = 78;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::EndOfStream { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: truncated stream: {err}"))
        }
        TransportError::ConnectionClosed | TransportError::FanOut(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn batch_error(context: &str, err: BatchError) -> CliError {
    match err {
        BatchError::Transport(err) => transport_error(context, err),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn graph_error(context: &str, err: GraphError) -> CliError {
    match err {
        GraphError::Batch(err) => batch_error(context, err),
        GraphError::Corrupt(_) | GraphError::TypeResolution { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_stream_is_invalid_data() {
        let err = GraphError::from(TransportError::EndOfStream { needed: 36, got: 4 });
        assert_eq!(graph_error("read", err).code, DATA_INVALID);
    }

    #[test]
    fn desync_is_invalid_data() {
        let err = GraphError::Batch(BatchError::Desync {
            reason: "lane mismatch".into(),
        });
        let mapped = graph_error("read", err);
        assert_eq!(mapped.code, DATA_INVALID);
        assert!(mapped.message.contains("lane mismatch"));
    }

    #[test]
    fn permission_denied_keeps_its_code() {
        let err = TransportError::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(transport_error("open", err).code, PERMISSION_DENIED);
    }

    #[test]
    fn unregistered_type_is_internal() {
        let err = GraphError::UnregisteredType("x".into());
        assert_eq!(graph_error("write", err).code, INTERNAL);
    }
}
