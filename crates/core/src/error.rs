use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Every variant is recoverable: the operation that produced it left show
/// state untouched (or, for transport failures, degraded only the device
/// that failed).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{what} out of range: {value}")]
    InvalidRange { what: &'static str, value: String },

    #[error("{0} already in progress")]
    AlreadyInProgress(&'static str),

    #[error("transport failure on {target}: {message}")]
    TransportFailure { target: String, message: String },

    #[error("show console is not running")]
    ConsoleClosed,
}

impl EngineError {
    pub fn cue_not_found(number: u32) -> Self {
        EngineError::NotFound {
            kind: "cue",
            id: number.to_string(),
        }
    }

    pub fn timeline_not_found(name: &str) -> Self {
        EngineError::NotFound {
            kind: "timeline",
            id: name.to_string(),
        }
    }

    pub fn invalid_range(what: &'static str, value: impl ToString) -> Self {
        EngineError::InvalidRange {
            what,
            value: value.to_string(),
        }
    }

    pub fn transport(target: impl Into<String>, err: TransportError) -> Self {
        EngineError::TransportFailure {
            target: target.into(),
            message: err.to_string(),
        }
    }
}

/// Error returned by external collaborators (DMX, MIDI, audio, video).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("device {0} not connected")]
    NotConnected(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::SendFailed(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
