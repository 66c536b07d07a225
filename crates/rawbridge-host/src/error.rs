//! Errors surfaced to hosts.

use rawbridge_core::{EngineError, ErrorCode, UnknownCode};
use serde::Serialize;
use thiserror::Error;

/// Every failure a host can observe, synchronous or delivered through a
/// completion callback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Malformed or missing call arguments, rejected before any task exists.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted outside its lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The engine reported a non-success code.
    #[error("{message}")]
    Decode { code: i32, message: String },

    /// The file carries no embedded thumbnail.
    #[error("No thumbnail available")]
    NoThumbnail,

    /// The engine reported success but produced no usable buffer.
    #[error("No {0} data")]
    EmptyResult(&'static str),

    /// A job panicked on its worker thread.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// The processor context stopped accepting work.
    #[error("Processor context disconnected")]
    Disconnected,

    /// Host configuration could not be loaded or applied.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidArgument,
    InvalidState,
    Decode,
    NoThumbnail,
    EmptyResult,
    Worker,
    Disconnected,
    Config,
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BridgeError::InvalidState(_) => ErrorKind::InvalidState,
            BridgeError::Decode { .. } => ErrorKind::Decode,
            BridgeError::NoThumbnail => ErrorKind::NoThumbnail,
            BridgeError::EmptyResult(_) => ErrorKind::EmptyResult,
            BridgeError::Worker(_) => ErrorKind::Worker,
            BridgeError::Disconnected => ErrorKind::Disconnected,
            BridgeError::Config(_) => ErrorKind::Config,
        }
    }

    /// Wrap an engine failure as `"<prefix>: <strerror>"`.
    pub fn decode(prefix: &str, err: &EngineError) -> Self {
        BridgeError::Decode {
            code: err.code.code(),
            message: format!("{}: {}", prefix, err.code.strerror()),
        }
    }

    /// Engine code carried by a [`BridgeError::Decode`].
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            BridgeError::Decode { code, .. } => Some(ErrorCode::from(*code)),
            _ => None,
        }
    }
}

impl From<UnknownCode> for BridgeError {
    fn from(e: UnknownCode) -> Self {
        BridgeError::InvalidArgument(e.to_string())
    }
}
