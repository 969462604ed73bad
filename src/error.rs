//! Error taxonomy for the ingestion pipeline
//!
//! Every ingestion-path failure is contained to one connection or one flush.
//! Only `Bind` and `Config` are fatal, and only at startup.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::codec::Codec;

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Coarse classification of an [`IngestError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedRequest,
    DecodeFailure,
    EncodeFailure,
    CorruptStore,
    StoreAccessDenied,
    Bind,
    Config,
    Io,
}

/// Errors that can occur while ingesting, buffering or persisting events
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("{codec} decode failure: {reason}")]
    DecodeFailure { codec: Codec, reason: String },

    #[error("{codec} encode failure: {reason}")]
    EncodeFailure { codec: Codec, reason: String },

    #[error("corrupt store at {}: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("store access denied at {}: {source}", .path.display())]
    StoreAccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IngestError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            IngestError::DecodeFailure { .. } => ErrorKind::DecodeFailure,
            IngestError::EncodeFailure { .. } => ErrorKind::EncodeFailure,
            IngestError::CorruptStore { .. } => ErrorKind::CorruptStore,
            IngestError::StoreAccessDenied { .. } => ErrorKind::StoreAccessDenied,
            IngestError::Bind { .. } => ErrorKind::Bind,
            IngestError::Config(_) => ErrorKind::Config,
            IngestError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether a flush that failed with this error should keep its batch
    /// for another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::StoreAccessDenied | ErrorKind::Io)
    }

    pub(crate) fn store_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IngestError::StoreAccessDenied {
            path: path.into(),
            source,
        }
    }
}
