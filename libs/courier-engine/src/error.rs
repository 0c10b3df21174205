use courier_api::TransportError;
use courier_codec::{DecodingError, EncodingError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config: {0}")]
    Config(String),

    #[error("runtime: {0}")]
    Runtime(String),
}

/// Synchronous rejection of a submit. Nothing was transmitted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("record id is empty")]
    EmptyId,
}

/// Failure reported by an application handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProcessingError {
    pub message: String,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ProcessingError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ProcessingError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Why a partition worker stopped.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConsumeError {
    #[error("subscribe {topic} as '{group}': {source}")]
    Subscribe {
        topic: String,
        group: String,
        source: TransportError,
    },

    #[error("decode {topic}/{partition}@{offset}: {source}")]
    Decode {
        topic: String,
        partition: u32,
        offset: u64,
        source: DecodingError,
    },

    #[error("handler failed on {topic}/{partition}@{offset}: {source}")]
    Processing {
        topic: String,
        partition: u32,
        offset: u64,
        source: ProcessingError,
    },

    #[error("commit {topic}/{partition}@{offset}: {source}")]
    Commit {
        topic: String,
        partition: u32,
        offset: u64,
        source: TransportError,
    },

    #[error("partition {0} worker panicked")]
    WorkerPanicked(u32),
}

impl ConsumeError {
    /// Offset of the record the worker stopped on, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            ConsumeError::Decode { offset, .. }
            | ConsumeError::Processing { offset, .. }
            | ConsumeError::Commit { offset, .. } => Some(*offset),
            ConsumeError::Subscribe { .. } | ConsumeError::WorkerPanicked(_) => None,
        }
    }
}
