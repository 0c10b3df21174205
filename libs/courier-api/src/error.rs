use std::time::Duration;

use crate::schema::SchemaId;

// ═══════════════════════════════════════════════════════════════
//  Schema source errors
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema {0} not found")]
    NotFound(SchemaId),

    #[error("subject '{0}' not found")]
    SubjectNotFound(String),

    #[error("subject '{subject}' has no version {version}")]
    VersionNotFound { subject: String, version: u32 },

    #[error("invalid schema for '{subject}': {reason}")]
    Invalid { subject: String, reason: String },

    #[error("schema for '{0}' is not a record")]
    NotARecord(String),

    #[error("incompatible schema for '{subject}': {reason}")]
    Incompatible { subject: String, reason: String },

    #[error("read '{path}': {reason}")]
    Io { path: String, reason: String },
}

// ═══════════════════════════════════════════════════════════════
//  Transport errors reported by a LogTransport
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("partition {partition} out of range for topic '{topic}'")]
    PartitionOutOfRange { topic: String, partition: u32 },

    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("commit rejected: {0}")]
    Commit(String),

    #[error("group '{group}' already has an active subscriber on topic '{topic}'")]
    GroupBusy { topic: String, group: String },

    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Unreachable(_))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Transmission errors, the FAILED reason of a delivery receipt
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmissionError {
    #[error("transmission timed out after {0:?}")]
    Timeout(Duration),

    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("rejected by log: {0}")]
    Rejected(String),

    #[error("publisher queue full")]
    QueueFull,

    #[error("publisher shut down before delivery")]
    Shutdown,
}

impl TransmissionError {
    /// Timeouts and unreachable brokers are retried under a retry policy;
    /// everything else fails the receipt immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransmissionError::Timeout(_) | TransmissionError::Unreachable(_)
        )
    }
}

impl From<TransportError> for TransmissionError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unreachable(cause) => TransmissionError::Unreachable(cause),
            TransportError::Closed => TransmissionError::Unreachable("transport closed".into()),
            other => TransmissionError::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_mapping() {
        let unreachable = TransmissionError::from(TransportError::Unreachable("down".into()));
        assert_eq!(unreachable, TransmissionError::Unreachable("down".into()));
        assert!(unreachable.is_transient());

        let rejected = TransmissionError::from(TransportError::TopicNotFound("events".into()));
        assert_eq!(
            rejected,
            TransmissionError::Rejected("topic 'events' not found".into())
        );
        assert!(!rejected.is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(TransmissionError::Timeout(Duration::from_millis(10)).is_transient());
        assert!(!TransmissionError::QueueFull.is_transient());
        assert!(!TransmissionError::Shutdown.is_transient());
    }
}
