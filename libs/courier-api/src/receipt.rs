use crate::error::TransmissionError;
use crate::transport::Ack;

/// Terminal outcome of one submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Acknowledged,
    Failed(TransmissionError),
}

/// Result of a publish attempt. Produced exactly once per submit and handed
/// to the caller's delivery handle; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub event_id: String,
    /// Partition assigned by the log (set only on success).
    pub partition: Option<u32>,
    /// Offset assigned by the log (set only on success).
    pub offset: Option<u64>,
    pub outcome: Outcome,
    /// Number of transmission attempts made, 0 if none was made.
    pub attempts: u32,
}

impl DeliveryReceipt {
    pub fn acknowledged(event_id: impl Into<String>, ack: Ack, attempts: u32) -> Self {
        Self {
            event_id: event_id.into(),
            partition: Some(ack.partition),
            offset: Some(ack.offset),
            outcome: Outcome::Acknowledged,
            attempts,
        }
    }

    pub fn failed(event_id: impl Into<String>, reason: TransmissionError, attempts: u32) -> Self {
        Self {
            event_id: event_id.into(),
            partition: None,
            offset: None,
            outcome: Outcome::Failed(reason),
            attempts,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self.outcome, Outcome::Acknowledged)
    }

    /// The failure reason, if the delivery failed.
    pub fn failure(&self) -> Option<&TransmissionError> {
        match &self.outcome {
            Outcome::Failed(reason) => Some(reason),
            Outcome::Acknowledged => None,
        }
    }
}
