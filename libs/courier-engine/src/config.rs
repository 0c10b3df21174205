use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

// ═══════════════════════════════════════════════════════════════
//  Publisher Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    /// Topic every submitted record is appended to.
    pub topic: String,
    /// Extra attempts after a transient transmission failure.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Upper bound of a single transmission attempt.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Pending records per lane before submits fail with `QueueFull`.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of sequential transmit lanes. A key always maps to one lane.
    #[serde(default = "default_lanes")]
    pub lanes: usize,
}

fn default_backoff_ms() -> u64 {
    100
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_delivery_timeout_ms() -> u64 {
    5_000
}
fn default_queue_capacity() -> usize {
    4096
}
fn default_lanes() -> usize {
    1
}

impl PublisherConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            max_retries: 0,
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            lanes: default_lanes(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.topic.trim().is_empty() {
            return Err(EngineError::Config("publisher topic is empty".into()));
        }
        if self.delivery_timeout_ms == 0 {
            return Err(EngineError::Config("delivery_timeout_ms must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::Config("queue_capacity must be positive".into()));
        }
        if self.lanes == 0 {
            return Err(EngineError::Config("lanes must be positive".into()));
        }
        if self.backoff_ms > self.max_backoff_ms {
            return Err(EngineError::Config("backoff_ms exceeds max_backoff_ms".into()));
        }
        Ok(())
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Consumer Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    pub topic: String,
    /// Consumer group; committed offsets are tracked per group.
    pub group: String,
    /// In-place handler retries before the partition is marked failed.
    #[serde(default)]
    pub handler_retries: u32,
    #[serde(default = "default_handler_backoff_ms")]
    pub handler_backoff_ms: u64,
    #[serde(default = "default_max_handler_backoff_ms")]
    pub max_handler_backoff_ms: u64,
}

fn default_handler_backoff_ms() -> u64 {
    100
}
fn default_max_handler_backoff_ms() -> u64 {
    5_000
}

impl ConsumerConfig {
    pub fn new(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            handler_retries: 0,
            handler_backoff_ms: default_handler_backoff_ms(),
            max_handler_backoff_ms: default_max_handler_backoff_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.topic.trim().is_empty() {
            return Err(EngineError::Config("consumer topic is empty".into()));
        }
        if self.group.trim().is_empty() {
            return Err(EngineError::Config("consumer group is empty".into()));
        }
        if self.handler_backoff_ms > self.max_handler_backoff_ms {
            return Err(EngineError::Config(
                "handler_backoff_ms exceeds max_handler_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn handler_backoff(&self) -> Duration {
        Duration::from_millis(self.handler_backoff_ms)
    }

    pub fn max_handler_backoff(&self) -> Duration {
        Duration::from_millis(self.max_handler_backoff_ms)
    }
}
