//! Publish and consume pipelines of the courier event bus.
//!
//! `Publisher` encodes records and hands them to background lanes that
//! transmit through a `LogTransport`, resolving one `DeliveryHandle` per
//! submit. `ConsumerPipeline` runs one worker per partition: decode, handle,
//! commit, advance.

pub mod config;
pub mod consumer;
pub mod cursor;
pub mod error;
pub mod publisher;
pub mod retry;

pub use config::{ConsumerConfig, PublisherConfig};
pub use consumer::{
    ConsumerHandle, ConsumerPipeline, ConsumerReport, EventHandler, PartitionReport,
    PartitionState, PartitionStatus,
};
pub use cursor::ConsumptionCursor;
pub use error::{ConsumeError, EngineError, ProcessingError, SubmitError};
pub use publisher::{DeliveryHandle, Publisher};
pub use retry::Backoff;
