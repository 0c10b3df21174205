use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::TransportError;

// ═══════════════════════════════════════════════════════════════
//  Log positions
// ═══════════════════════════════════════════════════════════════

/// Position assigned by the log to an appended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub partition: u32,
    pub offset: u64,
}

/// Where a delivered record sits in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    /// Append time in unix ms.
    pub timestamp_ms: i64,
}

/// One record read from a partition: raw payload plus its position.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub meta: RecordMeta,
}

// ═══════════════════════════════════════════════════════════════
//  PartitionStream
// ═══════════════════════════════════════════════════════════════

/// Ordered feed of one partition for one consumer group.
///
/// Starts at the group's committed offset (or the beginning of the partition
/// when nothing was committed) and yields records in offset order.
pub trait PartitionStream: Send {
    fn partition(&self) -> u32;

    /// Last offset committed by the group when the stream was opened.
    fn committed(&self) -> Option<u64>;

    /// Next record. Waits for new appends; `None` once the transport closes.
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<Delivery>> + Send + '_>>;
}

// ═══════════════════════════════════════════════════════════════
//  LogTransport
// ═══════════════════════════════════════════════════════════════

/// Partitioned, append-only log the engine publishes to and consumes from.
///
/// Implementations decide the partition of a keyed record; records with the
/// same key must land on the same partition.
pub trait LogTransport: Send + Sync {
    /// Append one payload and wait for the log's acknowledgement.
    ///
    /// `deadline` is advisory; callers enforce their own timeout as well.
    fn transmit(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Ack, TransportError>> + Send + '_>>;

    /// Open one stream per partition of `topic` for consumer group `group`.
    fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Box<dyn PartitionStream>>, TransportError>> + Send + '_>>;

    /// Record `offset` as the last processed offset of `group` on a partition.
    fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: u32,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;
}
