//! In-memory partitioned append-only log implementing `LogTransport`.
//!
//! Each topic has a fixed number of partitions. A partition keeps at most
//! `max_records` records; older ones fall off the front while offsets keep
//! increasing. Committed offsets are kept per consumer group and only move
//! forward.
//!
//! A group has at most one active subscriber per topic. That subscriber owns
//! every partition until all of its streams are dropped; a second
//! `subscribe` for the same group fails with `TransportError::GroupBusy`.

mod partition;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::time::Duration;

use courier_api::{Ack, LogTransport, PartitionStream, TransportError, hash_key};
use tokio_util::sync::CancellationToken;

use partition::{MemoryStream, Partition};

// ═══════════════════════════════════════════════════════════════
//  TopicSpec
// ═══════════════════════════════════════════════════════════════

fn default_partitions() -> u32 {
    3
}

fn default_max_records() -> usize {
    100_000
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TopicSpec {
    pub name: String,
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// Retention cap per partition.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: u32) -> Self {
        Self {
            name: name.into(),
            partitions,
            max_records: default_max_records(),
        }
    }
}

/// Partition for `key` among `partitions` partitions.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    (hash_key(key) % u64::from(partitions.max(1))) as u32
}

// ═══════════════════════════════════════════════════════════════
//  MemoryLog
// ═══════════════════════════════════════════════════════════════

/// Claim of one group on a topic, shared by the streams of a subscription.
pub(crate) struct Membership {
    topic: String,
    group: String,
    topic_log: Arc<TopicLog>,
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.topic_log.members().remove(&self.group);
        tracing::debug!(topic = %self.topic, group = %self.group, "subscription released");
    }
}

struct TopicLog {
    partitions: Vec<Arc<Partition>>,
    /// Groups with an active subscriber.
    members: Mutex<HashSet<String>>,
}

impl TopicLog {
    fn members(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.members.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("topic member lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn partition(&self, topic: &str, index: u32) -> Result<&Arc<Partition>, TransportError> {
        self.partitions
            .get(index as usize)
            .ok_or_else(|| TransportError::PartitionOutOfRange {
                topic: topic.to_string(),
                partition: index,
            })
    }
}

pub struct MemoryLog {
    topics: RwLock<HashMap<String, Arc<TopicLog>>>,
    closed: CancellationToken,
}

impl std::fmt::Debug for MemoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLog")
            .field("topics", &self.topics())
            .finish()
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            closed: CancellationToken::new(),
        }
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topic. Registering an existing name replaces nothing.
    pub fn register(&self, spec: TopicSpec) {
        let partitions = spec.partitions.max(1);
        let mut guard = match self.topics.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("log topic map write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if guard.contains_key(&spec.name) {
            tracing::warn!(topic = %spec.name, "topic already registered, keeping existing");
            return;
        }
        let topic = TopicLog {
            partitions: (0..partitions)
                .map(|i| Arc::new(Partition::new(i, spec.max_records)))
                .collect(),
            members: Mutex::new(HashSet::new()),
        };
        tracing::info!(
            topic = %spec.name,
            partitions,
            max_records = spec.max_records,
            "topic registered"
        );
        guard.insert(spec.name, Arc::new(topic));
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<TopicLog>>> {
        match self.topics.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("log topic map read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn topic(&self, name: &str) -> Result<Arc<TopicLog>, TransportError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::TopicNotFound(name.to_string()))
    }

    /// Registered topics with their partition counts, sorted by name.
    pub fn topics(&self) -> Vec<(String, u32)> {
        let mut topics: Vec<(String, u32)> = self
            .read()
            .iter()
            .map(|(name, t)| (name.clone(), t.partitions.len() as u32))
            .collect();
        topics.sort();
        topics
    }

    pub fn partition_count(&self, topic: &str) -> Option<u32> {
        self.topic(topic).ok().map(|t| t.partitions.len() as u32)
    }

    /// Last committed offset of `group` on a partition.
    pub fn committed(&self, topic: &str, group: &str, partition: u32) -> Option<u64> {
        let topic_log = self.topic(topic).ok()?;
        let part = topic_log.partition(topic, partition).ok()?;
        part.committed(group)
    }

    /// Offset the next appended record on a partition will get.
    pub async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64, TransportError> {
        let topic_log = self.topic(topic)?;
        let part = topic_log.partition(topic, partition)?;
        Ok(part.end_offset().await)
    }

    /// Stop accepting appends and end every open stream.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl LogTransport for MemoryLog {
    fn transmit(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        _deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Ack, TransportError>> + Send + '_>> {
        let topic = topic.to_string();
        let key = key.to_string();
        Box::pin(async move {
            if self.is_closed() {
                return Err(TransportError::Closed);
            }
            let topic_log = self.topic(&topic)?;
            let index = partition_for(&key, topic_log.partitions.len() as u32);
            let part = topic_log.partition(&topic, index)?;
            let offset = part.append(payload).await;
            tracing::trace!(topic = %topic, partition = index, offset, "appended");
            Ok(Ack { partition: index, offset })
        })
    }

    fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Box<dyn PartitionStream>>, TransportError>> + Send + '_>>
    {
        let topic = topic.to_string();
        let group = group.to_string();
        Box::pin(async move {
            if self.is_closed() {
                return Err(TransportError::Closed);
            }
            let topic_log = self.topic(&topic)?;
            if !topic_log.members().insert(group.clone()) {
                return Err(TransportError::GroupBusy { topic, group });
            }
            let membership = Arc::new(Membership {
                topic: topic.clone(),
                group: group.clone(),
                topic_log: topic_log.clone(),
            });

            let mut streams: Vec<Box<dyn PartitionStream>> =
                Vec::with_capacity(topic_log.partitions.len());
            for part in &topic_log.partitions {
                let stream = MemoryStream::open(
                    &topic,
                    &group,
                    part.clone(),
                    self.closed.clone(),
                    membership.clone(),
                )
                .await;
                streams.push(Box::new(stream));
            }
            tracing::debug!(topic = %topic, group = %group, partitions = streams.len(), "subscribed");
            Ok(streams)
        })
    }

    fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: u32,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let topic = topic.to_string();
        let group = group.to_string();
        Box::pin(async move {
            let topic_log = self.topic(&topic)?;
            let part = topic_log.partition(&topic, partition)?;
            let end = part.end_offset().await;
            if offset >= end {
                return Err(TransportError::Commit(format!(
                    "offset {offset} is beyond the end of partition {partition} ({end})"
                )));
            }
            part.set_committed(&group, offset).map_err(|current| {
                TransportError::Commit(format!(
                    "offset {offset} is behind the committed offset {current} of group '{group}' on partition {partition}"
                ))
            })
        })
    }
}
