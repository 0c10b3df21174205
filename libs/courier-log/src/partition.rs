use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use courier_api::{Delivery, PartitionStream, RecordMeta, now_ms};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::Membership;

// ═══════════════════════════════════════════════════════════════
//  PartitionLog
// ═══════════════════════════════════════════════════════════════

struct Stored {
    payload: Vec<u8>,
    timestamp_ms: i64,
}

/// Ring buffer of records. `base` is the offset of the oldest retained one.
struct PartitionLog {
    base: u64,
    records: VecDeque<Stored>,
    max_records: usize,
}

impl PartitionLog {
    fn end(&self) -> u64 {
        self.base + self.records.len() as u64
    }

    fn get(&self, offset: u64) -> Option<&Stored> {
        let idx = offset.checked_sub(self.base)?;
        self.records.get(usize::try_from(idx).ok()?)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Partition
// ═══════════════════════════════════════════════════════════════

pub(crate) struct Partition {
    index: u32,
    log: RwLock<PartitionLog>,
    /// End offset, bumped after every append to wake waiting readers.
    end_tx: watch::Sender<u64>,
    /// Committed offset per consumer group.
    cursors: Mutex<HashMap<String, u64>>,
}

impl Partition {
    pub(crate) fn new(index: u32, max_records: usize) -> Self {
        let (end_tx, _) = watch::channel(0);
        Self {
            index,
            log: RwLock::new(PartitionLog {
                base: 0,
                records: VecDeque::with_capacity(max_records.min(4096)),
                max_records: max_records.max(1),
            }),
            end_tx,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }

    /// Append one record and return its offset.
    pub(crate) async fn append(&self, payload: Vec<u8>) -> u64 {
        let (offset, end) = {
            let mut log = self.log.write().await;
            let offset = log.end();
            log.records.push_back(Stored {
                payload,
                timestamp_ms: now_ms(),
            });
            if log.records.len() > log.max_records {
                log.records.pop_front();
                log.base += 1;
            }
            (offset, log.end())
        };
        self.end_tx.send_replace(end);
        offset
    }

    pub(crate) async fn end_offset(&self) -> u64 {
        self.log.read().await.end()
    }

    pub(crate) async fn base_offset(&self) -> u64 {
        self.log.read().await.base
    }

    fn cursors(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        match self.cursors.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(partition = self.index, "cursor lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub(crate) fn committed(&self, group: &str) -> Option<u64> {
        self.cursors().get(group).copied()
    }

    /// Store `offset` for `group` unless it lies behind the current commit.
    /// Re-committing the current offset is a no-op. Returns the committed
    /// offset that refused the update.
    pub(crate) fn set_committed(&self, group: &str, offset: u64) -> Result<(), u64> {
        let mut cursors = self.cursors();
        match cursors.get(group) {
            Some(&current) if offset < current => Err(current),
            _ => {
                cursors.insert(group.to_string(), offset);
                Ok(())
            }
        }
    }

    fn watch_end(&self) -> watch::Receiver<u64> {
        self.end_tx.subscribe()
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStream
// ═══════════════════════════════════════════════════════════════

pub(crate) struct MemoryStream {
    topic: String,
    group: String,
    partition: Arc<Partition>,
    next: u64,
    committed: Option<u64>,
    end_rx: watch::Receiver<u64>,
    closed: CancellationToken,
    /// Released once every stream of the subscription is dropped.
    _membership: Arc<Membership>,
}

impl MemoryStream {
    pub(crate) async fn open(
        topic: &str,
        group: &str,
        partition: Arc<Partition>,
        closed: CancellationToken,
        membership: Arc<Membership>,
    ) -> Self {
        let committed = partition.committed(group);
        let mut next = committed.map_or(0, |c| c + 1);

        let base = partition.base_offset().await;
        if next < base {
            tracing::warn!(
                topic,
                group,
                partition = partition.index(),
                wanted = next,
                oldest = base,
                "records past retention, resuming at oldest retained offset"
            );
            next = base;
        }

        let end_rx = partition.watch_end();
        Self {
            topic: topic.to_string(),
            group: group.to_string(),
            partition,
            next,
            committed,
            end_rx,
            closed,
            _membership: membership,
        }
    }
}

impl PartitionStream for MemoryStream {
    fn partition(&self) -> u32 {
        self.partition.index()
    }

    fn committed(&self) -> Option<u64> {
        self.committed
    }

    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<Delivery>> + Send + '_>> {
        Box::pin(async move {
            loop {
                if self.closed.is_cancelled() {
                    return None;
                }

                // Mark the current end as seen before reading, so an append
                // racing with the read still wakes `changed()` below.
                self.end_rx.borrow_and_update();

                {
                    let log = self.partition.log.read().await;
                    if self.next < log.base {
                        tracing::warn!(
                            topic = %self.topic,
                            group = %self.group,
                            partition = self.partition.index(),
                            wanted = self.next,
                            oldest = log.base,
                            skipped = log.base - self.next,
                            "records dropped by retention before delivery, skipping ahead"
                        );
                        self.next = log.base;
                    }
                    if let Some(stored) = log.get(self.next) {
                        let delivery = Delivery {
                            payload: stored.payload.clone(),
                            meta: RecordMeta {
                                topic: self.topic.clone(),
                                partition: self.partition.index(),
                                offset: self.next,
                                timestamp_ms: stored.timestamp_ms,
                            },
                        };
                        self.next += 1;
                        return Some(delivery);
                    }
                }

                tokio::select! {
                    changed = self.end_rx.changed() => {
                        if changed.is_err() {
                            return None;
                        }
                    }
                    _ = self.closed.cancelled() => return None,
                }
            }
        })
    }
}
