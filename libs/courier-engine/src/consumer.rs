use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use courier_api::{Delivery, LogTransport, PartitionStream, RecordMeta, WireRecord, WireSchema};
use courier_codec::AvroCodec;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ConsumerConfig;
use crate::cursor::ConsumptionCursor;
use crate::error::{ConsumeError, EngineError, ProcessingError};
use crate::retry::Backoff;

// ═══════════════════════════════════════════════════════════════
//  EventHandler
// ═══════════════════════════════════════════════════════════════

/// Application processing of one decoded record.
///
/// Returning `Ok` lets the pipeline commit the record's offset. An error
/// keeps the offset uncommitted so the record is delivered again.
pub trait EventHandler<T>: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        event: &'a T,
        meta: &'a RecordMeta,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>>;
}

// ═══════════════════════════════════════════════════════════════
//  Partition status
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    Idle,
    Polling,
    Processing,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PartitionStatus {
    pub state: PartitionState,
    pub cursor: ConsumptionCursor,
    pub last_error: Option<ConsumeError>,
}

// ═══════════════════════════════════════════════════════════════
//  ConsumerPipeline
// ═══════════════════════════════════════════════════════════════

pub struct ConsumerPipeline<T: WireRecord> {
    transport: Arc<dyn LogTransport>,
    codec: AvroCodec,
    schema: Arc<WireSchema>,
    config: Arc<ConsumerConfig>,
    _record: PhantomData<fn() -> T>,
}

impl<T: WireRecord> ConsumerPipeline<T> {
    /// `schema` is the reader schema; payloads written with older compatible
    /// versions are resolved against it.
    pub fn new(
        transport: Arc<dyn LogTransport>,
        codec: AvroCodec,
        schema: Arc<WireSchema>,
        config: ConsumerConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if schema.record_name() != T::RECORD_NAME {
            return Err(EngineError::Config(format!(
                "reader schema '{}' describes '{}', consumer expects '{}'",
                schema.subject(),
                schema.record_name(),
                T::RECORD_NAME
            )));
        }
        Ok(Self {
            transport,
            codec,
            schema,
            config: Arc::new(config),
            _record: PhantomData,
        })
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Subscribe and spawn one worker per partition.
    pub async fn start(
        &self,
        handler: Arc<dyn EventHandler<T>>,
    ) -> Result<ConsumerHandle, ConsumeError> {
        let topic = self.config.topic.clone();
        let group = self.config.group.clone();
        let streams = self
            .transport
            .subscribe(&topic, &group)
            .await
            .map_err(|source| ConsumeError::Subscribe {
                topic: topic.clone(),
                group: group.clone(),
                source,
            })?;

        let token = CancellationToken::new();
        let mut workers = Vec::with_capacity(streams.len());
        let mut statuses = BTreeMap::new();

        for stream in streams {
            let partition = stream.partition();
            let cursor = ConsumptionCursor::new(stream.committed());
            let (status_tx, status_rx) = watch::channel(PartitionStatus {
                state: PartitionState::Idle,
                cursor,
                last_error: None,
            });

            let worker = Worker {
                topic: topic.clone(),
                group: group.clone(),
                partition,
                stream,
                transport: self.transport.clone(),
                codec: self.codec.clone(),
                schema: self.schema.clone(),
                handler: handler.clone(),
                config: self.config.clone(),
                cursor,
                status: status_tx,
                token: token.clone(),
            };
            workers.push((partition, tokio::spawn(worker.run())));
            statuses.insert(partition, status_rx);
        }

        tracing::info!(topic = %topic, group = %group, partitions = workers.len(), "consumer started");

        Ok(ConsumerHandle {
            topic,
            group,
            token,
            workers,
            statuses,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Partition worker
// ═══════════════════════════════════════════════════════════════

struct Worker<T: WireRecord> {
    topic: String,
    group: String,
    partition: u32,
    stream: Box<dyn PartitionStream>,
    transport: Arc<dyn LogTransport>,
    codec: AvroCodec,
    schema: Arc<WireSchema>,
    handler: Arc<dyn EventHandler<T>>,
    config: Arc<ConsumerConfig>,
    cursor: ConsumptionCursor,
    status: watch::Sender<PartitionStatus>,
    token: CancellationToken,
}

impl<T: WireRecord> Worker<T> {
    async fn run(mut self) -> Result<(), ConsumeError> {
        tracing::info!(
            topic = %self.topic,
            group = %self.group,
            partition = self.partition,
            resume_at = self.cursor.next_offset(),
            "partition assigned"
        );
        self.set_state(PartitionState::Polling);

        loop {
            // Cancellation only interrupts the wait for the next record.
            let delivery = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                next = self.stream.next() => match next {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            self.set_state(PartitionState::Processing);
            if let Err(e) = self.process(delivery).await {
                tracing::error!(
                    topic = %self.topic,
                    group = %self.group,
                    partition = self.partition,
                    offset = e.offset(),
                    error = %e,
                    "partition halted"
                );
                self.status.send_modify(|s| {
                    s.state = PartitionState::Failed;
                    s.last_error = Some(e.clone());
                });
                return Err(e);
            }
            self.set_state(PartitionState::Polling);
        }

        self.set_state(PartitionState::Idle);
        tracing::info!(
            topic = %self.topic,
            group = %self.group,
            partition = self.partition,
            last_processed = self.cursor.last_processed(),
            "partition released"
        );
        Ok(())
    }

    /// Decode, handle, commit, advance. The cursor moves only after the
    /// commit succeeded.
    async fn process(&mut self, delivery: Delivery) -> Result<(), ConsumeError> {
        let Delivery { payload, meta } = delivery;
        let offset = meta.offset;

        let event: T = self
            .codec
            .decode(&payload, &self.schema)
            .map_err(|source| ConsumeError::Decode {
                topic: self.topic.clone(),
                partition: self.partition,
                offset,
                source,
            })?;

        let mut backoff = Backoff::new(
            self.config.handler_backoff(),
            self.config.max_handler_backoff(),
        );
        let mut retries = 0;
        loop {
            match self.handler.handle(&event, &meta).await {
                Ok(()) => break,
                Err(e) if retries < self.config.handler_retries => {
                    retries += 1;
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        topic = %self.topic,
                        partition = self.partition,
                        offset,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "handler failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(ConsumeError::Processing {
                        topic: self.topic.clone(),
                        partition: self.partition,
                        offset,
                        source,
                    });
                }
            }
        }

        self.transport
            .commit(&self.topic, &self.group, self.partition, offset)
            .await
            .map_err(|source| ConsumeError::Commit {
                topic: self.topic.clone(),
                partition: self.partition,
                offset,
                source,
            })?;

        self.cursor.advance(offset);
        let cursor = self.cursor;
        self.status.send_modify(|s| s.cursor = cursor);
        tracing::debug!(
            topic = %self.topic,
            group = %self.group,
            partition = self.partition,
            offset,
            "offset committed"
        );
        Ok(())
    }

    fn set_state(&self, state: PartitionState) {
        self.status.send_modify(|s| s.state = state);
    }
}

// ═══════════════════════════════════════════════════════════════
//  ConsumerHandle
// ═══════════════════════════════════════════════════════════════

/// Control surface of a started consumer.
pub struct ConsumerHandle {
    topic: String,
    group: String,
    token: CancellationToken,
    workers: Vec<(u32, JoinHandle<Result<(), ConsumeError>>)>,
    statuses: BTreeMap<u32, watch::Receiver<PartitionStatus>>,
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("topic", &self.topic)
            .field("group", &self.group)
            .field("partitions", &self.partitions())
            .finish()
    }
}

impl ConsumerHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn partitions(&self) -> Vec<u32> {
        self.statuses.keys().copied().collect()
    }

    pub fn status(&self, partition: u32) -> Option<PartitionStatus> {
        self.statuses.get(&partition).map(|rx| rx.borrow().clone())
    }

    /// Subscribe to status changes of one partition.
    pub fn watch(&self, partition: u32) -> Option<watch::Receiver<PartitionStatus>> {
        self.statuses.get(&partition).cloned()
    }

    /// Stop polling, let in-flight records finish and wait for the workers.
    pub async fn shutdown(self) -> ConsumerReport {
        tracing::info!(topic = %self.topic, group = %self.group, "consumer shutting down");
        self.token.cancel();
        self.join().await
    }

    /// Wait until every worker has stopped, by shutdown, stream end or failure.
    pub async fn join(self) -> ConsumerReport {
        let mut partitions = Vec::with_capacity(self.workers.len());
        for (partition, worker) in self.workers {
            let error = match worker.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(e) => {
                    tracing::error!(topic = %self.topic, partition, error = %e, "partition worker panicked");
                    Some(ConsumeError::WorkerPanicked(partition))
                }
            };
            let cursor = self
                .statuses
                .get(&partition)
                .map(|rx| rx.borrow().cursor)
                .unwrap_or_default();
            partitions.push(PartitionReport {
                partition,
                cursor,
                error,
            });
        }
        ConsumerReport { partitions }
    }

    /// Kill the workers without waiting for in-flight records.
    ///
    /// Uncommitted records are delivered again to the next subscriber.
    pub async fn abort(self) {
        for (_, worker) in &self.workers {
            worker.abort();
        }
        for (_, worker) in self.workers {
            let _ = worker.await;
        }
        tracing::warn!(topic = %self.topic, group = %self.group, "consumer aborted");
    }
}

// ═══════════════════════════════════════════════════════════════
//  Report
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub partition: u32,
    pub cursor: ConsumptionCursor,
    pub error: Option<ConsumeError>,
}

/// Final state of every partition after a consumer stopped.
#[derive(Debug, Clone, Default)]
pub struct ConsumerReport {
    pub partitions: Vec<PartitionReport>,
}

impl ConsumerReport {
    pub fn is_clean(&self) -> bool {
        self.partitions.iter().all(|p| p.error.is_none())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ConsumeError> {
        self.partitions.iter().filter_map(|p| p.error.as_ref())
    }

    pub fn partition(&self, partition: u32) -> Option<&PartitionReport> {
        self.partitions.iter().find(|p| p.partition == partition)
    }
}
