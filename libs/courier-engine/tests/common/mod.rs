#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_api::{
    Ack, EventRecord, LogTransport, PartitionStream, RecordMeta, TransportError, WireSchema,
};
use courier_codec::{AvroCodec, SchemaRegistry};
use courier_engine::{EventHandler, ProcessingError};
use courier_log::{MemoryLog, TopicSpec};
use tokio::sync::{watch, Notify};

pub const TOPIC: &str = "user-events";
pub const SUBJECT: &str = "user-events";
pub const V1: &str = include_str!("../../../../schemas/user_event.v1.avsc");
pub const V2: &str = include_str!("../../../../schemas/user_event.v2.avsc");
pub const WAIT: Duration = Duration::from_secs(5);

pub struct Fixture {
    pub log: Arc<MemoryLog>,
    pub registry: Arc<SchemaRegistry>,
    pub codec: AvroCodec,
    pub v1: Arc<WireSchema>,
}

pub fn fixture(partitions: u32) -> Fixture {
    let log = Arc::new(MemoryLog::new());
    log.register(TopicSpec::new(TOPIC, partitions));
    let registry = Arc::new(SchemaRegistry::new());
    let v1 = registry.register(SUBJECT, V1).unwrap();
    let codec = AvroCodec::new(registry.clone());
    Fixture {
        log,
        registry,
        codec,
        v1,
    }
}

pub fn event(id: &str) -> EventRecord {
    EventRecord::new(id, "Ann", "ann@x.com", 1000)
}

// ═══════════════════════════════════════════════════════════════
//  Handlers
// ═══════════════════════════════════════════════════════════════

/// Records every event it sees.
pub struct Recorder {
    seen: Mutex<Vec<(EventRecord, RecordMeta)>>,
    count: watch::Sender<usize>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        let (count, _) = watch::channel(0);
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            count,
        })
    }

    pub fn seen(&self) -> Vec<(EventRecord, RecordMeta)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.seen().into_iter().map(|(e, _)| e.id).collect()
    }

    pub async fn wait_for(&self, n: usize) {
        let mut rx = self.count.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|c| *c >= n))
            .await
            .expect("timed out waiting for events")
            .unwrap();
    }
}

impl EventHandler<EventRecord> for Recorder {
    fn handle<'a>(
        &'a self,
        event: &'a EventRecord,
        meta: &'a RecordMeta,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push((event.clone(), meta.clone()));
            self.count.send_modify(|c| *c += 1);
            Ok(())
        })
    }
}

/// Fails the first `failures` calls, then succeeds.
pub struct Failing {
    failures: AtomicU32,
    pub calls: AtomicU32,
}

impl Failing {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        })
    }
}

impl EventHandler<EventRecord> for Failing {
    fn handle<'a>(
        &'a self,
        _event: &'a EventRecord,
        _meta: &'a RecordMeta,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(ProcessingError::new("database unavailable"));
            }
            Ok(())
        })
    }
}

/// Signals when processing starts, then waits `hold` (forever if `None`).
pub struct Slow {
    pub started: Notify,
    hold: Option<Duration>,
    pub finished: AtomicU32,
}

impl Slow {
    pub fn new(hold: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            hold,
            finished: AtomicU32::new(0),
        })
    }
}

impl EventHandler<EventRecord> for Slow {
    fn handle<'a>(
        &'a self,
        _event: &'a EventRecord,
        _meta: &'a RecordMeta,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>> {
        Box::pin(async move {
            self.started.notify_one();
            match self.hold {
                Some(hold) => tokio::time::sleep(hold).await,
                None => std::future::pending::<()>().await,
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Transports
// ═══════════════════════════════════════════════════════════════

/// Never acknowledges a transmission.
pub struct Stalled;

impl LogTransport for Stalled {
    fn transmit(
        &self,
        _topic: &str,
        _key: &str,
        _payload: Vec<u8>,
        _deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Ack, TransportError>> + Send + '_>> {
        Box::pin(std::future::pending())
    }

    fn subscribe(
        &self,
        _topic: &str,
        _group: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Box<dyn PartitionStream>>, TransportError>> + Send + '_>>
    {
        Box::pin(async { Err(TransportError::Closed) })
    }

    fn commit(
        &self,
        _topic: &str,
        _group: &str,
        _partition: u32,
        _offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async { Err(TransportError::Closed) })
    }
}

/// Reports the broker unreachable for the first `failures` transmissions.
pub struct Flaky {
    inner: Arc<MemoryLog>,
    failures: AtomicU32,
    pub attempts: AtomicU32,
}

impl Flaky {
    pub fn new(inner: Arc<MemoryLog>, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failures: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        })
    }
}

impl LogTransport for Flaky {
    fn transmit(
        &self,
        topic: &str,
        key: &str,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Ack, TransportError>> + Send + '_>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Box::pin(async { Err(TransportError::Unreachable("flaky".into())) });
        }
        self.inner.transmit(topic, key, payload, deadline)
    }

    fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Box<dyn PartitionStream>>, TransportError>> + Send + '_>>
    {
        self.inner.subscribe(topic, group)
    }

    fn commit(
        &self,
        topic: &str,
        group: &str,
        partition: u32,
        offset: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        self.inner.commit(topic, group, partition, offset)
    }
}
