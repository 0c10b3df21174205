use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use courier_api::{
    hash_key, DeliveryReceipt, LogTransport, Outcome, TransmissionError, WireRecord, WireSchema,
};
use courier_codec::AvroCodec;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::PublisherConfig;
use crate::error::{EngineError, SubmitError};
use crate::retry::Backoff;

/// One encoded record waiting in a lane queue.
struct Envelope {
    event_id: String,
    key: String,
    payload: Vec<u8>,
    reply: oneshot::Sender<DeliveryReceipt>,
}

// ═══════════════════════════════════════════════════════════════
//  Publisher
// ═══════════════════════════════════════════════════════════════

/// Encodes records and transmits them from background lanes.
///
/// `submit` never waits on the network: it encodes, picks the lane owning the
/// partition key and enqueues. Each lane transmits strictly in order, so
/// records sharing a key reach the log in submission order.
pub struct Publisher<T: WireRecord> {
    codec: AvroCodec,
    schema: Arc<WireSchema>,
    config: Arc<PublisherConfig>,
    lanes: Vec<mpsc::Sender<Envelope>>,
    workers: Vec<JoinHandle<()>>,
    runtime: Handle,
    _record: PhantomData<fn(&T)>,
}

impl<T: WireRecord> Publisher<T> {
    /// Spawn the lanes on the current tokio runtime.
    pub fn new(
        transport: Arc<dyn LogTransport>,
        codec: AvroCodec,
        schema: Arc<WireSchema>,
        config: PublisherConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if schema.record_name() != T::RECORD_NAME {
            return Err(EngineError::Config(format!(
                "schema '{}' v{} describes '{}', publisher sends '{}'",
                schema.subject(),
                schema.version(),
                schema.record_name(),
                T::RECORD_NAME
            )));
        }
        let runtime = Handle::try_current().map_err(|e| EngineError::Runtime(e.to_string()))?;

        let config = Arc::new(config);
        let mut lanes = Vec::with_capacity(config.lanes);
        let mut workers = Vec::with_capacity(config.lanes);
        for lane in 0..config.lanes {
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            workers.push(runtime.spawn(run_lane(lane, rx, transport.clone(), config.clone())));
            lanes.push(tx);
        }

        tracing::info!(
            topic = %config.topic,
            lanes = config.lanes,
            schema_id = schema.id(),
            max_retries = config.max_retries,
            "publisher started"
        );

        Ok(Self {
            codec,
            schema,
            config,
            lanes,
            workers,
            runtime,
            _record: PhantomData,
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn schema(&self) -> &Arc<WireSchema> {
        &self.schema
    }

    /// Submit a record keyed by its id.
    pub fn submit(&self, record: &T) -> Result<DeliveryHandle, SubmitError> {
        self.submit_with_key(record, record.record_id())
    }

    /// Submit a record under an explicit partition key.
    ///
    /// Encoding failures are returned here and nothing is queued. Every
    /// other failure resolves the returned handle to a failed receipt.
    pub fn submit_with_key(&self, record: &T, key: &str) -> Result<DeliveryHandle, SubmitError> {
        let event_id = record.record_id();
        if event_id.is_empty() {
            return Err(SubmitError::EmptyId);
        }
        let payload = self.codec.encode(record, &self.schema)?;

        let (reply, rx) = oneshot::channel();
        let handle = DeliveryHandle {
            event_id: event_id.to_string(),
            rx,
            runtime: self.runtime.clone(),
        };

        let lane = (hash_key(key) % self.lanes.len() as u64) as usize;
        let envelope = Envelope {
            event_id: event_id.to_string(),
            key: key.to_string(),
            payload,
            reply,
        };
        let rejected = match self.lanes[lane].try_send(envelope) {
            Ok(()) => return Ok(handle),
            Err(mpsc::error::TrySendError::Full(envelope)) => (envelope, TransmissionError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(envelope)) => (envelope, TransmissionError::Shutdown),
        };

        let (envelope, reason) = rejected;
        let receipt = DeliveryReceipt::failed(envelope.event_id, reason, 0);
        log_outcome(&self.config.topic, &receipt);
        let _ = envelope.reply.send(receipt);
        Ok(handle)
    }

    /// Stop accepting records, transmit everything already queued and wait
    /// for the lanes to finish.
    pub async fn shutdown(self) {
        let Self {
            lanes,
            workers,
            config,
            ..
        } = self;
        drop(lanes);
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(topic = %config.topic, error = %e, "publisher lane panicked");
            }
        }
        tracing::info!(topic = %config.topic, "publisher stopped");
    }
}

// ═══════════════════════════════════════════════════════════════
//  Lane task
// ═══════════════════════════════════════════════════════════════

async fn run_lane(
    lane: usize,
    mut rx: mpsc::Receiver<Envelope>,
    transport: Arc<dyn LogTransport>,
    config: Arc<PublisherConfig>,
) {
    while let Some(envelope) = rx.recv().await {
        let receipt = deliver(
            &*transport,
            &config,
            &envelope.event_id,
            &envelope.key,
            &envelope.payload,
        )
        .await;
        log_outcome(&config.topic, &receipt);
        // The caller may have dropped its handle.
        let _ = envelope.reply.send(receipt);
    }
    tracing::debug!(topic = %config.topic, lane, "publisher lane drained");
}

/// Transmit one payload, retrying transient failures under the policy.
async fn deliver(
    transport: &dyn LogTransport,
    config: &PublisherConfig,
    event_id: &str,
    key: &str,
    payload: &[u8],
) -> DeliveryReceipt {
    let timeout = config.delivery_timeout();
    let mut backoff = Backoff::new(config.backoff(), config.max_backoff());
    let mut attempts = 0;

    loop {
        attempts += 1;
        let attempt = transport.transmit(&config.topic, key, payload.to_vec(), timeout);
        let error = match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(ack)) => return DeliveryReceipt::acknowledged(event_id, ack, attempts),
            Ok(Err(e)) => TransmissionError::from(e),
            Err(_) => TransmissionError::Timeout(timeout),
        };

        if !error.is_transient() || attempts > config.max_retries {
            return DeliveryReceipt::failed(event_id, error, attempts);
        }

        let delay = backoff.next_delay();
        tracing::warn!(
            event_id,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "transmission failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

fn log_outcome(topic: &str, receipt: &DeliveryReceipt) {
    match &receipt.outcome {
        Outcome::Acknowledged => tracing::info!(
            event_id = %receipt.event_id,
            topic,
            partition = receipt.partition,
            offset = receipt.offset,
            "Successfully sent event"
        ),
        Outcome::Failed(reason) => tracing::error!(
            event_id = %receipt.event_id,
            topic,
            attempts = receipt.attempts,
            error = %reason,
            "Failed to send event"
        ),
    }
}

// ═══════════════════════════════════════════════════════════════
//  DeliveryHandle
// ═══════════════════════════════════════════════════════════════

/// Resolves to the receipt of one submit.
///
/// Dropping the handle only stops waiting; the record is still transmitted.
#[must_use = "a DeliveryHandle does nothing unless awaited or given a callback"]
pub struct DeliveryHandle {
    event_id: String,
    rx: oneshot::Receiver<DeliveryReceipt>,
    runtime: Handle,
}

impl std::fmt::Debug for DeliveryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryHandle")
            .field("event_id", &self.event_id)
            .finish_non_exhaustive()
    }
}

impl DeliveryHandle {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Run `f` with the receipt on a runtime worker once delivery completes.
    pub fn on_complete<F>(self, f: F) -> JoinHandle<()>
    where
        F: FnOnce(DeliveryReceipt) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move { f(self.await) })
    }
}

impl Future for DeliveryHandle {
    type Output = DeliveryReceipt;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(receipt)) => Poll::Ready(receipt),
            // Lane dropped the reply without answering: the runtime is gone.
            Poll::Ready(Err(_)) => Poll::Ready(DeliveryReceipt::failed(
                self.event_id.clone(),
                TransmissionError::Shutdown,
                0,
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}
