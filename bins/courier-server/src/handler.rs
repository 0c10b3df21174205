use std::future::Future;
use std::pin::Pin;

use courier_api::{EventRecord, RecordMeta};
use courier_engine::{EventHandler, ProcessingError};

/// Consumer handler that logs every received user event.
pub struct LoggingHandler {
    group: String,
}

impl LoggingHandler {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }
}

impl EventHandler<EventRecord> for LoggingHandler {
    fn handle<'a>(
        &'a self,
        event: &'a EventRecord,
        meta: &'a RecordMeta,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessingError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(
                group = %self.group,
                event_id = %event.id,
                partition = meta.partition,
                offset = meta.offset,
                "Received user event"
            );
            tracing::info!(
                event_id = %event.id,
                name = event.name.as_deref().unwrap_or_default(),
                email = event.email.as_deref().unwrap_or_default(),
                "Processing user event"
            );
            Ok(())
        })
    }
}
