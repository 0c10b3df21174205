use std::sync::Arc;

use courier_api::{EventRecord, WireSchema};
use courier_codec::{AvroCodec, SchemaRegistry};
use courier_engine::{ConsumerHandle, ConsumerPipeline, Publisher};
use courier_log::MemoryLog;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{CourierConfig, ServeArgs};
use crate::error::ServerError;
use crate::handler::LoggingHandler;
use crate::request::PublishRequest;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("courier-server starting");

    // --- Load config ---
    let config = CourierConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Schemas ---
    let registry = Arc::new(SchemaRegistry::new());
    for schema in &config.schemas {
        for path in &schema.versions {
            registry.load_file(&schema.subject, path)?;
        }
    }
    let codec = AvroCodec::new(registry.clone());

    // --- Log ---
    let log = Arc::new(MemoryLog::new());
    for topic in &config.topics {
        log.register(topic.clone());
    }

    // --- Consumers ---
    let mut consumers: Vec<ConsumerHandle> = Vec::with_capacity(config.consumers.len());
    for section in &config.consumers {
        let schema = schema_for(&registry, &section.subject, section.version)?;
        let pipeline: ConsumerPipeline<EventRecord> =
            ConsumerPipeline::new(log.clone(), codec.clone(), schema, section.config.clone())?;
        let handler = Arc::new(LoggingHandler::new(&section.config.group));
        consumers.push(pipeline.start(handler).await?);
    }

    // --- Publisher ---
    let section = &config.publisher;
    let schema = schema_for(&registry, &section.subject, section.version)?;
    let publisher: Publisher<EventRecord> =
        Publisher::new(log.clone(), codec.clone(), schema, section.config.clone())?;

    // --- Health ---
    for (topic, partitions) in log.topics() {
        tracing::info!(topic = %topic, partitions, status = "UP", "health");
    }
    tracing::info!(
        schemas = ?registry.subjects(),
        consumers = consumers.len(),
        "server ready, reading publish requests from stdin"
    );

    // --- Requests until Ctrl+C ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => println!("{}", publish(&publisher, &line)),
                None => {
                    tracing::info!("stdin closed, waiting for Ctrl+C");
                    input_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down...");
                break;
            }
        }
    }

    publisher.shutdown().await;
    for consumer in consumers {
        let group = consumer.group().to_string();
        let report = consumer.shutdown().await;
        for error in report.errors() {
            tracing::error!(group = %group, error = %error, "consumer stopped with error");
        }
    }
    log.close();

    tracing::info!("shutdown complete");
    Ok(())
}

fn schema_for(
    registry: &SchemaRegistry,
    subject: &str,
    version: Option<u32>,
) -> Result<Arc<WireSchema>, ServerError> {
    let schema = match version {
        Some(version) => registry.version(subject, version)?,
        None => registry.latest(subject)?,
    };
    Ok(schema)
}

/// Handle one request line and return the response line.
fn publish(publisher: &Publisher<EventRecord>, line: &str) -> String {
    let event = match PublishRequest::parse(line).and_then(PublishRequest::into_event) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "rejected request");
            return format!("Error: {e}");
        }
    };

    match publisher.submit(&event) {
        // Delivery is reported by the publisher log lines; the caller only
        // learns the id.
        Ok(_handle) => format!("User event published successfully with id: {}", event.id),
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "failed to publish event");
            format!("Error publishing event: {e}")
        }
    }
}
