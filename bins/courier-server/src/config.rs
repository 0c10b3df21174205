use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use courier_engine::{ConsumerConfig, PublisherConfig};
use courier_log::TopicSpec;
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "courier-server", about = "Schema-governed event publisher and consumer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the publisher, the consumers and the stdin request reader
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", env = "COURIER_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub schemas: Vec<SchemaConfig>,
    #[serde(default)]
    pub topics: Vec<TopicSpec>,
    pub publisher: PublisherSection,
    #[serde(default)]
    pub consumers: Vec<ConsumerSection>,
}

/// A subject and its `.avsc` files, oldest version first.
#[derive(Debug, Deserialize)]
pub struct SchemaConfig {
    pub subject: String,
    pub versions: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct PublisherSection {
    /// Writer schema subject.
    pub subject: String,
    /// Writer schema version; the latest when omitted.
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(flatten)]
    pub config: PublisherConfig,
}

#[derive(Debug, Deserialize)]
pub struct ConsumerSection {
    /// Reader schema subject.
    pub subject: String,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(flatten)]
    pub config: ConsumerConfig,
}

impl CourierConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        let mut config = Self::parse(&content).map_err(|e| match e {
            ServerError::Config { context, detail } => ServerError::Config {
                context,
                detail: format!("'{path}': {detail}"),
            },
            other => other,
        })?;

        // Schema paths are relative to the config file.
        let base = Path::new(path).parent().unwrap_or_else(|| Path::new("."));
        for schema in &mut config.schemas {
            for version in &mut schema.versions {
                if version.is_relative() {
                    *version = base.join(&*version);
                }
            }
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(content).map_err(|e| ServerError::Config {
            context: "parse",
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ServerError> {
        if self.schemas.is_empty() {
            return Err(ServerError::NoComponents("[[schemas]]"));
        }
        if self.topics.is_empty() {
            return Err(ServerError::NoComponents("[[topics]]"));
        }
        self.publisher.config.validate()?;
        let mut groups = HashSet::new();
        for consumer in &self.consumers {
            consumer.config.validate()?;
            let (topic, group) = (&consumer.config.topic, &consumer.config.group);
            if !groups.insert((topic, group)) {
                return Err(ServerError::Config {
                    context: "consumers",
                    detail: format!("group '{group}' is configured twice for topic '{topic}'"),
                });
            }
        }
        Ok(())
    }
}
