#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("no {0} configured")]
    NoComponents(&'static str),

    #[error("schema: {0}")]
    Schema(#[from] courier_api::SchemaError),

    #[error("{0}")]
    Engine(#[from] courier_engine::EngineError),

    #[error("{0}")]
    Consume(#[from] courier_engine::ConsumeError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
