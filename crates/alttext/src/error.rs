use alttext_engine::error::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("config error: {0}")]
    Config(String),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("could not encode queue: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not write report: {0}")]
    Output(#[from] std::io::Error),
}
