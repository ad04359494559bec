//! Engine-side error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Engine search timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Cloud evaluation error: {0}")]
    Cloud(String),

    #[error(transparent)]
    Core(#[from] review_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
