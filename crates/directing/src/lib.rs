use project::StoreError;
use thiserror::Error;
use timeline::{Mode, TimelineError};

mod batch;
mod catalog;
mod desk;
mod models;
mod plans;
mod providers;
mod service;

pub use batch::*;
pub use catalog::*;
pub use desk::*;
pub use models::*;
pub use plans::*;
pub use providers::{
    gemini::{GeminiConfig, GeminiProvider},
    mock::{FailingProvider, MockConfig, MockDirectingProvider},
    openai::{OpenAiConfig, OpenAiProvider},
    ProviderConfig,
};
pub use service::*;

#[derive(Debug, Error)]
pub enum DirectingError {
    #[error("{0}")]
    Configuration(String),
    #[error("directing service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("malformed directing response: {0}")]
    MalformedResponse(String),
    #[error("directing already running for {scene} ({mode})")]
    AlreadyInFlight { scene: String, mode: Mode },
    #[error("no history entry {id} for {scene} ({mode})")]
    HistoryNotFound { scene: String, mode: Mode, id: i64 },
    #[error("invalid plan JSON: {0}")]
    InvalidPlan(#[source] serde_json::Error),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl DirectingError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        DirectingError::Configuration(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        DirectingError::ServiceUnavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        DirectingError::MalformedResponse(msg.into())
    }
}
