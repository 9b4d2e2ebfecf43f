use serde::{Deserialize, Serialize};
use thiserror::Error;

mod git;
pub use git::*;
mod request;
pub use request::*;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{0}")]
    Configuration(String),
    #[error("git not found on PATH; please install Git")]
    GitMissing,
    #[error("publish service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("git {command} failed: {stderr}")]
    GitFailed { command: String, stderr: String },
}

/// Result of one publish run, in the shape the console shows to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub success: bool,
    pub message: String,
}

impl PublishResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

impl From<PublishError> for PublishResponse {
    fn from(err: PublishError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}
