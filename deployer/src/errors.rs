//! Error types for the deployer

use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Non-2xx answer from the hosting provider
    #[error("Provider API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// Upload answered with something we cannot use as a deploy
    #[error("Invalid deployment response: {0}")]
    InvalidResponse(String),

    /// Build step exited non-zero
    #[error("Build failed")]
    BuildFailed,

    /// Build command could not run to completion
    #[error("Build command error: {message}")]
    CommandError { message: String, output: String },

    #[error("Upload error: {0}")]
    UploadError(String),

    /// Provider reported the deploy as failed
    #[error("{0}")]
    RemoteFailed(String),

    #[error("Deployment timed out")]
    TimedOut,

    #[error("Deployment cancelled")]
    Cancelled,

    #[error("A deployment is already in progress for {0}")]
    AlreadyDeploying(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// HTTP status of a provider rejection, if this is one
    pub fn api_status(&self) -> Option<u16> {
        match self {
            DeployError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
