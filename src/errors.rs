//! Error types shared by the connection factory, the bulk loader and the
//! index helpers.

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = EsError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum EsError {
    /// The cluster did not answer the liveness check, after every retry.
    #[error("Failed to connect to Elasticsearch on {url}")]
    Connection { url: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid cloud id: {0}")]
    CloudId(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The whole request was answered with a non-success status.
    #[error("Request to {url} failed with {status}: {body}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EsError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn cloud_id(msg: impl Into<String>) -> Self {
        Self::CloudId(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            _ => None,
        }
    }
}
