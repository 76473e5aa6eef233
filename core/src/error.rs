//! Error types for the migration engine
//!
//! Maps onto the run's failure taxonomy:
//! - read failures surface as [`SnapshotError`] and are logged by the caller
//! - throttling never escapes [`crate::transport::RateLimitedTransport`]
//! - rejected entities are not errors at all, they land in the review list
//! - only setup failures become a [`MigrateError`] returned from the run

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Migration result type alias
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Failure to execute a request at all (no HTTP status to report).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to encode request body for {path}: {source}")]
    Encode {
        path: String,
        source: serde_json::Error,
    },

    #[error("failed to decode response body from {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}

/// Failure to read or write a captured snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SnapshotError {
    /// File the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Write { path, .. } => path,
        }
    }
}

/// A rule list that does not have the shape every rule must have.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("malformed rules in environment {environment}: {source}")]
    MalformedRules {
        environment: String,
        source: serde_json::Error,
    },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no API key configured (use --api-key, LD_API_KEY, or api_key in the config file)")]
    MissingApiKey,
}

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("cannot read source project {key}: {source}")]
    ProjectSnapshot { key: String, source: SnapshotError },

    #[error("destination project {key} was not created (status {status})")]
    ProjectCreation { key: String, status: StatusCode },

    #[error("destination project {key} was not created: {source}")]
    ProjectTransport { key: String, source: TransportError },

    #[error("cannot capture source project {key} (status {status})")]
    ProjectCapture { key: String, status: StatusCode },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}
