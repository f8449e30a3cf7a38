use thiserror::Error;

use crate::{cache::CacheError, config::LoadError, infra::error::InfraError};

/// Errors that end a worker command with a non-zero exit.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to read view: {0}")]
    Cache(#[from] CacheError),
    #[error("no view named `{0}` is registered")]
    UnknownView(&'static str),
    #[error("{failed} view(s) failed to resync")]
    ResyncFailed { failed: usize },
    #[error("failed to encode view as json: {0}")]
    Encode(#[from] serde_json::Error),
}
