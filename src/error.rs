use std::{io, path::PathBuf};

use thiserror::Error;
use validator::ValidationErrors;

/// Errors that abort a run.
///
/// Every variant is fatal: nothing is retried, and the target file is only
/// ever touched by the final write, so a failure before that point leaves it
/// exactly as it was.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to generate random bytes: {0}")]
    Generation(String),
    #[error("Failed to sign token: {0}")]
    Signing(String),
    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Signing key {0} not found in env file")]
    MissingSigningKey(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config_rs::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),
}

pub type Result<T> = std::result::Result<T, Error>;
