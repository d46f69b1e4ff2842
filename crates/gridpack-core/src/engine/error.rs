use super::command::CommandError;
use super::config::{BatchType, ConfigError};
use super::naming::JobId;
use super::sampling::SamplingError;
use super::tracker::TrackerError;
use crate::core::cards::CardError;
use crate::core::io::FileFormatError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Gridpack has not been configured: {0}")]
    NotConfigured(String),

    #[error("No process has been set on the gridpack")]
    MissingProcess,

    #[error("Unknown run card option: {0}")]
    UnknownRunCardOption(String),

    #[error("Invalid batch type for saving diagrams: {0}")]
    InvalidBatchForDiagrams(BatchType),

    #[error("Target directory not found: {0}")]
    MissingTargetDirectory(PathBuf),

    #[error("Failed to clean artifacts of {job}: {failed:?}")]
    CleanFailed { job: JobId, failed: Vec<PathBuf> },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Card error: {0}")]
    Card(#[from] CardError),

    #[error("File format error: {0}")]
    FileFormat(#[from] FileFormatError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
