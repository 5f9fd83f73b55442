use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidBatchError {
    #[error("No input files were accepted into the batch")]
    NoInputs,

    #[error("Output directory does not exist and creation was declined: {0}")]
    OutputDirMissing(PathBuf),

    #[error("Failed to create output directory {path}: {source}")]
    OutputDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output path is not a directory: {0}")]
    OutputNotDirectory(PathBuf),

    #[error("Unsupported frame rate: {0} (expected 24 or 30)")]
    InvalidFrameRate(String),

    #[error("Unsupported resolution: {0} (expected 360, 480, 720 or 1080)")]
    InvalidResolution(String),

    #[error("A batch is already running")]
    BatchAlreadyRunning,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl VidBatchError {
    /// Setup errors stop a batch before any job is dequeued.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            VidBatchError::NoInputs
                | VidBatchError::OutputDirMissing(_)
                | VidBatchError::OutputDirCreate { .. }
                | VidBatchError::OutputNotDirectory(_)
                | VidBatchError::BatchAlreadyRunning
        )
    }
}

pub type Result<T> = std::result::Result<T, VidBatchError>;
