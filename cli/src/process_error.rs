use std::path::PathBuf;

use decoder::DecoderError;
use thiserror::Error;

/// Failures raised by the streaming pipeline around the decoder core.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{operation} timed out after {seconds}s for {path}")]
    Timeout {
        operation: &'static str,
        seconds: u64,
        path: PathBuf,
    },

    #[error("output already exists: {0}")]
    OutputExists(PathBuf),

    #[error("muxer failed for {path}: {reason}")]
    MuxerFailed { path: PathBuf, reason: String },
}

impl ProcessError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
