use std::path::PathBuf;
use thiserror::Error;

pub type DecoderResult<T> = Result<T, DecoderError>;

/// Error taxonomy shared by every decoder family.
///
/// `validate` failures are recoverable (dispatch moves on to the next
/// candidate); everything raised after a successful `validate` aborts the
/// file.
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("no decoder registered for extension '{0}'")]
    UnsupportedExtension(String),

    #[error("{format}: {reason}")]
    InvalidHeader {
        format: &'static str,
        reason: String,
    },

    #[error("{format}: {reason}")]
    UnsupportedVersion {
        format: &'static str,
        reason: String,
    },

    #[error("{format}: {reason}")]
    KeyUnavailable {
        format: &'static str,
        reason: String,
    },

    #[error("{format}: decode failed: {reason}")]
    DecodeFailed {
        format: &'static str,
        reason: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no decoder resolved the file {path}: last error: {last_error}")]
    NoDecoderResolved { path: PathBuf, last_error: String },
}

impl DecoderError {
    pub fn invalid_header(format: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            format,
            reason: reason.into(),
        }
    }

    pub fn unsupported_version(format: &'static str, reason: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            format,
            reason: reason.into(),
        }
    }

    pub fn key_unavailable(format: &'static str, reason: impl Into<String>) -> Self {
        Self::KeyUnavailable {
            format,
            reason: reason.into(),
        }
    }

    pub fn decode_failed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::DecodeFailed {
            format,
            reason: reason.into(),
        }
    }
}
