//! Errors for writing character artifacts to disk.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No avatar image at {0:?}; generate the avatar before exporting a card")]
    MissingAvatar(PathBuf),

    #[error("Filesystem error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("Background export task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Caller errors, as opposed to environment failures.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::MissingAvatar(_))
    }
}
