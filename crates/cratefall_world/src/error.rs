//! # World Error Types

use thiserror::Error;

/// Errors raised by the world-side collaborators.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Scene file could not be read.
    #[error("failed to read scene file {path}: {source}")]
    SceneRead {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Scene file is not valid scene JSON.
    #[error("failed to parse scene file: {0}")]
    SceneParse(#[from] serde_json::Error),

    /// Entity capacity exhausted.
    #[error("entity registry is full (capacity {0})")]
    RegistryFull(usize),
}
