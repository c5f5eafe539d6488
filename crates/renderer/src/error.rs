//! Error types for enhancement and image encoding.

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("product '{product}' has {bands} bands, display images need 1, 3 or 4")]
    UnsupportedBands { product: String, bands: usize },

    #[error("enhancement '{enhancement}': {message}")]
    InvalidEnhancement { enhancement: String, message: String },

    #[error("image buffer of {actual} bytes does not match {width}x{height} ({expected} bytes)")]
    BufferSize {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("PNG compression failed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("failed to parse enhancement definitions: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read enhancement file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write image {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub(crate) fn invalid(enhancement: &str, message: impl Into<String>) -> Self {
        RenderError::InvalidEnhancement {
            enhancement: enhancement.to_string(),
            message: message.into(),
        }
    }
}
