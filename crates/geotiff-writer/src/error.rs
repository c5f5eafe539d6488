//! Export error types.

use std::path::PathBuf;

use thiserror::Error;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to write '{product}' to {}: {source}", .path.display())]
    Write {
        product: String,
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("product '{0}' was not evaluated")]
    NotEvaluated(String),

    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid export options: {0}")]
    InvalidOptions(String),
}

impl ExportError {
    /// Product the error belongs to, if any.
    pub fn product(&self) -> Option<&str> {
        match self {
            ExportError::Write { product, .. } | ExportError::NotEvaluated(product) => Some(product),
            _ => None,
        }
    }
}
