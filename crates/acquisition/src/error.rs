//! Acquisition error types. Any of these is fatal to a run.

use std::path::PathBuf;

use thiserror::Error;

pub type AcquisitionResult<T> = Result<T, AcquisitionError>;

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has {actual} bytes, expected {expected}", .path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("download of {url} failed after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<AcquisitionError>,
    },

    #[error("listing s3://{bucket}/{prefix} failed: {message}")]
    Listing {
        bucket: String,
        prefix: String,
        message: String,
    },

    #[error(
        "scenario '{scenario}' has {found} of {expected} channel files (missing: {missing:?}, duplicated: {duplicated:?})"
    )]
    IncompleteListing {
        scenario: String,
        found: usize,
        expected: usize,
        missing: Vec<String>,
        duplicated: Vec<String>,
    },

    #[error("{failed} of {total} downloads failed; first error: {first}")]
    DownloadsFailed {
        failed: usize,
        total: usize,
        first: Box<AcquisitionError>,
    },

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl AcquisitionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AcquisitionError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquisitionError::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            AcquisitionError::Http { .. } | AcquisitionError::SizeMismatch { .. } => true,
            AcquisitionError::Io { .. } => true,
            _ => false,
        }
    }
}
