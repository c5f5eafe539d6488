//! Error types for ABI NetCDF reading.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF parsing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The netcdf library refused to open or read the file
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Missing required variable or attribute
    #[error("Missing required data in {path}: {what}")]
    MissingData { path: PathBuf, what: String },

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// File name does not follow the ABI L1b naming convention
    #[error("Not an ABI L1b file name: {0}")]
    InvalidFilename(String),

    /// Calibration coefficient absent for the requested calibration
    #[error("Band {band} has no {coefficient} coefficient")]
    MissingCalibration { band: u8, coefficient: &'static str },
}

impl NetCdfError {
    pub(crate) fn read(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Read {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn missing(path: impl Into<PathBuf>, what: impl Into<String>) -> Self {
        Self::MissingData {
            path: path.into(),
            what: what.into(),
        }
    }
}
