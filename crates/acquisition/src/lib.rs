//! Acquisition of GOES ABI L1b scenario files from the NOAA open-data
//! buckets.
//!
//! A [`Scenario`] names one fixed scan. Its files are found by listing the
//! bucket anonymously, checked to cover all 16 channels exactly once, and
//! downloaded with resumable, retried transfers.

pub mod download;
pub mod error;
pub mod fetch;
pub mod s3;
pub mod scenario;

pub use download::{DownloadConfig, DownloadManager, DownloadProgress};
pub use error::{AcquisitionError, AcquisitionResult};
pub use fetch::{download_all, fetch_scenario, find_local_files};
pub use s3::S3Lister;
pub use scenario::{select_scenario_files, Scenario, ScenarioFile, CHANNEL_COUNT};
