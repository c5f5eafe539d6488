//! Pipeline configuration.
//!
//! Read once at startup and handed to [`crate::Pipeline::new`]; nothing in
//! the scene crate reads the environment after that.

use crate::resample::ResampleMethod;
use serde::{Deserialize, Serialize};

/// Configuration for scene evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of worker threads used for evaluation.
    pub num_workers: usize,

    /// Rows per parallel work unit when resampling or enhancing.
    pub chunk_rows: usize,

    /// Number of resampling index tables kept in the LRU cache.
    pub resample_cache_entries: usize,

    /// Resampler used when the caller does not pick one.
    pub default_resampler: ResampleMethod,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            chunk_rows: 1024,
            resample_cache_entries: 8,
            default_resampler: ResampleMethod::Native,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ABI_NUM_WORKERS") {
            if let Ok(n) = val.parse() {
                config.num_workers = n;
            }
        }

        if let Ok(val) = std::env::var("ABI_CHUNK_ROWS") {
            if let Ok(n) = val.parse() {
                config.chunk_rows = n;
            }
        }

        if let Ok(val) = std::env::var("ABI_RESAMPLE_CACHE") {
            if let Ok(n) = val.parse() {
                config.resample_cache_entries = n;
            }
        }

        if let Ok(val) = std::env::var("ABI_RESAMPLER") {
            if let Ok(method) = val.parse() {
                config.default_resampler = method;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.num_workers == 0 {
            return Err("num_workers must be > 0".to_string());
        }

        if self.chunk_rows == 0 {
            return Err("chunk_rows must be > 0".to_string());
        }

        if self.resample_cache_entries == 0 {
            return Err("resample_cache_entries must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_resampler, ResampleMethod::Native);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = PipelineConfig {
            num_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("num_workers"));
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = PipelineConfig {
            chunk_rows: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
