//! GeoTIFF creation options.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};

const COMPRESSIONS: [&str; 5] = ["DEFLATE", "LZW", "ZSTD", "PACKBITS", "NONE"];

/// How products are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// GDAL compression codec name
    pub compress: String,

    /// Write square tiles instead of strips
    pub tiled: bool,

    /// Build overviews in memory and copy them into the file
    pub copy_src_overviews: bool,

    /// Tile edge in pixels, a multiple of 16
    pub block_size: usize,

    /// Overviews are added while the smaller dimension stays at or above this
    pub overview_min_dimension: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            compress: "DEFLATE".to_string(),
            tiled: true,
            copy_src_overviews: true,
            block_size: 512,
            overview_min_dimension: 256,
        }
    }
}

impl ExportOptions {
    /// Defaults overridden by `GEOTIFF_COMPRESS`, `GEOTIFF_TILED`,
    /// `GEOTIFF_COPY_SRC_OVERVIEWS` and `GEOTIFF_BLOCK_SIZE`.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("GEOTIFF_COMPRESS") {
            options.compress = val.to_ascii_uppercase();
        }

        if let Ok(val) = std::env::var("GEOTIFF_TILED") {
            if let Some(b) = parse_bool(&val) {
                options.tiled = b;
            }
        }

        if let Ok(val) = std::env::var("GEOTIFF_COPY_SRC_OVERVIEWS") {
            if let Some(b) = parse_bool(&val) {
                options.copy_src_overviews = b;
            }
        }

        if let Ok(val) = std::env::var("GEOTIFF_BLOCK_SIZE") {
            if let Ok(n) = val.parse() {
                options.block_size = n;
            }
        }

        options
    }

    pub fn validate(&self) -> ExportResult<()> {
        if !COMPRESSIONS.contains(&self.compress.as_str()) {
            return Err(ExportError::InvalidOptions(format!(
                "unsupported compression '{}', expected one of {:?}",
                self.compress, COMPRESSIONS
            )));
        }
        if self.tiled && (self.block_size == 0 || self.block_size % 16 != 0) {
            return Err(ExportError::InvalidOptions(format!(
                "block size {} must be a positive multiple of 16",
                self.block_size
            )));
        }
        if self.overview_min_dimension == 0 {
            return Err(ExportError::InvalidOptions(
                "overview_min_dimension must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// GTiff creation options as name/value pairs.
    pub fn creation_options(&self) -> Vec<(String, String)> {
        let yes_no = |b: bool| if b { "YES" } else { "NO" }.to_string();
        let mut opts = vec![
            ("COMPRESS".to_string(), self.compress.clone()),
            ("TILED".to_string(), yes_no(self.tiled)),
        ];
        if self.tiled {
            opts.push(("BLOCKXSIZE".to_string(), self.block_size.to_string()));
            opts.push(("BLOCKYSIZE".to_string(), self.block_size.to_string()));
        }
        opts.push(("COPY_SRC_OVERVIEWS".to_string(), yes_no(self.copy_src_overviews)));
        opts.push(("BIGTIFF".to_string(), "IF_SAFER".to_string()));
        opts
    }

    /// Power-of-two overview factors for a `width` x `height` raster.
    pub fn overview_levels(&self, width: usize, height: usize) -> Vec<i32> {
        let min_dim = width.min(height);
        let mut levels = Vec::new();
        let mut level = 2;
        while min_dim / level >= self.overview_min_dimension {
            levels.push(level as i32);
            level *= 2;
        }
        levels
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExportOptions::default();
        assert!(options.validate().is_ok());
        let co = options.creation_options();
        assert!(co.contains(&("COMPRESS".to_string(), "DEFLATE".to_string())));
        assert!(co.contains(&("TILED".to_string(), "YES".to_string())));
        assert!(co.contains(&("BLOCKXSIZE".to_string(), "512".to_string())));
        assert!(co.contains(&("COPY_SRC_OVERVIEWS".to_string(), "YES".to_string())));
    }

    #[test]
    fn test_untiled_has_no_block_size() {
        let options = ExportOptions {
            tiled: false,
            block_size: 0,
            ..Default::default()
        };
        assert!(options.validate().is_ok());
        assert!(!options
            .creation_options()
            .iter()
            .any(|(k, _)| k == "BLOCKXSIZE"));
    }

    #[test]
    fn test_validate() {
        let bad_codec = ExportOptions {
            compress: "JPEG2000".to_string(),
            ..Default::default()
        };
        assert!(bad_codec.validate().is_err());

        let bad_block = ExportOptions {
            block_size: 500,
            ..Default::default()
        };
        assert!(bad_block.validate().is_err());
    }

    #[test]
    fn test_overview_levels() {
        let options = ExportOptions::default();
        assert_eq!(options.overview_levels(2500, 1500), vec![2, 4]);
        assert_eq!(options.overview_levels(400, 300), Vec::<i32>::new());
        assert_eq!(options.overview_levels(10000, 6000), vec![2, 4, 8, 16]);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
