//! Resampling of rasters between area definitions.
//!
//! Two families of resamplers are provided:
//! - **native**: source and target share CRS and extent and differ by an
//!   integer factor; block mean or replication, no projection math
//! - **geometric** (nearest, bilinear): every target pixel is projected back
//!   into the source grid through lon/lat; index tables are cached

pub mod geometric;
pub mod native;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scene_common::{AreaDefinition, GridRelation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{SceneError, SceneResult};
use crate::raster::Raster;

pub use geometric::{CacheStats, IndexTable, ResampleCache};

/// Resampling method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    /// Block mean / replication between aligned grids
    #[default]
    Native,
    /// Nearest source pixel
    Nearest,
    /// Bilinear interpolation of the four surrounding source pixels
    Bilinear,
}

impl FromStr for ResampleMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(ResampleMethod::Native),
            "nearest" => Ok(ResampleMethod::Nearest),
            "bilinear" => Ok(ResampleMethod::Bilinear),
            other => Err(format!(
                "unknown resampler '{}', expected native, nearest or bilinear",
                other
            )),
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResampleMethod::Native => "native",
            ResampleMethod::Nearest => "nearest",
            ResampleMethod::Bilinear => "bilinear",
        };
        f.write_str(name)
    }
}

/// Grid a scene is resampled onto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleTarget {
    /// Coarsest area among the loaded products
    Coarsest,
    /// Finest area among the loaded products
    Finest,
    /// Explicit grid
    Area(AreaDefinition),
}

/// Shared resampling state: the index-table cache and the row chunk size.
/// Cheap to clone; deferred products keep a clone.
#[derive(Debug, Clone)]
pub struct Resampler {
    cache: Arc<ResampleCache>,
    chunk_rows: usize,
}

impl Resampler {
    pub fn new(cache_entries: usize, chunk_rows: usize) -> Self {
        Self {
            cache: Arc::new(ResampleCache::new(cache_entries)),
            chunk_rows: chunk_rows.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.resample_cache_entries, config.chunk_rows)
    }

    pub fn cache(&self) -> &ResampleCache {
        &self.cache
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows
    }

    pub fn resample(
        &self,
        raster: &Raster,
        src: &AreaDefinition,
        dst: &AreaDefinition,
        method: ResampleMethod,
    ) -> SceneResult<Raster> {
        resample_raster(raster, src, dst, method, &self.cache, self.chunk_rows)
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Resample every channel of `raster` from `src` onto `dst`.
pub fn resample_raster(
    raster: &Raster,
    src: &AreaDefinition,
    dst: &AreaDefinition,
    method: ResampleMethod,
    cache: &ResampleCache,
    chunk_rows: usize,
) -> SceneResult<Raster> {
    if (raster.width, raster.height) != (src.width, src.height) {
        return Err(SceneError::Resample(format!(
            "raster is {}x{} but area '{}' is {}x{}",
            raster.width, raster.height, src.area_id, src.width, src.height
        )));
    }
    let chunk_rows = chunk_rows.max(1);

    match method {
        ResampleMethod::Native => {
            let relation = native_relation(src, dst)?;
            debug!(src = %src.area_id, dst = %dst.area_id, ?relation, "Native resample");
            let channels = raster
                .channels
                .iter()
                .map(|data| match relation {
                    GridRelation::Same => data.clone(),
                    GridRelation::Coarsen(f) => {
                        native::block_mean(data, src.width, src.height, f, chunk_rows)
                    }
                    GridRelation::Refine(f) => {
                        native::replicate(data, src.width, src.height, f, chunk_rows)
                    }
                })
                .collect();
            Raster::new(dst.width, dst.height, channels)
        }
        ResampleMethod::Nearest | ResampleMethod::Bilinear => {
            let table = cache.get_or_build(src, dst, chunk_rows)?;
            let channels = raster
                .channels
                .iter()
                .map(|data| table.apply(data, src.width, src.height, method, chunk_rows))
                .collect();
            Raster::new(dst.width, dst.height, channels)
        }
    }
}

/// Grid relation required by the native resampler.
pub fn native_relation(src: &AreaDefinition, dst: &AreaDefinition) -> SceneResult<GridRelation> {
    src.resolution_ratio(dst).ok_or_else(|| {
        SceneError::incompatible(
            src.area_id.clone(),
            format!(
                "native resampling needs '{}' and '{}' to share CRS and extent with an integer size ratio",
                src.area_id, dst.area_id
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_common::{Crs, Extent};

    fn area(w: usize, h: usize) -> AreaDefinition {
        AreaDefinition::new(
            format!("grid_{}", w),
            Crs::LatLon,
            w,
            h,
            Extent::new(-100.0, 30.0, -90.0, 40.0),
        )
        .unwrap()
    }

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!("Nearest".parse::<ResampleMethod>().unwrap(), ResampleMethod::Nearest);
        assert_eq!(ResampleMethod::Bilinear.to_string(), "bilinear");
        assert!("ewa".parse::<ResampleMethod>().is_err());
    }

    #[test]
    fn test_native_coarsen_and_refine() {
        let cache = ResampleCache::new(2);
        let src = area(4, 4);
        let dst = area(2, 2);
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let raster = Raster::single(4, 4, data).unwrap();

        let coarse = resample_raster(&raster, &src, &dst, ResampleMethod::Native, &cache, 1).unwrap();
        assert_eq!(coarse.channels[0], vec![2.5, 4.5, 10.5, 12.5]);

        let fine = resample_raster(&coarse, &dst, &src, ResampleMethod::Native, &cache, 3).unwrap();
        assert_eq!(fine.shape(), (4, 4));
        assert_eq!(fine.channels[0][0], 2.5);
        assert_eq!(fine.channels[0][5], 2.5);
        assert_eq!(fine.channels[0][15], 12.5);
    }

    #[test]
    fn test_native_rejects_unaligned() {
        let cache = ResampleCache::new(2);
        let raster = Raster::single(4, 4, vec![0.0; 16]).unwrap();
        let err = resample_raster(&raster, &area(4, 4), &area(3, 3), ResampleMethod::Native, &cache, 8)
            .unwrap_err();
        assert!(matches!(err, SceneError::IncompatibleAreas { .. }));
    }

    #[test]
    fn test_shape_mismatch() {
        let cache = ResampleCache::new(2);
        let raster = Raster::single(2, 2, vec![0.0; 4]).unwrap();
        assert!(matches!(
            resample_raster(&raster, &area(4, 4), &area(2, 2), ResampleMethod::Nearest, &cache, 8),
            Err(SceneError::Resample(_))
        ));
    }
}
