//! Geometric resampling through lon/lat.
//!
//! For every target pixel center the target projection is inverted to
//! lon/lat, projected forward into the source CRS and converted to a
//! fractional source pixel index. The resulting [`IndexTable`] depends only
//! on the two grids, so it is built once per grid pair and shared across
//! channels and products through the [`ResampleCache`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use rayon::prelude::*;
use scene_common::AreaDefinition;
use tracing::debug;

use super::ResampleMethod;
use crate::error::SceneResult;

/// Fractional source pixel `(col, row)` of every target pixel.
/// NaN marks target pixels outside the source coverage.
#[derive(Debug, Clone)]
pub struct IndexTable {
    pub width: usize,
    pub height: usize,
    cols: Vec<f32>,
    rows: Vec<f32>,
}

impl IndexTable {
    /// Build the table mapping `dst` pixels into `src`.
    pub fn build(src: &AreaDefinition, dst: &AreaDefinition, chunk_rows: usize) -> SceneResult<Self> {
        let src_proj = projection::for_crs(&src.crs)?;
        let dst_proj = projection::for_crs(&dst.crs)?;
        let same_crs = src.crs == dst.crs;
        let chunk_rows = chunk_rows.max(1);

        let n = dst.width * dst.height;
        let mut cols = vec![f32::NAN; n];
        let mut rows = vec![f32::NAN; n];
        let src_w = src.width as f64;
        let src_h = src.height as f64;

        cols.par_chunks_mut(dst.width * chunk_rows)
            .zip(rows.par_chunks_mut(dst.width * chunk_rows))
            .enumerate()
            .for_each(|(chunk_idx, (col_chunk, row_chunk))| {
                let first_row = chunk_idx * chunk_rows;
                for (i, (c, r)) in col_chunk.iter_mut().zip(row_chunk.iter_mut()).enumerate() {
                    let row = first_row + i / dst.width;
                    let col = i % dst.width;
                    let (x, y) = dst.pixel_center(col as f64, row as f64);

                    let src_xy = if same_crs {
                        Some((x, y))
                    } else {
                        dst_proj
                            .inverse(x, y)
                            .and_then(|(lon, lat)| src_proj.forward(lon, lat))
                    };

                    if let Some((sx, sy)) = src_xy {
                        let (sc, sr) = src.coord_to_pixel(sx, sy);
                        if sc >= -0.5 && sc < src_w - 0.5 && sr >= -0.5 && sr < src_h - 0.5 {
                            *c = sc as f32;
                            *r = sr as f32;
                        }
                    }
                }
            });

        Ok(Self {
            width: dst.width,
            height: dst.height,
            cols,
            rows,
        })
    }

    /// Fractional source index of a target pixel, `None` outside coverage.
    pub fn source_index(&self, col: usize, row: usize) -> Option<(f32, f32)> {
        let i = row * self.width + col;
        let (c, r) = (*self.cols.get(i)?, *self.rows.get(i)?);
        if c.is_nan() {
            None
        } else {
            Some((c, r))
        }
    }

    /// Fraction of target pixels that fall inside the source grid.
    pub fn coverage(&self) -> f64 {
        if self.cols.is_empty() {
            return 0.0;
        }
        let valid = self.cols.iter().filter(|c| !c.is_nan()).count();
        valid as f64 / self.cols.len() as f64
    }

    /// Sample one source channel onto the target grid.
    pub fn apply(
        &self,
        data: &[f32],
        src_width: usize,
        src_height: usize,
        method: ResampleMethod,
        chunk_rows: usize,
    ) -> Vec<f32> {
        let mut output = vec![f32::NAN; self.width * self.height];
        if output.is_empty() || src_width == 0 || src_height == 0 {
            return output;
        }
        let chunk_len = self.width * chunk_rows.max(1);

        output
            .par_chunks_mut(chunk_len)
            .zip(self.cols.par_chunks(chunk_len))
            .zip(self.rows.par_chunks(chunk_len))
            .for_each(|((out, cols), rows)| {
                for ((o, &c), &r) in out.iter_mut().zip(cols).zip(rows) {
                    if c.is_nan() {
                        continue;
                    }
                    *o = match method {
                        ResampleMethod::Bilinear => {
                            bilinear_interpolate(data, src_width, src_height, c, r)
                        }
                        _ => nearest_interpolate(data, src_width, src_height, c, r),
                    };
                }
            });
        output
    }
}

/// Value of the source pixel containing `(x, y)`.
#[inline]
fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let col = (x.round().max(0.0) as usize).min(width - 1);
    let row = (y.round().max(0.0) as usize).min(height - 1);
    data[row * width + col]
}

/// Bilinear interpolation between the four surrounding pixel centers.
/// Positions in the outer half pixel are clamped to the edge; any NaN corner
/// gives NaN.
#[inline]
fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f32;
    let yf = y - y0 as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// LRU cache of index tables keyed by `(source grid, target grid)`.
pub struct ResampleCache {
    tables: Mutex<LruCache<(u64, u64), Arc<IndexTable>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResampleCache {
    /// Create a cache holding up to `entries` tables.
    pub fn new(entries: usize) -> Self {
        let capacity = NonZeroUsize::new(entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            tables: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch the table for a grid pair, building it on a miss.
    ///
    /// The table is built outside the lock; two threads missing on the same
    /// pair at once both build it and the second insert wins.
    pub fn get_or_build(
        &self,
        src: &AreaDefinition,
        dst: &AreaDefinition,
        chunk_rows: usize,
    ) -> SceneResult<Arc<IndexTable>> {
        let key = (grid_fingerprint(src), grid_fingerprint(dst));

        if let Some(table) = self.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(table));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let table = Arc::new(IndexTable::build(src, dst, chunk_rows)?);
        debug!(
            src = %src.area_id,
            dst = %dst.area_id,
            coverage = table.coverage(),
            "Built resample index table"
        );
        self.lock().put(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().len(),
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<(u64, u64), Arc<IndexTable>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ResampleCache {
    fn default() -> Self {
        Self::new(8)
    }
}

impl std::fmt::Debug for ResampleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResampleCache")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Hash of the grid geometry; the area id is ignored.
fn grid_fingerprint(area: &AreaDefinition) -> u64 {
    let mut hasher = DefaultHasher::new();
    area.crs.to_proj4().hash(&mut hasher);
    area.width.hash(&mut hasher);
    area.height.hash(&mut hasher);
    for v in [
        area.extent.min_x,
        area.extent.min_y,
        area.extent.max_x,
        area.extent.max_y,
    ] {
        v.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}
