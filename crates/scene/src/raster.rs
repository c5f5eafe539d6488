//! In-memory raster buffers.

use crate::error::{SceneError, SceneResult};

/// Row-major multi-channel raster. Every channel holds `width * height`
/// values; NaN marks missing data.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub channels: Vec<Vec<f32>>,
}

impl Raster {
    /// Build a raster, checking that every channel has `width * height` values.
    pub fn new(width: usize, height: usize, channels: Vec<Vec<f32>>) -> SceneResult<Self> {
        if channels.is_empty() {
            return Err(SceneError::InvalidRaster("raster has no channels".to_string()));
        }
        let expected = width * height;
        for (i, channel) in channels.iter().enumerate() {
            if channel.len() != expected {
                return Err(SceneError::InvalidRaster(format!(
                    "channel {} has {} values, expected {}x{}={}",
                    i,
                    channel.len(),
                    width,
                    height,
                    expected
                )));
            }
        }
        Ok(Self {
            width,
            height,
            channels,
        })
    }

    /// Single-channel raster.
    pub fn single(width: usize, height: usize, data: Vec<f32>) -> SceneResult<Self> {
        Self::new(width, height, vec![data])
    }

    pub fn band_count(&self) -> usize {
        self.channels.len()
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    #[inline]
    pub fn get(&self, channel: usize, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.channels
            .get(channel)
            .map(|c| c[row * self.width + col])
    }

    /// Copy of columns `cols.0..cols.1` and rows `rows.0..rows.1`.
    pub fn window(&self, cols: (usize, usize), rows: (usize, usize)) -> SceneResult<Raster> {
        if cols.0 >= cols.1 || rows.0 >= rows.1 || cols.1 > self.width || rows.1 > self.height {
            return Err(SceneError::InvalidRaster(format!(
                "window cols {:?} rows {:?} outside {}x{} raster",
                cols, rows, self.width, self.height
            )));
        }
        let out_w = cols.1 - cols.0;
        let out_h = rows.1 - rows.0;
        let channels = self
            .channels
            .iter()
            .map(|data| {
                let mut out = Vec::with_capacity(out_w * out_h);
                for row in rows.0..rows.1 {
                    let start = row * self.width + cols.0;
                    out.extend_from_slice(&data[start..start + out_w]);
                }
                out
            })
            .collect();
        Ok(Raster {
            width: out_w,
            height: out_h,
            channels,
        })
    }

    /// Minimum and maximum finite value of a channel.
    pub fn finite_range(&self, channel: usize) -> Option<(f32, f32)> {
        let data = self.channels.get(channel)?;
        data.iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Fraction of values that are NaN across all channels.
    pub fn nan_fraction(&self) -> f64 {
        let total: usize = self.channels.iter().map(|c| c.len()).sum();
        if total == 0 {
            return 0.0;
        }
        let nans: usize = self
            .channels
            .iter()
            .map(|c| c.iter().filter(|v| v.is_nan()).count())
            .sum();
        nans as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_lengths() {
        assert!(Raster::new(2, 2, vec![vec![0.0; 4], vec![0.0; 3]]).is_err());
        assert!(Raster::new(2, 2, vec![]).is_err());
        assert!(Raster::single(3, 2, vec![0.0; 6]).is_ok());
    }

    #[test]
    fn test_window() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let raster = Raster::single(4, 3, data).unwrap();
        let win = raster.window((1, 3), (1, 3)).unwrap();
        assert_eq!(win.shape(), (2, 2));
        assert_eq!(win.channels[0], vec![5.0, 6.0, 9.0, 10.0]);
        assert!(raster.window((3, 5), (0, 1)).is_err());
    }

    #[test]
    fn test_finite_range_skips_nan() {
        let raster = Raster::single(3, 1, vec![f32::NAN, 2.0, -1.0]).unwrap();
        assert_eq!(raster.finite_range(0), Some((-1.0, 2.0)));
        assert!((raster.nan_fraction() - 1.0 / 3.0).abs() < 1e-9);
    }
}
