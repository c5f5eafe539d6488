//! Area (grid) definitions.
//!
//! An area pairs a CRS with a regular pixel grid. The extent holds the
//! outer edges of the edge pixels in projection units, and row 0 is the
//! northern (max y) row, matching GeoTIFF's north-up convention.

use crate::{BoundingBox, Crs};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outer pixel-edge extent in projection units.
pub type Extent = BoundingBox;

/// Relative tolerance (fraction of a pixel) used when comparing grids.
const GRID_TOLERANCE: f64 = 0.01;

/// Errors raised when constructing or deriving areas.
#[derive(Debug, Error, PartialEq)]
pub enum AreaError {
    #[error("area '{0}' has an empty shape ({1}x{2})")]
    EmptyShape(String, usize, usize),

    #[error("area '{0}' has an invalid extent: {1:?}")]
    InvalidExtent(String, Extent),

    #[error("area '{area}' ({width}x{height}) cannot be scaled by factor {factor}")]
    NotDivisible {
        area: String,
        width: usize,
        height: usize,
        factor: usize,
    },

    #[error("window cols {cols:?} rows {rows:?} is outside area '{area}'")]
    WindowOutOfBounds {
        area: String,
        cols: (usize, usize),
        rows: (usize, usize),
    },
}

/// How a target grid relates to a source grid sharing CRS and extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridRelation {
    /// Identical grids.
    Same,
    /// Target pixels are `n` times larger than source pixels.
    Coarsen(usize),
    /// Target pixels are `n` times smaller than source pixels.
    Refine(usize),
}

/// A regular grid in some CRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDefinition {
    /// Human readable identifier, e.g. `goes16_conus_2km`
    pub area_id: String,
    pub crs: Crs,
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
    pub extent: Extent,
}

impl AreaDefinition {
    /// Create a validated area.
    pub fn new(
        area_id: impl Into<String>,
        crs: Crs,
        width: usize,
        height: usize,
        extent: Extent,
    ) -> Result<Self, AreaError> {
        let area_id = area_id.into();
        if width == 0 || height == 0 {
            return Err(AreaError::EmptyShape(area_id, width, height));
        }
        if !extent.is_valid() {
            return Err(AreaError::InvalidExtent(area_id, extent));
        }
        Ok(Self {
            area_id,
            crs,
            width,
            height,
            extent,
        })
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pixel size `(dx, dy)`, both positive.
    pub fn pixel_size(&self) -> (f64, f64) {
        (
            self.extent.width() / self.width as f64,
            self.extent.height() / self.height as f64,
        )
    }

    /// Projection coordinates of a pixel center. Fractional indices are allowed.
    #[inline]
    pub fn pixel_center(&self, col: f64, row: f64) -> (f64, f64) {
        let (dx, dy) = self.pixel_size();
        (
            self.extent.min_x + (col + 0.5) * dx,
            self.extent.max_y - (row + 0.5) * dy,
        )
    }

    /// Continuous pixel indices `(col, row)` of a projection coordinate.
    ///
    /// Integer values land on pixel centers; the pixel containing the point
    /// is `col.round()`, `row.round()`.
    #[inline]
    pub fn coord_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let (dx, dy) = self.pixel_size();
        (
            (x - self.extent.min_x) / dx - 0.5,
            (self.extent.max_y - y) / dy - 0.5,
        )
    }

    /// GDAL affine geotransform.
    pub fn geo_transform(&self) -> [f64; 6] {
        let (dx, dy) = self.pixel_size();
        [self.extent.min_x, dx, 0.0, self.extent.max_y, 0.0, -dy]
    }

    /// Whether this area is coarser (larger pixels) than `other`.
    pub fn coarser_than(&self, other: &AreaDefinition) -> bool {
        self.pixel_size().0 > other.pixel_size().0 * (1.0 + GRID_TOLERANCE)
    }

    /// Compare grid geometry ignoring the area id.
    pub fn same_grid(&self, other: &AreaDefinition) -> bool {
        matches!(self.resolution_ratio(other), Some(GridRelation::Same))
    }

    /// Relationship of `target` to this grid, if both share CRS and extent
    /// and their shapes differ by one integer factor.
    pub fn resolution_ratio(&self, target: &AreaDefinition) -> Option<GridRelation> {
        if self.crs != target.crs {
            return None;
        }
        let fine_px = self.pixel_size().0.min(target.pixel_size().0);
        let tol = fine_px * GRID_TOLERANCE;
        let e1 = &self.extent;
        let e2 = &target.extent;
        if (e1.min_x - e2.min_x).abs() > tol
            || (e1.max_x - e2.max_x).abs() > tol
            || (e1.min_y - e2.min_y).abs() > tol
            || (e1.max_y - e2.max_y).abs() > tol
        {
            return None;
        }

        if self.width == target.width && self.height == target.height {
            return Some(GridRelation::Same);
        }
        if self.width > target.width
            && self.width % target.width == 0
            && self.height % target.height == 0
            && self.width / target.width == self.height / target.height
        {
            return Some(GridRelation::Coarsen(self.width / target.width));
        }
        if target.width > self.width
            && target.width % self.width == 0
            && target.height % self.height == 0
            && target.width / self.width == target.height / self.height
        {
            return Some(GridRelation::Refine(target.width / self.width));
        }
        None
    }

    /// Same extent with pixels `factor` times larger.
    pub fn coarsen(&self, factor: usize) -> Result<AreaDefinition, AreaError> {
        if factor == 0 || self.width % factor != 0 || self.height % factor != 0 {
            return Err(self.not_divisible(factor));
        }
        Ok(AreaDefinition {
            area_id: format!("{}_coarse{}", self.area_id, factor),
            crs: self.crs.clone(),
            width: self.width / factor,
            height: self.height / factor,
            extent: self.extent,
        })
    }

    /// Same extent with pixels `factor` times smaller.
    pub fn refine(&self, factor: usize) -> Result<AreaDefinition, AreaError> {
        if factor == 0 {
            return Err(self.not_divisible(factor));
        }
        Ok(AreaDefinition {
            area_id: format!("{}_fine{}", self.area_id, factor),
            crs: self.crs.clone(),
            width: self.width * factor,
            height: self.height * factor,
            extent: self.extent,
        })
    }

    /// Sub-grid covering columns `cols.0..cols.1` and rows `rows.0..rows.1`.
    ///
    /// The pixel size and alignment of the parent grid are preserved.
    pub fn slice(
        &self,
        cols: (usize, usize),
        rows: (usize, usize),
    ) -> Result<AreaDefinition, AreaError> {
        if cols.0 >= cols.1 || rows.0 >= rows.1 || cols.1 > self.width || rows.1 > self.height {
            return Err(AreaError::WindowOutOfBounds {
                area: self.area_id.clone(),
                cols,
                rows,
            });
        }
        let (dx, dy) = self.pixel_size();
        let extent = Extent::new(
            self.extent.min_x + cols.0 as f64 * dx,
            self.extent.max_y - rows.1 as f64 * dy,
            self.extent.min_x + cols.1 as f64 * dx,
            self.extent.max_y - rows.0 as f64 * dy,
        );
        Ok(AreaDefinition {
            area_id: format!("{}_crop", self.area_id),
            crs: self.crs.clone(),
            width: cols.1 - cols.0,
            height: rows.1 - rows.0,
            extent,
        })
    }

    fn not_divisible(&self, factor: usize) -> AreaError {
        AreaError::NotDivisible {
            area: self.area_id.clone(),
            width: self.width,
            height: self.height,
            factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latlon_area(width: usize, height: usize) -> AreaDefinition {
        AreaDefinition::new(
            "test",
            Crs::LatLon,
            width,
            height,
            Extent::new(-100.0, 30.0, -90.0, 40.0),
        )
        .unwrap()
    }

    #[test]
    fn test_pixel_center_roundtrip() {
        let area = latlon_area(10, 10);
        let (x, y) = area.pixel_center(0.0, 0.0);
        assert!((x - (-99.5)).abs() < 1e-9);
        assert!((y - 39.5).abs() < 1e-9);

        let (col, row) = area.coord_to_pixel(x, y);
        assert!(col.abs() < 1e-9);
        assert!(row.abs() < 1e-9);
    }

    #[test]
    fn test_geo_transform() {
        let area = latlon_area(20, 10);
        let gt = area.geo_transform();
        assert_eq!(gt[0], -100.0);
        assert_eq!(gt[1], 0.5);
        assert_eq!(gt[3], 40.0);
        assert_eq!(gt[5], -1.0);
    }

    #[test]
    fn test_relation() {
        let fine = latlon_area(20, 20);
        let coarse = latlon_area(10, 10);
        assert_eq!(fine.resolution_ratio(&coarse), Some(GridRelation::Coarsen(2)));
        assert_eq!(coarse.resolution_ratio(&fine), Some(GridRelation::Refine(2)));
        assert!(fine.same_grid(&fine.clone()));
        assert!(coarse.coarser_than(&fine));

        let odd = latlon_area(15, 10);
        assert_eq!(fine.resolution_ratio(&odd), None);
    }

    #[test]
    fn test_coarsen_requires_divisible() {
        let area = latlon_area(10, 10);
        assert!(area.coarsen(2).is_ok());
        assert!(matches!(area.coarsen(3), Err(AreaError::NotDivisible { .. })));
    }

    #[test]
    fn test_slice_preserves_pixel_size() {
        let area = latlon_area(10, 10);
        let sub = area.slice((2, 5), (1, 4)).unwrap();
        assert_eq!(sub.width, 3);
        assert_eq!(sub.height, 3);
        assert_eq!(sub.pixel_size(), area.pixel_size());
        assert!((sub.extent.min_x - (-98.0)).abs() < 1e-9);
        assert!((sub.extent.max_y - 39.0).abs() < 1e-9);
        assert!(area.slice((5, 5), (0, 1)).is_err());
        assert!(area.slice((0, 11), (0, 1)).is_err());
    }

    #[test]
    fn test_empty_shape_rejected() {
        let result = AreaDefinition::new("x", Crs::LatLon, 0, 5, Extent::new(0.0, 0.0, 1.0, 1.0));
        assert!(matches!(result, Err(AreaError::EmptyShape(..))));
    }
}
