//! Pixel windows of geographic boxes.

use projection::MapProjection;
use scene_common::{AreaDefinition, BoundingBox};

use crate::error::SceneResult;

/// Points sampled along each edge of the box.
const EDGE_SAMPLES: usize = 64;
/// Interior lattice size, catches boxes whose edges leave the Earth disk.
const INTERIOR_SAMPLES: usize = 16;

/// Half-open pixel ranges `cols.0..cols.1`, `rows.0..rows.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub cols: (usize, usize),
    pub rows: (usize, usize),
}

impl PixelWindow {
    pub fn width(&self) -> usize {
        self.cols.1 - self.cols.0
    }

    pub fn height(&self) -> usize {
        self.rows.1 - self.rows.0
    }

    /// Same window on a grid `factor` times finer.
    pub fn scaled(&self, factor: usize) -> PixelWindow {
        PixelWindow {
            cols: (self.cols.0 * factor, self.cols.1 * factor),
            rows: (self.rows.0 * factor, self.rows.1 * factor),
        }
    }

    pub fn is_full(&self, area: &AreaDefinition) -> bool {
        self.cols == (0, area.width) && self.rows == (0, area.height)
    }
}

/// Window of `area` pixels touched by the lon/lat box, clamped to the area.
/// `None` when the box does not overlap the area at all.
pub fn pixel_window(area: &AreaDefinition, bbox: &BoundingBox) -> SceneResult<Option<PixelWindow>> {
    let proj = projection::for_crs(&area.crs)?;
    Ok(window_with(proj.as_ref(), area, bbox))
}

fn window_with(
    proj: &dyn MapProjection,
    area: &AreaDefinition,
    bbox: &BoundingBox,
) -> Option<PixelWindow> {
    let mut points = bbox.boundary_points(EDGE_SAMPLES);
    for j in 1..INTERIOR_SAMPLES {
        for i in 1..INTERIOR_SAMPLES {
            let fx = i as f64 / INTERIOR_SAMPLES as f64;
            let fy = j as f64 / INTERIOR_SAMPLES as f64;
            points.push((
                bbox.min_x + fx * bbox.width(),
                bbox.min_y + fy * bbox.height(),
            ));
        }
    }

    // Pixel-edge coordinates: edge k sits between pixels k-1 and k
    let mut min_c = f64::INFINITY;
    let mut max_c = f64::NEG_INFINITY;
    let mut min_r = f64::INFINITY;
    let mut max_r = f64::NEG_INFINITY;
    for (lon, lat) in points {
        if let Some((x, y)) = proj.forward(lon, lat) {
            let (c, r) = area.coord_to_pixel(x, y);
            min_c = min_c.min(c + 0.5);
            max_c = max_c.max(c + 0.5);
            min_r = min_r.min(r + 0.5);
            max_r = max_r.max(r + 0.5);
        }
    }
    if !min_c.is_finite() || !min_r.is_finite() {
        return None;
    }

    let clamp = |v: f64, hi: usize| v.max(0.0).min(hi as f64) as usize;
    let cols = (clamp(min_c.floor(), area.width), clamp(max_c.ceil(), area.width));
    let rows = (clamp(min_r.floor(), area.height), clamp(max_r.ceil(), area.height));
    if cols.0 >= cols.1 || rows.0 >= rows.1 {
        return None;
    }
    Some(PixelWindow { cols, rows })
}
