//! Display images assembled from enhanced rasters.

use std::path::Path;

use scene::Raster;

use crate::error::{RenderError, RenderResult};
use crate::png;

/// Enhanced values in [0, 1], stored row by row with the band index varying
/// fastest (`data[(row * width + col) * bands + band]`). NaN is no data.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedImage {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub data: Vec<f32>,
}

impl EnhancedImage {
    /// Interleave the channels of a band-sequential raster.
    pub fn from_raster(raster: &Raster) -> Self {
        let bands = raster.band_count();
        let pixels = raster.width * raster.height;
        let mut data = Vec::with_capacity(pixels * bands);
        for i in 0..pixels {
            for channel in &raster.channels {
                data.push(channel[i]);
            }
        }
        Self {
            width: raster.width,
            height: raster.height,
            bands,
            data,
        }
    }

    /// `(rows, cols, bands)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.bands)
    }

    pub fn get(&self, row: usize, col: usize, band: usize) -> Option<f32> {
        if row >= self.height || col >= self.width || band >= self.bands {
            return None;
        }
        self.data.get((row * self.width + col) * self.bands + band).copied()
    }

    /// 8-bit RGBA pixels. Grey images are replicated over RGB; pixels with
    /// no data in any band are fully transparent.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.width * self.height * 4);
        for pixel in self.data.chunks_exact(self.bands.max(1)) {
            let missing = pixel[..self.bands.min(3)].iter().any(|v| v.is_nan());
            let (r, g, b) = match pixel.len() {
                1 | 2 => (pixel[0], pixel[0], pixel[0]),
                _ => (pixel[0], pixel[1], pixel[2]),
            };
            let alpha = if missing {
                0
            } else if pixel.len() == 4 {
                to_u8(pixel[3])
            } else {
                255
            };
            rgba.extend_from_slice(&[to_u8(r), to_u8(g), to_u8(b), alpha]);
        }
        rgba
    }

    /// Encode as PNG, indexed when the image has few colours.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        png::create_png_auto(&self.to_rgba8(), self.width, self.height)
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        let path = path.as_ref();
        let bytes = self.to_png()?;
        std::fs::write(path, bytes).map_err(|source| RenderError::WriteFile {
            path: path.display().to_string(),
            source,
        })
    }
}

fn to_u8(v: f32) -> u8 {
    if v.is_nan() {
        0
    } else {
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}
