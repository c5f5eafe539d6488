//! Synthetic ABI-like fields.
//!
//! These generators create predictable, verifiable patterns that stand in
//! for calibrated channels in tests. All grids are row-major, row 0 first.

/// Reflectance-like field in percent (0-100).
///
/// A diagonal ramp from dark (top-left) to bright (bottom-right) scaled by
/// `brightness` in [0, 1].
pub fn create_reflectance_grid(width: usize, height: usize, brightness: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x = col as f32 / width.max(1) as f32;
            let y = row as f32 / height.max(1) as f32;
            data.push(((x + y) * 50.0 * brightness).clamp(0.0, 100.0));
        }
    }
    data
}

/// Brightness-temperature-like field in Kelvin.
///
/// A cold cloud shield (about `base - 60` K) centered in the grid over a
/// warm background at `base` K, roughly what a cyclone looks like in the
/// window channels.
pub fn create_brightness_temperature_grid(width: usize, height: usize, base: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = (cx.min(cy)).max(1.0);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let r = (dx * dx + dy * dy).sqrt() / radius;
            let cold = (1.0 - r).clamp(0.0, 1.0);
            data.push(base - 60.0 * cold);
        }
    }
    data
}

/// Creates a test RGBA buffer with a recognizable gradient.
pub fn create_test_rgba_pixels(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for row in 0..height {
        for col in 0..width {
            let r = (col * 255 / width.max(1)) as u8;
            let g = (row * 255 / height.max(1)) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    pixels
}
