//! Plate carrée (equirectangular) lat/lon grid.

use crate::MapProjection;

/// Identity projection; units are degrees and longitudes wrap to [-180, 180).
#[derive(Debug, Clone, Copy, Default)]
pub struct Geographic;

/// Wrap a longitude to [-180, 180).
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

impl MapProjection for Geographic {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some((wrap_longitude(lon), lat))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !x.is_finite() || !(-90.0..=90.0).contains(&y) {
            return None;
        }
        Some((wrap_longitude(x), y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(190.0), -170.0);
        assert_eq!(wrap_longitude(-180.0), -180.0);
        assert_eq!(wrap_longitude(262.5), -97.5);
    }

    #[test]
    fn test_rejects_bad_latitude() {
        assert!(Geographic.forward(0.0, 91.0).is_none());
        assert!(Geographic.inverse(0.0, f64::NAN).is_none());
    }
}
