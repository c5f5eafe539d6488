//! Geostationary satellite projection.
//!
//! This projection is used for GOES-R series satellite imagery.
//! The satellite views Earth from a fixed position above the equator.
//! Projection coordinates are scan angles multiplied by the perspective
//! point height, i.e. meters on a plane tangent at nadir, which is how
//! GDAL and PROJ express `+proj=geos`.
//!
//! Reference: GOES-R Product Definition and Users' Guide (PUG) Volume 4

use crate::geographic::wrap_longitude;
use crate::{MapProjection, ProjectionError};
use scene_common::GeosParams;

/// Geostationary projection (sweep angle axis x).
#[derive(Debug, Clone)]
pub struct Geostationary {
    /// Satellite distance from Earth center (meters)
    pub h: f64,
    /// Perspective point height above Earth surface (meters)
    pub perspective_point_height: f64,
    /// Semi-major axis of Earth ellipsoid (meters)
    pub req: f64,
    /// Semi-minor axis of Earth ellipsoid (meters)
    pub rpol: f64,
    /// Longitude of satellite nadir point (radians)
    pub lambda_0: f64,
}

impl Geostationary {
    pub fn new(params: &GeosParams) -> Result<Self, ProjectionError> {
        if !params.sweep_x {
            return Err(ProjectionError::InvalidParameter {
                name: "sweep",
                value: 0.0,
            });
        }
        for (name, value) in [
            ("perspective_point_height", params.perspective_point_height),
            ("semi_major_axis", params.semi_major_axis),
            ("semi_minor_axis", params.semi_minor_axis),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ProjectionError::InvalidParameter { name, value });
            }
        }

        Ok(Self {
            h: params.perspective_point_height + params.semi_major_axis,
            perspective_point_height: params.perspective_point_height,
            req: params.semi_major_axis,
            rpol: params.semi_minor_axis,
            lambda_0: params.longitude_origin.to_radians(),
        })
    }

    /// GOES-16 (GOES-East at 75°W).
    pub fn goes16() -> Self {
        let p = GeosParams::goes16();
        Self {
            h: p.perspective_point_height + p.semi_major_axis,
            perspective_point_height: p.perspective_point_height,
            req: p.semi_major_axis,
            rpol: p.semi_minor_axis,
            lambda_0: p.longitude_origin.to_radians(),
        }
    }

    /// Convert scan angles (radians) to geographic coordinates (lon/lat degrees).
    ///
    /// Based on GOES-R PUG Volume 4, Section 4.2.8.
    /// Returns None if the scan angle points to space (off Earth).
    pub fn scan_to_geo(&self, x_rad: f64, y_rad: f64) -> Option<(f64, f64)> {
        let sin_x = x_rad.sin();
        let cos_x = x_rad.cos();
        let sin_y = y_rad.sin();
        let cos_y = y_rad.cos();

        // Quadratic for the distance from satellite to the surface
        let a = sin_x.powi(2)
            + cos_x.powi(2) * (cos_y.powi(2) + (self.req / self.rpol).powi(2) * sin_y.powi(2));
        let b = -2.0 * self.h * cos_x * cos_y;
        let c = self.h.powi(2) - self.req.powi(2);

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let rs = (-b - discriminant.sqrt()) / (2.0 * a);

        let sx = rs * cos_x * cos_y;
        let sy = -rs * sin_x;
        let sz = rs * cos_x * sin_y;

        let lat = ((self.req / self.rpol).powi(2) * sz / (self.h - sx).hypot(sy)).atan();
        let lon = self.lambda_0 - sy.atan2(self.h - sx);

        Some((wrap_longitude(lon.to_degrees()), lat.to_degrees()))
    }

    /// Convert geographic coordinates (lon/lat degrees) to scan angles (radians).
    ///
    /// Returns None if the point is not visible from the satellite.
    pub fn geo_to_scan(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat_deg) || !lon_deg.is_finite() {
            return None;
        }
        let lat_rad = lat_deg.to_radians();
        let lon_rad = lon_deg.to_radians();

        // Geocentric latitude
        let phi_c = ((self.rpol / self.req).powi(2) * lat_rad.tan()).atan();
        let e2 = 1.0 - (self.rpol / self.req).powi(2);
        let rc = self.rpol / (1.0 - e2 * phi_c.cos().powi(2)).sqrt();

        let dlon = lon_rad - self.lambda_0;
        let sx = self.h - rc * phi_c.cos() * dlon.cos();
        let sy = -rc * phi_c.cos() * dlon.sin();
        let sz = rc * phi_c.sin();

        if sx <= 0.0 {
            return None;
        }

        // Surface point must face the satellite (limb test on the ellipsoid)
        let facing = self.h * (self.h - sx)
            - (sy.powi(2) + (self.req / self.rpol).powi(2) * sz.powi(2));
        if facing < 0.0 {
            return None;
        }

        let y_rad = sz.atan2(sx.hypot(sy));
        let x_rad = (-sy).atan2(sx);

        Some((x_rad, y_rad))
    }
}

impl MapProjection for Geostationary {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (x_rad, y_rad) = self.geo_to_scan(lon, lat)?;
        Some((
            x_rad * self.perspective_point_height,
            y_rad * self.perspective_point_height,
        ))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.scan_to_geo(
            x / self.perspective_point_height,
            y / self.perspective_point_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// GOES-16 CONUS sector outer edges in meters.
    const CONUS_X: (f64, f64) = (-3627271.0, 1382771.0);
    const CONUS_Y: (f64, f64) = (1583173.0, 4589199.0);

    #[test]
    fn test_nadir() {
        let proj = Geostationary::goes16();
        let (lon, lat) = proj.inverse(0.0, 0.0).unwrap();
        assert!((lon - (-75.0)).abs() < 1e-9, "nadir lon {}", lon);
        assert!(lat.abs() < 1e-9, "nadir lat {}", lat);

        let (x, y) = proj.forward(-75.0, 0.0).unwrap();
        assert!(x.abs() < 1e-3);
        assert!(y.abs() < 1e-3);
    }

    #[test]
    fn test_kansas_in_conus() {
        let proj = Geostationary::goes16();
        let (x, y) = proj.forward(-95.0, 39.0).unwrap();
        assert!(x > CONUS_X.0 && x < CONUS_X.1, "x = {}", x);
        assert!(y > CONUS_Y.0 && y < CONUS_Y.1, "y = {}", y);

        let (lon, lat) = proj.inverse(x, y).unwrap();
        assert!((lon - (-95.0)).abs() < 1e-6);
        assert!((lat - 39.0).abs() < 1e-6);
    }

    #[test]
    fn test_conus_corners_on_earth() {
        let proj = Geostationary::goes16();
        for x in [CONUS_X.0, CONUS_X.1] {
            for y in [CONUS_Y.0, CONUS_Y.1] {
                let (lon, lat) = proj.inverse(x, y).unwrap();
                assert!((-180.0..=180.0).contains(&lon));
                assert!((0.0..=90.0).contains(&lat));
            }
        }
    }

    #[test]
    fn test_space_and_far_side() {
        let proj = Geostationary::goes16();
        // Scan angle beyond the Earth disk (about 0.152 rad at the equator)
        assert!(proj.inverse(0.17 * 35786023.0, 0.0).is_none());
        assert!(proj.forward(105.0, 0.0).is_none());
        assert!(proj.forward(180.0, 0.0).is_none());
    }

    #[test]
    fn test_rejects_sweep_y() {
        let params = GeosParams {
            sweep_x: false,
            ..GeosParams::goes16()
        };
        assert!(Geostationary::new(&params).is_err());
    }
}
