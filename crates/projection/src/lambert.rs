//! Lambert Conformal Conic projection.
//!
//! Maps a cone tangent or secant to a spherical Earth onto a flat plane.
//! Useful as a regional target grid over mid-latitudes (e.g. CONUS).
//!
//! The projection parameters include:
//! - Latitude of origin (lat_0): where y = 0
//! - Central meridian (lon_0): where x = 0
//! - Standard parallel(s): lat_1 and lat_2 (equal for a tangent cone)

use crate::geographic::wrap_longitude;
use crate::{MapProjection, ProjectionError};
use scene_common::LccParams;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian in radians
    pub lon0: f64,
    /// Sphere radius (meters)
    pub earth_radius: f64,
    /// Cone constant
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl LambertConformal {
    pub fn new(params: &LccParams) -> Result<Self, ProjectionError> {
        for (name, value) in [
            ("lat_0", params.lat_0),
            ("lat_1", params.lat_1),
            ("lat_2", params.lat_2),
        ] {
            if !(value.is_finite() && value.abs() < 90.0) {
                return Err(ProjectionError::InvalidParameter { name, value });
            }
        }
        if !(params.radius.is_finite() && params.radius > 0.0) {
            return Err(ProjectionError::InvalidParameter {
                name: "radius",
                value: params.radius,
            });
        }

        let latin1 = params.lat_1.to_radians();
        let latin2 = params.lat_2.to_radians();

        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone
            latin1.sin()
        } else {
            // Secant cone
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((FRAC_PI_4 + latin2 / 2.0).tan() / (FRAC_PI_4 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };
        if !n.is_finite() || n.abs() < 1e-10 {
            return Err(ProjectionError::DegenerateCone(params.lat_1, params.lat_2));
        }

        let f = (latin1.cos() * (FRAC_PI_4 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = params.radius * f / (FRAC_PI_4 + params.lat_0.to_radians() / 2.0).tan().powf(n);

        Ok(Self {
            lon0: params.lon_0.to_radians(),
            earth_radius: params.radius,
            n,
            f,
            rho0,
        })
    }

    fn rho(&self, lat: f64) -> f64 {
        self.earth_radius * self.f / (FRAC_PI_4 + lat / 2.0).tan().powf(self.n)
    }
}

impl MapProjection for LambertConformal {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let lat = lat.to_radians();
        // The pole opposite the cone apex maps to infinity
        if (lat + self.n.signum() * FRAC_PI_2).abs() < 1e-10 {
            return None;
        }

        let mut dlon = lon.to_radians() - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let rho = self.rho(lat);
        let theta = self.n * dlon;
        Some((rho * theta.sin(), self.rho0 - rho * theta.cos()))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let dy = self.rho0 - y;
        let mut rho = x.hypot(dy);
        let theta = if self.n < 0.0 {
            rho = -rho;
            (-x).atan2(-dy)
        } else {
            x.atan2(dy)
        };

        let lat = if rho == 0.0 {
            self.n.signum() * FRAC_PI_2
        } else {
            2.0 * ((self.earth_radius * self.f / rho).powf(1.0 / self.n)).atan() - FRAC_PI_2
        };
        let lon = self.lon0 + theta / self.n;

        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some((wrap_longitude(lon.to_degrees()), lat.to_degrees()))
    }
}
