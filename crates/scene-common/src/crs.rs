//! Coordinate reference system descriptions.
//!
//! These are plain parameter sets. The math lives in the `projection`
//! crate; this module only describes which projection an area uses and how
//! to spell it for GDAL.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geostationary projection parameters as stored in ABI files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeosParams {
    /// Satellite height above the ellipsoid surface (meters)
    pub perspective_point_height: f64,
    /// Semi-major axis of Earth ellipsoid (meters)
    pub semi_major_axis: f64,
    /// Semi-minor axis of Earth ellipsoid (meters)
    pub semi_minor_axis: f64,
    /// Longitude of satellite nadir point (degrees)
    pub longitude_origin: f64,
    /// Sweep angle axis, `true` for "x" (GOES-R)
    pub sweep_x: bool,
}

impl Default for GeosParams {
    fn default() -> Self {
        Self {
            perspective_point_height: 35786023.0,
            semi_major_axis: 6378137.0,
            semi_minor_axis: 6356752.31414,
            longitude_origin: -75.0,
            sweep_x: true,
        }
    }
}

impl GeosParams {
    /// GOES-16 (GOES-East) operational position.
    pub fn goes16() -> Self {
        Self::default()
    }

    /// GOES-18 (GOES-West) operational position.
    pub fn goes18() -> Self {
        Self {
            longitude_origin: -137.0,
            ..Default::default()
        }
    }
}

/// Lambert conformal conic parameters (spherical earth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LccParams {
    /// Central meridian (degrees)
    pub lon_0: f64,
    /// Latitude of origin (degrees)
    pub lat_0: f64,
    /// First standard parallel (degrees)
    pub lat_1: f64,
    /// Second standard parallel (degrees), equal to `lat_1` for a tangent cone
    pub lat_2: f64,
    /// Sphere radius (meters)
    #[serde(default = "default_sphere_radius")]
    pub radius: f64,
}

fn default_sphere_radius() -> f64 {
    6371229.0
}

/// Coordinate reference system of an area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Crs {
    /// Geostationary satellite view; projection units are meters
    /// (scan angle times perspective height).
    Geostationary(GeosParams),
    /// Plate carrée on WGS84; units are degrees.
    LatLon,
    /// Lambert conformal conic; units are meters.
    LambertConformal(LccParams),
}

impl Crs {
    /// Whether projection units are degrees.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::LatLon)
    }

    /// PROJ.4 definition suitable for `SpatialRef::from_proj4`.
    pub fn to_proj4(&self) -> String {
        match self {
            Crs::Geostationary(p) => format!(
                "+proj=geos +h={} +a={} +b={} +lon_0={} +sweep={} +units=m +no_defs",
                p.perspective_point_height,
                p.semi_major_axis,
                p.semi_minor_axis,
                p.longitude_origin,
                if p.sweep_x { "x" } else { "y" }
            ),
            Crs::LatLon => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            Crs::LambertConformal(p) => format!(
                "+proj=lcc +lon_0={} +lat_0={} +lat_1={} +lat_2={} +R={} +units=m +no_defs",
                p.lon_0, p.lat_0, p.lat_1, p.lat_2, p.radius
            ),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Geostationary(p) => write!(f, "geos(lon_0={})", p.longitude_origin),
            Crs::LatLon => write!(f, "EPSG:4326"),
            Crs::LambertConformal(p) => {
                write!(f, "lcc(lon_0={}, lat_1={}, lat_2={})", p.lon_0, p.lat_1, p.lat_2)
            }
        }
    }
}
