//! Coordinate reference system transformations.
//!
//! Implements the map projections used by ABI areas from scratch. All
//! projections map lon/lat degrees to projection units (meters, or degrees
//! for the geographic CRS) and back.

pub mod error;
pub mod geographic;
pub mod geostationary;
pub mod lambert;

pub use error::ProjectionError;
pub use geographic::Geographic;
pub use geostationary::Geostationary;
pub use lambert::LambertConformal;

use scene_common::Crs;

/// Forward and inverse projection between lon/lat degrees and projection units.
pub trait MapProjection: Send + Sync {
    /// Project `(lon, lat)` degrees. `None` when the point is not representable
    /// (behind the Earth limb, at a singular pole).
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)>;

    /// Unproject to `(lon, lat)` degrees. `None` when `(x, y)` is off the Earth.
    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

/// Build the projection for a CRS description.
pub fn for_crs(crs: &Crs) -> Result<Box<dyn MapProjection>, ProjectionError> {
    Ok(match crs {
        Crs::Geostationary(params) => Box::new(Geostationary::new(params)?),
        Crs::LatLon => Box::new(Geographic),
        Crs::LambertConformal(params) => Box::new(LambertConformal::new(params)?),
    })
}
