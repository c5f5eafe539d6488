//! NetCDF reader for GOES-R ABI Level 1b radiance files.
//!
//! Opening a file reads only header metadata: dimensions, band, projection,
//! scan-angle coordinates and calibration coefficients. Radiances are read
//! on demand and can be calibrated to reflectance (bands 1-6) or brightness
//! temperature (bands 7-16).
//!
//! # GOES-R ABI Data Structure
//!
//! The main data variable is `Rad`, packed 16-bit counts with a scale and
//! offset. Coordinates `x`/`y` are scan angles in radians; the area built
//! here multiplies them by the perspective point height so extents are in
//! meters, matching `+proj=geos`.

pub mod calibrate;
pub mod error;
pub mod file;
pub mod filename;

pub use calibrate::{calibrate, CalibrationCoefficients, PlanckCoefficients};
pub use error::{NetCdfError, NetCdfResult};
pub use file::{silence_hdf5_errors, AbiL1bFile};
pub use filename::{AbiFilename, Sector};
