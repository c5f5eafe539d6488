//! Common types shared across the ABI scene pipeline crates.

pub mod area;
pub mod bbox;
pub mod channel;
pub mod crs;
pub mod key;

pub use area::{AreaDefinition, AreaError, Extent, GridRelation};
pub use bbox::{BboxParseError, BoundingBox};
pub use channel::{AbiChannel, CalibrationKind, ABI_CHANNELS};
pub use crs::{Crs, GeosParams, LccParams};
pub use key::ProductKey;
