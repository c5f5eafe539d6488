//! Error types for projection construction.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("Invalid projection parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Standard parallels {0} and {1} do not define a cone")]
    DegenerateCone(f64, f64),
}
