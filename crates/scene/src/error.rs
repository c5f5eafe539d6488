//! Error types for scene operations.

use std::sync::Arc;

use netcdf_parser::NetCdfError;
use projection::ProjectionError;
use scene_common::{AreaError, BoundingBox};
use thiserror::Error;

/// Errors that can occur while loading, resampling, cropping or evaluating
/// a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    /// No reader or recipe provides the requested product.
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// Reader name not registered.
    #[error("unknown reader: {0}")]
    UnknownReader(String),

    /// A composite needs an input the reader cannot provide.
    #[error("product '{product}' requires '{prerequisite}', which is not available")]
    MissingPrerequisite { product: String, prerequisite: String },

    /// Recipe graph contains a cycle.
    #[error("recipe cycle: {}", .0.join(" -> "))]
    RecipeCycle(Vec<String>),

    /// Product was requested for evaluation but is not loaded (or still deferred).
    #[error("product '{0}' is not loaded")]
    NotLoaded(String),

    #[error("no input files given to reader '{0}'")]
    NoFiles(String),

    #[error("files mix observation times: {0}")]
    MixedObservationTimes(String),

    #[error("duplicate file for channel {0}")]
    DuplicateChannel(String),

    /// File reading failed.
    #[error("failed to read '{product}'")]
    Read {
        product: String,
        #[source]
        source: NetCdfError,
    },

    /// Areas cannot be combined with the chosen method.
    #[error("incompatible areas for '{product}': {detail}")]
    IncompatibleAreas { product: String, detail: String },

    /// Resampling failed.
    #[error("resample error: {0}")]
    Resample(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Area(#[from] AreaError),

    /// Crop box does not intersect the data coverage at all.
    #[error("crop box {bbox:?} does not intersect area '{area}'")]
    CropOutsideCoverage { bbox: BoundingBox, area: String },

    /// Compositor rejected its inputs.
    #[error("compositor for '{product}' failed: {message}")]
    Compositor { product: String, message: String },

    /// Raster buffers do not match the declared shape.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// A deferred computation failed; the failure is shared by every reader
    /// of the memoised result.
    #[error("evaluation of '{product}' failed")]
    Evaluation {
        product: String,
        #[source]
        source: Arc<SceneError>,
    },

    #[error("scene has no loaded products")]
    EmptyScene,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl SceneError {
    pub fn unknown_product(key: impl ToString) -> Self {
        Self::UnknownProduct(key.to_string())
    }

    pub fn incompatible(product: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::IncompatibleAreas {
            product: product.into(),
            detail: detail.into(),
        }
    }

    pub fn compositor(product: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compositor {
            product: product.into(),
            message: message.into(),
        }
    }

    /// Innermost error of an evaluation chain.
    pub fn root_cause(&self) -> &SceneError {
        match self {
            SceneError::Evaluation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for scene operations.
pub type SceneResult<T> = std::result::Result<T, SceneError>;
