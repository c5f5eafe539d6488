//! ABI scene handling.
//!
//! A [`Scene`] binds a [`Reader`] to a [`RecipeRegistry`]. Loading products
//! only builds deferred computations; [`Scene::resample`] and
//! [`Scene::crop`] derive new scenes, and a [`Pipeline`] evaluates the
//! requested products on its worker pool.
//!
//! ```no_run
//! use scene::{create_reader, Pipeline, PipelineConfig, ResampleTarget, Scene};
//! use scene_common::ProductKey;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let files = vec![std::path::PathBuf::from("OR_ABI-L1b-RadC-M3C01_G16_s20190730002186_e20190730004559_c20190730005006.nc")];
//! let reader = create_reader("abi_l1b", &files)?;
//! let mut scene = Scene::new(reader);
//! scene.load(&[ProductKey::from("true_color")]);
//!
//! let pipeline = Pipeline::new(PipelineConfig::from_env())?;
//! let resampled = pipeline.resample(&scene, &ResampleTarget::Coarsest, None)?;
//! let evaluated = pipeline.evaluate(&resampled, &[ProductKey::from("true_color")])?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crop;
pub mod error;
pub mod pipeline;
pub mod product;
pub mod raster;
pub mod reader;
pub mod recipes;
pub mod resample;
pub mod scene;

pub use config::PipelineConfig;
pub use crop::PixelWindow;
pub use error::{SceneError, SceneResult};
pub use pipeline::{Evaluated, EvaluatedProduct, EvaluationErrors, Pipeline, TaskError};
pub use product::{LazyRaster, Product, ProductAttrs};
pub use raster::Raster;
pub use reader::{create_reader, AbiL1bReader, DatasetInfo, MemoryReader, Reader};
pub use recipes::{Compositor, Recipe, RecipeRegistry};
pub use resample::{ResampleCache, ResampleMethod, ResampleTarget, Resampler};
pub use scene::{LoadReport, Scene};
