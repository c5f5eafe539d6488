//! Products and deferred raster computations.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use scene_common::{AreaDefinition, CalibrationKind};
use serde::Serialize;

use crate::error::{SceneError, SceneResult};
use crate::raster::Raster;

/// Descriptive attributes carried with a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAttrs {
    pub name: String,
    pub units: String,
    pub standard_name: String,
    /// Central wavelength (µm) for single channels
    pub wavelength: Option<f32>,
    pub calibration: Option<CalibrationKind>,
    /// `L` for single band, `RGB` for three-band composites
    pub mode: String,
    pub start_time: Option<DateTime<Utc>>,
    pub platform_name: Option<String>,
    pub sensor: String,
    /// Direct prerequisites for composites, empty for raw channels
    pub prerequisites: Vec<String>,
}

impl ProductAttrs {
    pub fn is_composite(&self) -> bool {
        !self.prerequisites.is_empty()
    }
}

type ComputeFn = dyn Fn() -> SceneResult<Raster> + Send + Sync;

struct LazyInner {
    label: String,
    compute: Box<ComputeFn>,
    cell: OnceLock<Result<Arc<Raster>, Arc<SceneError>>>,
}

/// A raster that is computed on first use and memoised.
///
/// Cloning is cheap and clones share the memoised result, so a product used
/// by several composites is read once.
#[derive(Clone)]
pub struct LazyRaster {
    inner: Arc<LazyInner>,
}

impl LazyRaster {
    /// Defer `compute` until [`LazyRaster::compute`] is called.
    pub fn new<F>(label: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> SceneResult<Raster> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(LazyInner {
                label: label.into(),
                compute: Box::new(compute),
                cell: OnceLock::new(),
            }),
        }
    }

    /// Wrap an already computed raster.
    pub fn ready(label: impl Into<String>, raster: Raster) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(Arc::new(raster)));
        Self {
            inner: Arc::new(LazyInner {
                label: label.into(),
                compute: Box::new(|| Err(SceneError::InvalidRaster("already computed".into()))),
                cell,
            }),
        }
    }

    /// Derive a new deferred raster from this one.
    pub fn map<F>(&self, label: impl Into<String>, f: F) -> LazyRaster
    where
        F: Fn(&Raster) -> SceneResult<Raster> + Send + Sync + 'static,
    {
        let source = self.clone();
        LazyRaster::new(label, move || {
            let input = source.compute()?;
            f(&input)
        })
    }

    /// Compute (once) and return the raster.
    pub fn compute(&self) -> SceneResult<Arc<Raster>> {
        // The closure runs outside the cell. It may wait on nested rayon work,
        // and a task stolen meanwhile that needs this raster must not block on
        // an initialisation further down its own stack. Racing first calls may
        // each compute; the first stored result is the one every caller sees.
        let result = match self.inner.cell.get() {
            Some(result) => result,
            None => {
                let computed = (self.inner.compute)().map(Arc::new).map_err(Arc::new);
                self.inner.cell.get_or_init(|| computed)
            }
        };
        match result {
            Ok(raster) => Ok(Arc::clone(raster)),
            Err(err) => Err(SceneError::Evaluation {
                product: self.inner.label.clone(),
                source: Arc::clone(err),
            }),
        }
    }

    pub fn is_computed(&self) -> bool {
        self.inner.cell.get().is_some()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }
}

impl fmt::Debug for LazyRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRaster")
            .field("label", &self.inner.label)
            .field("computed", &self.is_computed())
            .finish()
    }
}

/// A named raster bound to an area, possibly not yet computed.
#[derive(Debug, Clone)]
pub struct Product {
    pub attrs: ProductAttrs,
    pub area: AreaDefinition,
    pub data: LazyRaster,
}

impl Product {
    pub fn name(&self) -> &str {
        &self.attrs.name
    }

    /// `(rows, cols)` of the product grid.
    pub fn shape(&self) -> (usize, usize) {
        self.area.shape()
    }

    pub fn compute(&self) -> SceneResult<Arc<Raster>> {
        self.data.compute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_computed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let lazy = LazyRaster::new("x", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Raster::single(2, 1, vec![1.0, 2.0])
        });
        let clone = lazy.clone();

        assert!(!lazy.is_computed());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        lazy.compute().unwrap();
        clone.compute().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clone.is_computed());
    }

    #[test]
    fn test_shared_input_under_nested_parallelism() {
        use rayon::prelude::*;

        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let shared = LazyRaster::new("shared", || {
            let data: Vec<f32> = (0..4096).into_par_iter().map(|i| i as f32).collect();
            Raster::single(64, 64, data)
        });
        let derived: Vec<LazyRaster> = (0..16)
            .map(|i| {
                shared.map(format!("derived{}", i), |r| {
                    let data = r.channels[0].par_iter().map(|v| v + 1.0).collect();
                    Raster::single(r.width, r.height, data)
                })
            })
            .collect();

        // top-level tasks mix the shared input with products built on it
        let inputs: Vec<Arc<Raster>> = pool.install(|| {
            derived
                .par_iter()
                .map(|lazy| {
                    let out = lazy.compute().unwrap();
                    assert_eq!(out.channels[0][0], 1.0);
                    shared.compute().unwrap()
                })
                .collect()
        });

        let stored = shared.compute().unwrap();
        assert_eq!(inputs.len(), 16);
        assert!(inputs.iter().all(|r| Arc::ptr_eq(r, &stored)));
        assert!(derived.iter().all(LazyRaster::is_computed));
    }

    #[test]
    fn test_map_is_deferred() {
        let base = LazyRaster::ready("base", Raster::single(1, 1, vec![2.0]).unwrap());
        let doubled = base.map("doubled", |r| {
            Raster::single(r.width, r.height, r.channels[0].iter().map(|v| v * 2.0).collect())
        });
        assert!(!doubled.is_computed());
        assert_eq!(doubled.compute().unwrap().channels[0], vec![4.0]);
    }

    #[test]
    fn test_error_is_memoised_with_label() {
        let lazy = LazyRaster::new("broken", || Err(SceneError::UnknownProduct("C99".into())));
        let err = lazy.compute().unwrap_err();
        assert!(matches!(err, SceneError::Evaluation { ref product, .. } if product == "broken"));
        assert!(matches!(err.root_cause(), SceneError::UnknownProduct(_)));
        assert!(lazy.compute().is_err());
    }
}
