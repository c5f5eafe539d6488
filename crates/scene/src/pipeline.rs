//! Explicit evaluation of deferred products on a fixed worker pool.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use scene_common::{AreaDefinition, ProductKey};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{SceneError, SceneResult};
use crate::product::ProductAttrs;
use crate::raster::Raster;
use crate::resample::{ResampleMethod, ResampleTarget, Resampler};
use crate::scene::Scene;

/// A computed product.
#[derive(Debug, Clone)]
pub struct EvaluatedProduct {
    pub attrs: ProductAttrs,
    pub area: AreaDefinition,
    pub raster: Arc<Raster>,
}

/// Products computed by one [`Pipeline::evaluate`] call, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Evaluated {
    products: BTreeMap<String, EvaluatedProduct>,
}

impl Evaluated {
    /// Add a product, replacing one with the same name.
    pub fn insert(&mut self, product: EvaluatedProduct) {
        self.products.insert(product.attrs.name.clone(), product);
    }

    pub fn get(&self, name: &str) -> Option<&EvaluatedProduct> {
        self.products.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.products.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EvaluatedProduct)> {
        self.products.iter()
    }
}

/// Failure of one product's evaluation.
#[derive(Error, Debug)]
#[error("product '{product}' failed")]
pub struct TaskError {
    pub product: String,
    #[source]
    pub source: SceneError,
}

/// Every failure of an evaluation, plus whatever completed.
#[derive(Error, Debug)]
#[error("{} of {} products failed to evaluate", .errors.len(), .errors.len() + .completed.len())]
pub struct EvaluationErrors {
    pub errors: Vec<TaskError>,
    pub completed: Evaluated,
}

/// Progress of one evaluation. The summary is logged when the guard is
/// dropped, whether evaluation finished or bailed out.
struct ProgressGuard {
    total: usize,
    done: AtomicUsize,
    failed: AtomicUsize,
    started: Instant,
}

impl ProgressGuard {
    fn new(total: usize) -> Self {
        info!(products = total, "Evaluation started");
        Self {
            total,
            done: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    fn record(&self, product: &str, ok: bool) {
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(product = %product, done = done, total = self.total, ok = ok, "Evaluated product");
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        let failed = self.failed.load(Ordering::Relaxed);
        let done = self.done.load(Ordering::Relaxed);
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        if failed > 0 {
            warn!(done, failed, total = self.total, elapsed_ms, "Evaluation finished with errors");
        } else {
            info!(done, total = self.total, elapsed_ms, "Evaluation finished");
        }
    }
}

/// Evaluates scenes on a dedicated pool of `num_workers` threads.
pub struct Pipeline {
    config: PipelineConfig,
    pool: rayon::ThreadPool,
    resampler: Resampler,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("resampler", &self.resampler)
            .finish()
    }
}

impl Pipeline {
    /// Validate `config` and start the worker pool.
    pub fn new(config: PipelineConfig) -> SceneResult<Self> {
        config.validate().map_err(SceneError::Config)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .thread_name(|i| format!("abi-worker-{}", i))
            .build()
            .map_err(|e| SceneError::ThreadPool(e.to_string()))?;
        let resampler = Resampler::from_config(&config);

        info!(
            workers = config.num_workers,
            chunk_rows = config.chunk_rows,
            resampler = %config.default_resampler,
            "Pipeline ready"
        );
        Ok(Self {
            config,
            pool,
            resampler,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn resampler(&self) -> &Resampler {
        &self.resampler
    }

    /// Resample `scene` with `method`, or the configured default.
    pub fn resample(
        &self,
        scene: &Scene,
        target: &ResampleTarget,
        method: Option<ResampleMethod>,
    ) -> SceneResult<Scene> {
        let method = method.unwrap_or(self.config.default_resampler);
        scene.resample(target, method, &self.resampler)
    }

    /// Run `f` on the worker pool.
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }

    /// Compute the products for `keys` in parallel.
    ///
    /// Every key is attempted; the failures of all keys are returned together
    /// with the products that did complete.
    pub fn evaluate(
        &self,
        scene: &Scene,
        keys: &[ProductKey],
    ) -> Result<Evaluated, EvaluationErrors> {
        let mut errors = Vec::new();
        let mut products = Vec::new();
        let mut seen = BTreeSet::new();
        for key in keys {
            match scene.get(key) {
                Some(product) => {
                    if seen.insert(product.name().to_string()) {
                        products.push(product);
                    }
                }
                None => errors.push(TaskError {
                    product: key.to_string(),
                    source: SceneError::NotLoaded(key.to_string()),
                }),
            }
        }

        let progress = ProgressGuard::new(products.len());
        let results: Vec<(String, SceneResult<EvaluatedProduct>)> = self.pool.install(|| {
            products
                .par_iter()
                .map(|product| {
                    let result = product.compute().map(|raster| EvaluatedProduct {
                        attrs: product.attrs.clone(),
                        area: product.area.clone(),
                        raster,
                    });
                    progress.record(product.name(), result.is_ok());
                    (product.name().to_string(), result)
                })
                .collect()
        });
        drop(progress);

        let mut completed = Evaluated::default();
        for (name, result) in results {
            match result {
                Ok(product) => {
                    completed.products.insert(name, product);
                }
                Err(source) => {
                    warn!(product = %name, error = %source.root_cause(), "Product evaluation failed");
                    errors.push(TaskError {
                        product: name,
                        source,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(completed)
        } else {
            Err(EvaluationErrors { errors, completed })
        }
    }
}
