//! The scene workflow behind the `run` and `info` subcommands.
//!
//! Everything here is synchronous and CPU bound; callers on the async
//! runtime hand it to `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use geotiff_writer::{save_datasets, ExportOptions, ExportReport};
use renderer::{render_product, EnhancementRegistry};
use scene::{create_reader, Evaluated, Pipeline, PipelineConfig, Reader, Scene};
use scene_common::ProductKey;
use tracing::{debug, info, warn};

use crate::run_config::RunPlan;

/// Summary of one run, printed by the binary.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub loaded: Vec<String>,
    pub missing: Vec<String>,
    pub exported: Vec<PathBuf>,
    pub cropped: Vec<PathBuf>,
    pub rendered: Vec<PathBuf>,
    pub failures: Vec<String>,
}

/// Names a reader bound to `files` can provide.
pub fn describe(files: &[PathBuf]) -> Result<(Vec<String>, Vec<String>)> {
    let reader = create_reader("abi_l1b", files).context("Failed to open ABI files")?;
    let scene = Scene::new(reader);
    Ok((scene.available_dataset_names(), scene.available_composite_names()))
}

/// Load, resample, export, crop and render.
pub fn run(
    plan: &RunPlan,
    files: &[PathBuf],
    output_dir: &Path,
    config: PipelineConfig,
    export_options: &ExportOptions,
) -> Result<RunSummary> {
    let reader = create_reader("abi_l1b", files).context("Failed to open ABI files")?;
    run_with_reader(plan, reader, output_dir, config, export_options)
}

pub fn run_with_reader(
    plan: &RunPlan,
    reader: Arc<dyn Reader>,
    output_dir: &Path,
    config: PipelineConfig,
    export_options: &ExportOptions,
) -> Result<RunSummary> {
    let registry = enhancement_registry(plan, config.chunk_rows)?;
    let pipeline = Pipeline::new(config).context("Failed to start worker pool")?;
    let mut summary = RunSummary::default();

    let mut scene = Scene::new(reader);
    let report = scene.load(&plan.products);
    for (key, err) in &report.unresolved {
        warn!(product = %key, error = %err, "Product unavailable");
        summary.missing.push(key.to_string());
    }
    info!(
        loaded = report.loaded.len(),
        deferred = report.deferred.len(),
        unresolved = report.unresolved.len(),
        "Products loaded"
    );
    if scene.is_empty() {
        bail!("None of the requested products could be loaded");
    }

    let resampled = pipeline
        .resample(&scene, &plan.target, plan.resampler)
        .context("Resampling failed")?;
    let keys = available_keys(&resampled, &plan.products, &mut summary);
    let evaluated = evaluate(&pipeline, &resampled, &keys, &mut summary);
    if evaluated.is_empty() {
        bail!("No product could be evaluated");
    }
    summary.loaded = evaluated.names();

    let report = save_datasets(&evaluated, &[], output_dir, export_options)
        .context("GeoTIFF export failed")?;
    summary.exported = collect_report(report, &mut summary.failures);

    let display = match plan.bbox {
        Some(bbox) => {
            let cropped = resampled.crop(&bbox).context("Crop failed")?;
            let evaluated = evaluate(&pipeline, &cropped, &keys, &mut summary);
            let report = save_datasets(
                &evaluated,
                &[],
                &output_dir.join("cropped"),
                export_options,
            )
            .context("GeoTIFF export of the cropped scene failed")?;
            summary.cropped = collect_report(report, &mut summary.failures);
            evaluated
        }
        None => evaluated,
    };

    let rendered = render_all(&pipeline, &display, &plan.render, &registry, output_dir);
    for (name, result) in rendered.results {
        match result {
            Ok(path) => summary.rendered.push(path),
            Err(message) => summary.failures.push(format!("{}: {}", name, message)),
        }
    }

    Ok(summary)
}

/// PNG output of the render step.
struct RenderBatch {
    /// Worker threads the enhancements ran on
    threads: usize,
    results: Vec<(String, std::result::Result<PathBuf, String>)>,
}

/// Render `names` from `display` on the pipeline's worker pool, so the
/// row-parallel enhancements use the configured number of workers.
fn render_all(
    pipeline: &Pipeline,
    display: &Evaluated,
    names: &[String],
    registry: &EnhancementRegistry,
    output_dir: &Path,
) -> RenderBatch {
    pipeline.install(|| {
        let threads = rayon::current_num_threads();
        debug!(products = names.len(), threads, "Rendering products");
        let results = names
            .iter()
            .map(|name| {
                let Some(product) = display.get(name) else {
                    return (name.clone(), Err("not evaluated, nothing to render".to_string()));
                };
                let path = output_dir.join(format!("{}.png", name));
                let result = render_product(&product.raster, &product.attrs, registry)
                    .and_then(|image| image.save_png(&path));
                match result {
                    Ok(()) => {
                        info!(product = %name, path = %path.display(), "Rendered PNG");
                        (name.clone(), Ok(path))
                    }
                    Err(e) => {
                        warn!(product = %name, error = %e, "Rendering failed");
                        (name.clone(), Err(e.to_string()))
                    }
                }
            })
            .collect();
        RenderBatch { threads, results }
    })
}

fn enhancement_registry(plan: &RunPlan, chunk_rows: usize) -> Result<EnhancementRegistry> {
    let mut registry = EnhancementRegistry::defaults().with_chunk_rows(chunk_rows);
    if let Some(path) = &plan.enhancements {
        registry
            .merge_file(path)
            .with_context(|| format!("Failed to load enhancements from {}", path.display()))?;
        info!(path = %path.display(), "Loaded enhancement definitions");
    }
    Ok(registry)
}

/// Requested keys the resampled scene can provide. Composites deferred at
/// load time are built by now; anything still absent is reported missing.
fn available_keys(scene: &Scene, requested: &[ProductKey], summary: &mut RunSummary) -> Vec<ProductKey> {
    requested
        .iter()
        .filter(|key| {
            let present = scene.contains(key);
            if !present && !summary.missing.contains(&key.to_string()) {
                summary.missing.push(key.to_string());
            }
            present
        })
        .cloned()
        .collect()
}

fn evaluate(pipeline: &Pipeline, scene: &Scene, keys: &[ProductKey], summary: &mut RunSummary) -> Evaluated {
    match pipeline.evaluate(scene, keys) {
        Ok(evaluated) => evaluated,
        Err(errors) => {
            for task in &errors.errors {
                summary
                    .failures
                    .push(format!("{}: {}", task.product, task.source.root_cause()));
            }
            errors.completed
        }
    }
}

fn collect_report(report: ExportReport, failures: &mut Vec<String>) -> Vec<PathBuf> {
    for err in &report.failed {
        warn!(product = ?err.product(), error = %err, "Export failed");
        failures.push(err.to_string());
    }
    report.written.into_iter().map(|(_, path)| path).collect()
}
