//! Pipeline evaluation on synthetic scenes.

use std::sync::Arc;

use scene::{
    DatasetInfo, MemoryReader, Pipeline, PipelineConfig, Raster, Reader, ResampleTarget, Scene,
    SceneError, SceneResult,
};
use scene_common::ProductKey;
use test_utils::assert_approx_eq;

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig {
        num_workers: 2,
        chunk_rows: 7,
        ..Default::default()
    })
    .unwrap()
}

fn keys(names: &[&str]) -> Vec<ProductKey> {
    names.iter().map(|n| ProductKey::from(*n)).collect()
}

/// Reader whose C13 reads fail.
struct BrokenReader {
    inner: MemoryReader,
}

impl Reader for BrokenReader {
    fn name(&self) -> &str {
        "broken"
    }

    fn available_datasets(&self) -> Vec<DatasetInfo> {
        self.inner.available_datasets()
    }

    fn load_dataset(&self, info: &DatasetInfo) -> SceneResult<Raster> {
        if info.name == "C13" {
            Err(SceneError::InvalidRaster("corrupt C13".to_string()))
        } else {
            self.inner.load_dataset(info)
        }
    }
}

#[test]
fn test_evaluate_resampled_true_color() {
    let pipeline = pipeline();
    let mut scene = Scene::new(Arc::new(MemoryReader::synthetic_abi(20, 12).unwrap()));
    scene.load(&keys(&["true_color", "C13"]));
    let resampled = pipeline
        .resample(&scene, &ResampleTarget::Coarsest, None)
        .unwrap();

    let evaluated = pipeline
        .evaluate(&resampled, &keys(&["true_color", "C13"]))
        .unwrap();
    assert_eq!(evaluated.names(), vec!["C13", "true_color"]);

    let true_color = evaluated.get("true_color").unwrap();
    assert_eq!(true_color.raster.band_count(), 3);
    assert_eq!(true_color.raster.shape(), (12, 20));
    assert_eq!(true_color.attrs.mode, "RGB");

    // Red is C02 averaged from 4x4 blocks of the 0.5 km grid
    let red = true_color.raster.channel(0).unwrap();
    assert!(red.iter().all(|v| v.is_finite()));
    let (lo, hi) = true_color.raster.finite_range(0).unwrap();
    assert!(lo >= 5.0 - 1e-3 && hi <= 87.0 + 1e-3, "range {}..{}", lo, hi);
}

#[test]
fn test_green_is_weighted_sum() {
    let pipeline = pipeline();
    let mut scene = Scene::new(Arc::new(MemoryReader::synthetic_abi(8, 6).unwrap()));
    scene.load(&keys(&["green", "C01", "C02", "C03"]));
    let resampled = pipeline
        .resample(&scene, &ResampleTarget::Coarsest, None)
        .unwrap();
    let evaluated = pipeline
        .evaluate(&resampled, &keys(&["green", "C01", "C02", "C03"]))
        .unwrap();

    let get = |n: &str| evaluated.get(n).unwrap().raster.channels[0].clone();
    let (green, c01, c02, c03) = (get("green"), get("C01"), get("C02"), get("C03"));
    for i in 0..green.len() {
        assert_approx_eq!(green[i], 0.465 * c01[i] + 0.465 * c02[i] + 0.07 * c03[i], 1e-3);
    }
}

#[test]
fn test_deferred_product_is_reported_not_loaded() {
    let pipeline = pipeline();
    let mut scene = Scene::new(Arc::new(MemoryReader::synthetic_abi(8, 6).unwrap()));
    scene.load(&keys(&["true_color", "C13"]));

    let errors = pipeline
        .evaluate(&scene, &keys(&["true_color", "C13"]))
        .unwrap_err();
    assert_eq!(errors.errors.len(), 1);
    assert_eq!(errors.errors[0].product, "true_color");
    assert!(matches!(errors.errors[0].source, SceneError::NotLoaded(_)));
    assert_eq!(errors.completed.names(), vec!["C13"]);
}

#[test]
fn test_task_errors_are_collected() {
    let pipeline = pipeline();
    let reader = BrokenReader {
        inner: MemoryReader::synthetic_abi(8, 6).unwrap(),
    };
    let mut scene = Scene::new(Arc::new(reader));
    scene.load(&keys(&["C13", "dust", "airmass", "C08"]));

    let errors = pipeline
        .evaluate(&scene, &keys(&["C13", "dust", "airmass", "C08"]))
        .unwrap_err();

    let failed: Vec<&str> = errors.errors.iter().map(|e| e.product.as_str()).collect();
    assert_eq!(failed.len(), 3);
    for name in ["C13", "dust", "airmass"] {
        assert!(failed.contains(&name), "{} should fail", name);
    }
    for err in &errors.errors {
        assert!(matches!(err.source.root_cause(), SceneError::InvalidRaster(_)));
    }
    assert_eq!(errors.completed.names(), vec!["C08"]);
    assert!(errors.to_string().contains("3 of 4"));
}
