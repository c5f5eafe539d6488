//! GeoTIFF export of evaluated synthetic scenes. Needs a GDAL runtime with
//! the MEM and GTiff drivers.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use geotiff_writer::{inspect_geotiff, output_filename, save_datasets, ExportError, ExportOptions};
use scene::{
    Evaluated, EvaluatedProduct, MemoryReader, Pipeline, PipelineConfig, ResampleTarget, Scene,
};
use scene_common::ProductKey;
use test_utils::assert_approx_eq;

fn small_tiles() -> ExportOptions {
    ExportOptions {
        block_size: 16,
        overview_min_dimension: 8,
        ..Default::default()
    }
}

fn evaluate(names: &[&str]) -> Evaluated {
    let pipeline = Pipeline::new(PipelineConfig {
        num_workers: 2,
        ..Default::default()
    })
    .unwrap();
    let keys: Vec<ProductKey> = names.iter().map(|n| ProductKey::from(*n)).collect();
    let mut scene = Scene::new(Arc::new(MemoryReader::synthetic_abi(40, 24).unwrap()));
    scene.load(&keys);
    let resampled = pipeline
        .resample(&scene, &ResampleTarget::Coarsest, None)
        .unwrap();
    pipeline.evaluate(&resampled, &keys).unwrap()
}

#[test]
fn test_one_file_per_product_with_matching_shape() {
    let evaluated = evaluate(&["C13", "true_color", "airmass"]);
    let dir = tempfile::tempdir().unwrap();

    let names: Vec<String> = vec!["C13".into(), "true_color".into(), "airmass".into()];
    let report = save_datasets(&evaluated, &names, dir.path(), &small_tiles()).unwrap();
    assert!(report.is_complete(), "failed: {:?}", report.failed);
    assert_eq!(report.written.len(), 3);

    for name in &names {
        let product = evaluated.get(name).unwrap();
        let info = inspect_geotiff(report.path_of(name).unwrap()).unwrap();
        assert_eq!((info.width, info.height), (product.raster.width, product.raster.height));
        assert_eq!(info.bands, product.raster.band_count());
        assert_eq!(info.block_size, (16, 16));
        assert_eq!(info.overviews, 1);
        assert_eq!(info.compression.as_deref(), Some("DEFLATE"));
        for (got, want) in info.geo_transform.iter().zip(product.area.geo_transform()) {
            assert_approx_eq!(*got, want, 1e-6);
        }
    }
}

#[test]
fn test_empty_names_exports_everything() {
    let evaluated = evaluate(&["C08", "C13"]);
    let dir = tempfile::tempdir().unwrap();
    let report = save_datasets(&evaluated, &[], dir.path(), &small_tiles()).unwrap();
    let written: Vec<&str> = report.written.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(written, vec!["C08", "C13"]);
}

#[test]
fn test_missing_product_does_not_stop_others() {
    let evaluated = evaluate(&["C13"]);
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = vec!["dust".into(), "C13".into()];

    let report = save_datasets(&evaluated, &names, dir.path(), &small_tiles()).unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].product(), Some("dust"));
    assert!(matches!(report.failed[0], ExportError::NotEvaluated(_)));
}

#[test]
fn test_untiled_without_overviews() {
    let evaluated = evaluate(&["C13"]);
    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        tiled: false,
        copy_src_overviews: false,
        compress: "LZW".to_string(),
        ..Default::default()
    };
    let report = save_datasets(&evaluated, &[], dir.path(), &options).unwrap();
    let info = inspect_geotiff(report.path_of("C13").unwrap()).unwrap();
    assert_eq!(info.overviews, 0);
    assert_eq!(info.compression.as_deref(), Some("LZW"));
    assert_ne!(info.block_size, (16, 16));
}

#[test]
fn test_invalid_options_fail_before_writing() {
    let evaluated = evaluate(&["C13"]);
    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        compress: "WEBP2".to_string(),
        ..Default::default()
    };
    let err = save_datasets(&evaluated, &[], dir.path(), &options).unwrap_err();
    assert!(matches!(err, ExportError::InvalidOptions(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_timestamped_filename() {
    let mut evaluated = evaluate(&["C13"]);
    let mut product: EvaluatedProduct = evaluated.get("C13").unwrap().clone();
    product.attrs.start_time = Some(Utc.with_ymd_and_hms(2019, 3, 14, 0, 2, 4).unwrap());
    evaluated.insert(product.clone());

    assert_eq!(output_filename(&product.attrs), "C13_20190314_000204.tif");

    let dir = tempfile::tempdir().unwrap();
    let report = save_datasets(&evaluated, &[], dir.path(), &small_tiles()).unwrap();
    assert_eq!(
        report.path_of("C13").unwrap(),
        dir.path().join("C13_20190314_000204.tif")
    );
}
