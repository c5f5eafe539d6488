//! Scene load, resample and crop behavior on synthetic ABI data.

use std::collections::BTreeSet;
use std::sync::Arc;

use scene::{
    MemoryReader, Recipe, RecipeRegistry, Compositor, ResampleMethod, ResampleTarget, Resampler,
    Scene, SceneError,
};
use scene_common::{AreaDefinition, BoundingBox, Crs, Extent, ProductKey};
use test_utils::fixtures::bbox;

/// 2 km grid of 50 x 30 pixels over the CONUS sector (100 km pixels).
fn conus_reader() -> Arc<MemoryReader> {
    Arc::new(MemoryReader::synthetic_abi(50, 30).unwrap())
}

/// Lat/lon base grid with one degree pixels over 110..80 W, 25..50 N.
fn latlon_reader() -> Arc<MemoryReader> {
    let base = AreaDefinition::new(
        "latlon_2000m",
        Crs::LatLon,
        30,
        25,
        Extent::new(-110.0, 25.0, -80.0, 50.0),
    )
    .unwrap();
    Arc::new(MemoryReader::synthetic_abi_on(&base).unwrap())
}

fn keys(names: &[&str]) -> Vec<ProductKey> {
    names.iter().map(|n| ProductKey::from(*n)).collect()
}

fn all_keys(scene: &Scene) -> Vec<ProductKey> {
    scene
        .all_dataset_names()
        .into_iter()
        .map(ProductKey::from)
        .collect()
}

fn bbox_of(b: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(b.0, b.1, b.2, b.3)
}

#[test]
fn test_available_names() {
    let scene = Scene::new(conus_reader());
    assert_eq!(scene.available_dataset_names().len(), 16);

    let composites = scene.available_composite_names();
    for name in ["airmass", "dust", "green", "natural_color", "overview", "true_color"] {
        assert!(composites.contains(&name.to_string()), "missing {}", name);
    }
    assert!(composites.iter().all(|n| !n.starts_with('_')));
}

#[test]
fn test_composites_without_channels_are_not_available() {
    let reader = MemoryReader::synthetic_abi(10, 6).unwrap();
    let c13 = reader
        .available_datasets()
        .into_iter()
        .find(|d| d.name == "C13")
        .unwrap();
    let raster = scene::Raster::single(10, 6, vec![280.0; 60]).unwrap();
    let only_c13 = MemoryReader::new().with_dataset(c13, raster).unwrap();

    let scene = Scene::new(Arc::new(only_c13));
    assert_eq!(scene.available_composite_names(), vec!["colorized_ir_clouds"]);
}

#[test]
fn test_load_superset_splits_loaded_and_missing() {
    let mut scene = Scene::new(conus_reader());
    let mut requested = all_keys(&scene);
    requested.push(ProductKey::from("not_a_product"));

    let report = scene.load(&requested);

    // Composites with inputs at one resolution build immediately
    for name in ["airmass", "dust", "colorized_ir_clouds", "C02", "C13"] {
        assert!(report.loaded.contains(&name.to_string()), "{} not loaded", name);
    }

    let expected_missing: BTreeSet<String> =
        ["green", "natural_color", "overview", "true_color", "true_color_raw"]
            .iter()
            .map(|s| s.to_string())
            .collect();
    assert_eq!(scene.missing_datasets(), &expected_missing);

    let loaded: BTreeSet<String> = scene.loaded_names().into_iter().collect();
    assert!(loaded.is_disjoint(scene.missing_datasets()));
    assert_eq!(loaded.len() + expected_missing.len(), requested.len() - 1);

    assert_eq!(report.unresolved.len(), 1);
    assert!(matches!(report.unresolved[0].1, SceneError::UnknownProduct(_)));
    assert!(!report.is_complete());
}

#[test]
fn test_hidden_prerequisites_are_not_loaded_names() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&keys(&["airmass"]));
    assert_eq!(scene.loaded_names(), vec!["airmass"]);
    assert!(scene.get(&ProductKey::from("C08")).is_none());
    assert!(scene.get(&ProductKey::from("_airmass_red")).is_none());

    let airmass = scene.get(&ProductKey::from("airmass")).unwrap();
    assert_eq!(airmass.attrs.mode, "RGB");
    assert_eq!(airmass.attrs.prerequisites, vec!["_airmass_red", "_airmass_green", "C08"]);
}

#[test]
fn test_wavelength_key_resolves_to_channel() {
    let mut scene = Scene::new(conus_reader());
    let report = scene.load(&[ProductKey::Wavelength(10.35)]);
    assert_eq!(report.loaded, vec!["C13"]);
    assert!(scene.contains(&ProductKey::from("c13")));
    assert!(scene.contains(&ProductKey::Wavelength(10.4)));
}

#[test]
fn test_missing_prerequisite_is_unresolved() {
    let mut registry = RecipeRegistry::abi_defaults();
    registry.register(Recipe::new("needs_c17", &["C13", "C17"], Compositor::Difference));
    let mut scene = Scene::with_registry(conus_reader(), Arc::new(registry));

    let report = scene.load(&keys(&["needs_c17", "C13"]));
    assert_eq!(report.loaded, vec!["C13"]);
    assert!(matches!(
        &report.unresolved[0].1,
        SceneError::MissingPrerequisite { product, prerequisite }
            if product == "needs_c17" && prerequisite == "C17"
    ));
    assert!(scene.missing_datasets().is_empty());
}

#[test]
fn test_native_resample_resolves_missing() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&all_keys(&scene));
    let missing_before = scene.missing_datasets().clone();
    assert!(!missing_before.is_empty());

    let resampled = scene
        .resample(&ResampleTarget::Coarsest, ResampleMethod::Native, &Resampler::default())
        .unwrap();

    assert!(resampled.missing_datasets().is_subset(&missing_before));
    assert!(resampled.missing_datasets().is_empty());
    assert!(resampled.contains(&ProductKey::from("true_color")));
    for product in resampled.products() {
        assert_eq!(product.shape(), (30, 50), "{}", product.name());
    }

    // The source scene is unchanged
    assert_eq!(scene.missing_datasets(), &missing_before);
    assert_eq!(
        scene.get(&ProductKey::from("C02")).unwrap().shape(),
        (120, 200)
    );
}

#[test]
fn test_resample_to_finest() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&keys(&["C02", "C13", "natural_color"]));
    let resampled = scene
        .resample(&ResampleTarget::Finest, ResampleMethod::Native, &Resampler::default())
        .unwrap();
    assert_eq!(resampled.get(&ProductKey::from("C13")).unwrap().shape(), (120, 200));
    assert!(resampled.contains(&ProductKey::from("natural_color")));
}

#[test]
fn test_native_resample_rejects_unaligned_area() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&keys(&["C13"]));
    let c13_area = scene.get(&ProductKey::from("C13")).unwrap().area.clone();
    let odd = AreaDefinition::new("odd", c13_area.crs.clone(), 37, 23, c13_area.extent).unwrap();

    let err = scene
        .resample(&ResampleTarget::Area(odd), ResampleMethod::Native, &Resampler::default())
        .unwrap_err();
    assert!(matches!(err, SceneError::IncompatibleAreas { ref product, .. } if product == "C13"));
}

#[test]
fn test_resample_empty_scene() {
    let scene = Scene::new(conus_reader());
    assert!(matches!(
        scene.resample(&ResampleTarget::Coarsest, ResampleMethod::Native, &Resampler::default()),
        Err(SceneError::EmptyScene)
    ));
}

#[test]
fn test_nearest_resample_to_latlon_grid() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&keys(&["true_color"]));
    let target = AreaDefinition::new(
        "central_us",
        Crs::LatLon,
        40,
        30,
        Extent::new(-105.0, 30.0, -85.0, 45.0),
    )
    .unwrap();

    let resampled = scene
        .resample(&ResampleTarget::Area(target.clone()), ResampleMethod::Nearest, &Resampler::default())
        .unwrap();
    let true_color = resampled.get(&ProductKey::from("true_color")).unwrap();
    assert_eq!(true_color.area, target);

    let raster = true_color.compute().unwrap();
    assert_eq!(raster.band_count(), 3);
    assert_eq!(raster.nan_fraction(), 0.0);
}

#[test]
fn test_crop_inside_coverage_is_smaller() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&all_keys(&scene));
    let resampled = scene
        .resample(&ResampleTarget::Coarsest, ResampleMethod::Native, &Resampler::default())
        .unwrap();

    let cropped = resampled.crop(&bbox_of(bbox::CYCLONE)).unwrap();
    assert_eq!(cropped.loaded_names(), resampled.loaded_names());

    let before = resampled.get(&ProductKey::from("true_color")).unwrap();
    let after = cropped.get(&ProductKey::from("true_color")).unwrap();
    let (rows_a, cols_a) = after.shape();
    let (rows_b, cols_b) = before.shape();
    assert!(rows_a * cols_a < rows_b * cols_b);
    assert!(before.area.extent.contains(&after.area.extent, 1e-6));

    let raster = after.compute().unwrap();
    assert_eq!(raster.shape(), after.shape());
}

#[test]
fn test_crop_keeps_multi_resolution_products_aligned() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&keys(&["C01", "C02", "C13"]));
    let cropped = scene.crop(&bbox_of(bbox::CYCLONE)).unwrap();

    let c13 = cropped.get(&ProductKey::from("C13")).unwrap();
    let c01 = cropped.get(&ProductKey::from("C01")).unwrap();
    let c02 = cropped.get(&ProductKey::from("C02")).unwrap();
    assert_eq!(c01.shape(), (c13.shape().0 * 2, c13.shape().1 * 2));
    assert_eq!(c02.shape(), (c13.shape().0 * 4, c13.shape().1 * 4));
    assert_eq!(c13.area.resolution_ratio(&c02.area), Some(scene_common::GridRelation::Refine(4)));
}

#[test]
fn test_crop_extent_within_requested_box() {
    let mut scene = Scene::new(latlon_reader());
    scene.load(&keys(&["C13", "true_color"]));
    let resampled = scene
        .resample(&ResampleTarget::Coarsest, ResampleMethod::Native, &Resampler::default())
        .unwrap();

    let request = BoundingBox::new(-100.5, 30.2, -90.7, 40.9);
    let cropped = resampled.crop(&request).unwrap();
    for product in cropped.products() {
        let (dx, dy) = product.area.pixel_size();
        let extent = product.area.extent;
        // Within the box, allowing one pixel of edge rounding
        assert!(extent.min_x >= request.min_x - dx && extent.max_x <= request.max_x + dx);
        assert!(extent.min_y >= request.min_y - dy && extent.max_y <= request.max_y + dy);
        assert!(product.shape().0 < 25 && product.shape().1 < 30);
    }
}

#[test]
fn test_crop_partial_overlap_is_clamped() {
    let mut scene = Scene::new(latlon_reader());
    scene.load(&keys(&["C13"]));
    let cropped = scene.crop(&BoundingBox::new(-120.0, 20.0, -100.0, 30.0)).unwrap();
    let c13 = cropped.get(&ProductKey::from("C13")).unwrap();
    assert_eq!(c13.shape(), (5, 10));
    assert_eq!(c13.area.extent, Extent::new(-110.0, 25.0, -100.0, 30.0));
}

#[test]
fn test_crop_disjoint_box_errors() {
    let mut scene = Scene::new(conus_reader());
    scene.load(&keys(&["C13"]));
    let err = scene.crop(&bbox_of(bbox::WEST_PACIFIC)).unwrap_err();
    assert!(matches!(err, SceneError::CropOutsideCoverage { .. }));
}

#[test]
fn test_building_scenes_reads_no_pixels() {
    let reader = conus_reader();
    let mut scene = Scene::new(reader.clone());
    scene.load(&all_keys(&scene));
    let resampled = scene
        .resample(&ResampleTarget::Coarsest, ResampleMethod::Native, &Resampler::default())
        .unwrap();
    let cropped = resampled.crop(&bbox_of(bbox::CYCLONE)).unwrap();
    assert_eq!(reader.load_count(), 0);

    cropped
        .get(&ProductKey::from("true_color"))
        .unwrap()
        .compute()
        .unwrap();
    // C01, C02 and C03, each read once although green also uses C01 and C02
    assert_eq!(reader.load_count(), 3);
}

#[test]
fn test_repeated_runs_are_identical() {
    let run = || {
        let mut scene = Scene::new(conus_reader());
        scene.load(&all_keys(&scene));
        let missing = scene.missing_datasets().clone();
        let resampled = scene
            .resample(&ResampleTarget::Coarsest, ResampleMethod::Native, &Resampler::default())
            .unwrap();
        let cropped = resampled.crop(&bbox_of(bbox::CYCLONE)).unwrap();
        let shapes: Vec<(String, (usize, usize))> = cropped
            .products()
            .map(|p| (p.name().to_string(), p.shape()))
            .collect();
        let c13 = cropped
            .get(&ProductKey::from("C13"))
            .unwrap()
            .compute()
            .unwrap();
        (missing, resampled.missing_datasets().clone(), shapes, c13.channels[0].clone())
    };
    assert_eq!(run(), run());
}
