//! Writing evaluated products as GeoTIFF files.

use std::path::{Path, PathBuf};

use gdal::cpl::CslStringList;
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use scene::{Evaluated, ProductAttrs, Raster};
use scene_common::AreaDefinition;
use tracing::{debug, info, warn};

use crate::error::{ExportError, ExportResult};
use crate::options::ExportOptions;

/// Outcome of [`save_datasets`]: one entry per requested product.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<(String, PathBuf)>,
    pub failed: Vec<ExportError>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn path_of(&self, product: &str) -> Option<&Path> {
        self.written
            .iter()
            .find(|(name, _)| name == product)
            .map(|(_, path)| path.as_path())
    }
}

/// `{name}_{YYYYmmdd_HHMMSS}.tif`, or `{name}.tif` without a start time.
pub fn output_filename(attrs: &ProductAttrs) -> String {
    match attrs.start_time {
        Some(t) => format!("{}_{}.tif", attrs.name, t.format("%Y%m%d_%H%M%S")),
        None => format!("{}.tif", attrs.name),
    }
}

/// Write one product to `path`.
///
/// The raster is assembled in an in-memory dataset, overviews are built
/// there when requested, and the result is copied to GTiff with the
/// creation options of `options`.
pub fn write_geotiff(
    raster: &Raster,
    area: &AreaDefinition,
    attrs: &ProductAttrs,
    path: &Path,
    options: &ExportOptions,
) -> ExportResult<()> {
    write_dataset(raster, area, attrs, path, options).map_err(|source| ExportError::Write {
        product: attrs.name.clone(),
        path: path.to_path_buf(),
        source,
    })
}

fn write_dataset(
    raster: &Raster,
    area: &AreaDefinition,
    attrs: &ProductAttrs,
    path: &Path,
    options: &ExportOptions,
) -> gdal::errors::Result<()> {
    let (width, height) = (raster.width, raster.height);
    let mem = DriverManager::get_driver_by_name("MEM")?;
    let mut dataset = mem.create_with_band_type::<f32, _>("", width, height, raster.band_count())?;

    dataset.set_geo_transform(&area.geo_transform())?;
    let srs = SpatialRef::from_proj4(&area.crs.to_proj4())?;
    dataset.set_spatial_ref(&srs)?;

    for (i, channel) in raster.channels.iter().enumerate() {
        let mut band = dataset.rasterband(i + 1)?;
        let mut buffer = Buffer::new((width, height), channel.clone());
        band.write((0, 0), (width, height), &mut buffer)?;
        band.set_no_data_value(Some(f64::NAN))?;
        band.set_description(&band_description(attrs, i))?;
    }

    set_product_metadata(&mut dataset, attrs, area)?;

    let levels = options.overview_levels(width, height);
    if options.copy_src_overviews && !levels.is_empty() {
        debug!(product = %attrs.name, levels = ?levels, "Building overviews");
        dataset.build_overviews("AVERAGE", &levels, &[])?;
    }

    let gtiff = DriverManager::get_driver_by_name("GTiff")?;
    let mut creation = CslStringList::new();
    for (name, value) in options.creation_options() {
        creation.set_name_value(&name, &value)?;
    }
    let out = dataset.create_copy(&gtiff, path, &creation)?;
    // closing flushes the file
    drop(out);
    Ok(())
}

fn band_description(attrs: &ProductAttrs, band: usize) -> String {
    match attrs.mode.as_str() {
        "RGB" | "RGBA" => {
            let names = ["red", "green", "blue", "alpha"];
            format!("{} {}", attrs.name, names.get(band).copied().unwrap_or("band"))
        }
        _ => attrs.name.clone(),
    }
}

fn set_product_metadata(
    dataset: &mut Dataset,
    attrs: &ProductAttrs,
    area: &AreaDefinition,
) -> gdal::errors::Result<()> {
    dataset.set_metadata_item("name", &attrs.name, "")?;
    dataset.set_metadata_item("standard_name", &attrs.standard_name, "")?;
    dataset.set_metadata_item("units", &attrs.units, "")?;
    dataset.set_metadata_item("sensor", &attrs.sensor, "")?;
    dataset.set_metadata_item("area_id", &area.area_id, "")?;
    if let Some(platform) = &attrs.platform_name {
        dataset.set_metadata_item("platform_name", platform, "")?;
    }
    if let Some(start) = attrs.start_time {
        dataset.set_metadata_item("start_time", &start.to_rfc3339(), "")?;
    }
    Ok(())
}

/// Write every product named in `names` (all products when empty) into
/// `dir`.
///
/// A failed write is recorded and does not stop the remaining products.
/// Only a bad option set or an unusable output directory fails the call.
pub fn save_datasets(
    evaluated: &Evaluated,
    names: &[String],
    dir: &Path,
    options: &ExportOptions,
) -> ExportResult<ExportReport> {
    options.validate()?;
    std::fs::create_dir_all(dir).map_err(|source| ExportError::OutputDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let names = if names.is_empty() {
        evaluated.names()
    } else {
        names.to_vec()
    };

    let mut report = ExportReport::default();
    for name in names {
        let Some(product) = evaluated.get(&name) else {
            warn!(product = %name, "Product not evaluated, skipping export");
            report.failed.push(ExportError::NotEvaluated(name));
            continue;
        };

        let path = dir.join(output_filename(&product.attrs));
        match write_geotiff(&product.raster, &product.area, &product.attrs, &path, options) {
            Ok(()) => {
                info!(
                    product = %name,
                    path = %path.display(),
                    width = product.raster.width,
                    height = product.raster.height,
                    "Wrote GeoTIFF"
                );
                report.written.push((name, path));
            }
            Err(e) => {
                warn!(product = %name, error = %e, "GeoTIFF export failed");
                report.failed.push(e);
            }
        }
    }

    Ok(report)
}

/// Layout of a written GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffInfo {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub block_size: (usize, usize),
    pub overviews: usize,
    pub compression: Option<String>,
    pub geo_transform: [f64; 6],
}

/// Open `path` and report its size, tiling, overviews and compression.
pub fn inspect_geotiff(path: &Path) -> ExportResult<GeoTiffInfo> {
    let read_err = |source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    };
    let dataset = Dataset::open(path).map_err(read_err)?;
    let (width, height) = dataset.raster_size();
    let band = dataset.rasterband(1).map_err(read_err)?;
    let overviews = band.overview_count().map_err(read_err)?.max(0) as usize;

    Ok(GeoTiffInfo {
        width,
        height,
        bands: dataset.raster_count() as usize,
        block_size: band.block_size(),
        overviews,
        compression: dataset.metadata_item("COMPRESSION", "IMAGE_STRUCTURE"),
        geo_transform: dataset.geo_transform().map_err(read_err)?,
    })
}
