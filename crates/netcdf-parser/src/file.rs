//! ABI L1b radiance file access using the native netcdf library.

use std::path::{Path, PathBuf};
use std::sync::Once;

use chrono::{DateTime, Utc};
use scene_common::{AbiChannel, AreaDefinition, CalibrationKind, Crs, Extent, GeosParams};
use tracing::debug;

use crate::calibrate::{calibrate, CalibrationCoefficients, PlanckCoefficients};
use crate::error::{NetCdfError, NetCdfResult};
use crate::filename::AbiFilename;

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints diagnostics even when the Rust side handles
/// a missing optional attribute. Call once early in `main()`; repeated calls
/// are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 with null handlers is a documented way to
        // disable automatic error printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Header metadata of one ABI L1b file. Pixel data is not read until
/// [`AbiL1bFile::read_radiance`] is called.
#[derive(Debug, Clone)]
pub struct AbiL1bFile {
    pub path: PathBuf,
    pub filename: AbiFilename,
    pub channel: &'static AbiChannel,
    /// Central wavelength stored in the file (µm)
    pub band_wavelength: f32,
    pub width: usize,
    pub height: usize,
    pub area: AreaDefinition,
    pub coefficients: CalibrationCoefficients,
    rad_scale: f32,
    rad_offset: f32,
    rad_fill: Option<i16>,
    rad_unsigned: bool,
}

impl AbiL1bFile {
    /// Open a file and read its metadata.
    pub fn open(path: impl AsRef<Path>) -> NetCdfResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| NetCdfError::InvalidFilename(path.display().to_string()))?;
        let filename = AbiFilename::parse(name)?;

        let nc_file = netcdf::open(path).map_err(|e| NetCdfError::read(path, e))?;

        let width = nc_file
            .dimension("x")
            .ok_or_else(|| NetCdfError::missing(path, "x dimension"))?
            .len();
        let height = nc_file
            .dimension("y")
            .ok_or_else(|| NetCdfError::missing(path, "y dimension"))?
            .len();

        let band = read_scalar(&nc_file, path, "band_id")? as u8;
        if band != filename.band {
            return Err(NetCdfError::InvalidFormat(format!(
                "{}: band_id {} does not match file name band {}",
                path.display(),
                band,
                filename.band
            )));
        }
        let channel = AbiChannel::from_band(band)
            .ok_or_else(|| NetCdfError::InvalidFormat(format!("unknown band {}", band)))?;
        let band_wavelength = read_scalar(&nc_file, path, "band_wavelength")? as f32;

        let proj_var = nc_file
            .variable("goes_imager_projection")
            .ok_or_else(|| NetCdfError::missing(path, "goes_imager_projection variable"))?;
        let geos = GeosParams {
            perspective_point_height: get_f64_attr(&proj_var, "perspective_point_height")
                .ok_or_else(|| NetCdfError::missing(path, "perspective_point_height"))?,
            semi_major_axis: get_f64_attr(&proj_var, "semi_major_axis")
                .ok_or_else(|| NetCdfError::missing(path, "semi_major_axis"))?,
            semi_minor_axis: get_f64_attr(&proj_var, "semi_minor_axis")
                .ok_or_else(|| NetCdfError::missing(path, "semi_minor_axis"))?,
            longitude_origin: get_f64_attr(&proj_var, "longitude_of_projection_origin")
                .ok_or_else(|| NetCdfError::missing(path, "longitude_of_projection_origin"))?,
            sweep_x: get_string_attr(&proj_var, "sweep_angle_axis")
                .map(|s| s == "x")
                .unwrap_or(true),
        };

        let x = read_coordinate(&nc_file, path, "x")?;
        let y = read_coordinate(&nc_file, path, "y")?;
        let area = build_area(&filename, &geos, width, height, x, y)?;

        let rad_var = nc_file
            .variable("Rad")
            .ok_or_else(|| NetCdfError::missing(path, "Rad variable"))?;
        let rad_scale = get_f32_attr(&rad_var, "scale_factor").unwrap_or(1.0);
        let rad_offset = get_f32_attr(&rad_var, "add_offset").unwrap_or(0.0);
        let rad_fill = get_i16_attr(&rad_var, "_FillValue");
        let rad_unsigned = get_string_attr(&rad_var, "_Unsigned")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let coefficients = CalibrationCoefficients {
            band,
            kappa0: read_optional_f32(&nc_file, "kappa0"),
            planck: match (
                read_optional_f32(&nc_file, "planck_fk1"),
                read_optional_f32(&nc_file, "planck_fk2"),
                read_optional_f32(&nc_file, "planck_bc1"),
                read_optional_f32(&nc_file, "planck_bc2"),
            ) {
                (Some(fk1), Some(fk2), Some(bc1), Some(bc2)) => {
                    Some(PlanckCoefficients { fk1, fk2, bc1, bc2 })
                }
                _ => None,
            },
        };

        debug!(
            path = %path.display(),
            band = band,
            width = width,
            height = height,
            area = %area.area_id,
            "Opened ABI L1b file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            channel,
            band_wavelength,
            width,
            height,
            area,
            coefficients,
            rad_scale,
            rad_offset,
            rad_fill,
            rad_unsigned,
        })
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.filename.start_time
    }

    /// Channel name, `C01`..`C16`.
    pub fn name(&self) -> &'static str {
        self.channel.name
    }

    /// Read scaled radiances (row-major, row 0 north). Fill values become NaN.
    pub fn read_radiance(&self) -> NetCdfResult<Vec<f32>> {
        silence_hdf5_errors();
        let nc_file = netcdf::open(&self.path).map_err(|e| NetCdfError::read(&self.path, e))?;
        let rad_var = nc_file
            .variable("Rad")
            .ok_or_else(|| NetCdfError::missing(&self.path, "Rad variable"))?;

        let raw: Vec<i16> = rad_var
            .get_values(..)
            .map_err(|e| NetCdfError::read(&self.path, e))?;
        if raw.len() != self.width * self.height {
            return Err(NetCdfError::InvalidFormat(format!(
                "{}: Rad has {} values, expected {}x{}",
                self.path.display(),
                raw.len(),
                self.width,
                self.height
            )));
        }

        let data = raw
            .iter()
            .map(|&val| {
                if Some(val) == self.rad_fill {
                    f32::NAN
                } else {
                    let counts = if self.rad_unsigned {
                        val as u16 as f32
                    } else {
                        val as f32
                    };
                    counts * self.rad_scale + self.rad_offset
                }
            })
            .collect();
        Ok(data)
    }

    /// Read radiances and convert them to the channel's calibration.
    pub fn read_calibrated(&self, kind: CalibrationKind) -> NetCdfResult<Vec<f32>> {
        let mut data = self.read_radiance()?;
        calibrate(&mut data, &self.coefficients, kind)?;
        Ok(data)
    }
}

/// Scan-angle coordinate axis: first and last pixel centers (radians) and step.
struct Axis {
    first: f64,
    last: f64,
    step: f64,
}

fn read_coordinate(nc_file: &netcdf::File, path: &Path, name: &str) -> NetCdfResult<Axis> {
    let var = nc_file
        .variable(name)
        .ok_or_else(|| NetCdfError::missing(path, format!("{} variable", name)))?;
    let scale = get_f64_attr(&var, "scale_factor")
        .ok_or_else(|| NetCdfError::missing(path, format!("{}:scale_factor", name)))?;
    let offset = get_f64_attr(&var, "add_offset")
        .ok_or_else(|| NetCdfError::missing(path, format!("{}:add_offset", name)))?;
    let raw: Vec<i16> = var
        .get_values(..)
        .map_err(|e| NetCdfError::read(path, e))?;
    let (first, last) = match (raw.first(), raw.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return Err(NetCdfError::missing(path, format!("{} values", name))),
    };
    Ok(Axis {
        first: first as f64 * scale + offset,
        last: last as f64 * scale + offset,
        step: scale,
    })
}

/// Area from the scan-angle axes. Extents are outer pixel edges in meters.
fn build_area(
    filename: &AbiFilename,
    geos: &GeosParams,
    width: usize,
    height: usize,
    x: Axis,
    y: Axis,
) -> NetCdfResult<AreaDefinition> {
    let h = geos.perspective_point_height;
    let half_x = x.step.abs() / 2.0;
    let half_y = y.step.abs() / 2.0;
    let extent = Extent::new(
        (x.first.min(x.last) - half_x) * h,
        (y.first.min(y.last) - half_y) * h,
        (x.first.max(x.last) + half_x) * h,
        (y.first.max(y.last) + half_y) * h,
    );

    // Nominal resolution label, rounded to 500 m
    let resolution_m = ((x.step.abs() * h / 500.0).round() * 500.0) as u32;
    let area_id = format!(
        "{}_abi_{}_{}m",
        filename.platform.to_lowercase(),
        filename.sector.label(),
        resolution_m
    );

    AreaDefinition::new(area_id, Crs::Geostationary(geos.clone()), width, height, extent)
        .map_err(|e| NetCdfError::InvalidFormat(e.to_string()))
}

/// First value of a (scalar or length-1) variable, converted by netcdf to f64.
fn read_scalar(nc_file: &netcdf::File, path: &Path, name: &str) -> NetCdfResult<f64> {
    let var = nc_file
        .variable(name)
        .ok_or_else(|| NetCdfError::missing(path, format!("{} variable", name)))?;
    let values: Vec<f64> = var.get_values(..).map_err(|e| NetCdfError::read(path, e))?;
    values
        .first()
        .copied()
        .ok_or_else(|| NetCdfError::missing(path, format!("{} value", name)))
}

fn read_optional_f32(nc_file: &netcdf::File, name: &str) -> Option<f32> {
    let var = nc_file.variable(name)?;
    let values: Vec<f64> = var.get_values(..).ok()?;
    values.first().map(|&v| v as f32)
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f32::try_from(attr_value).ok()
}

fn get_f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

fn get_i16_attr(var: &netcdf::Variable, name: &str) -> Option<i16> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    i16::try_from(attr_value).ok()
}

fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        netcdf::AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
