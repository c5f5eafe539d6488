//! Readers expose the raw datasets held by a set of files.

mod abi_l1b;
mod memory;

pub use abi_l1b::AbiL1bReader;
pub use memory::MemoryReader;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use scene_common::{AbiChannel, AreaDefinition, CalibrationKind, ProductKey};

use crate::error::{SceneError, SceneResult};
use crate::product::ProductAttrs;
use crate::raster::Raster;

/// Metadata of one raw dataset, known without reading pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub name: String,
    /// `(min, central, max)` wavelength in micrometers
    pub wavelength: Option<(f32, f32, f32)>,
    pub calibration: CalibrationKind,
    pub area: AreaDefinition,
    pub start_time: Option<DateTime<Utc>>,
    pub platform_name: Option<String>,
}

impl DatasetInfo {
    /// Dataset for an ABI channel on the given area.
    pub fn for_channel(channel: &AbiChannel, area: AreaDefinition) -> Self {
        Self {
            name: channel.name.to_string(),
            wavelength: Some(channel.wavelength),
            calibration: channel.calibration,
            area,
            start_time: None,
            platform_name: None,
        }
    }

    pub fn contains_wavelength(&self, wavelength: f32) -> bool {
        self.wavelength
            .map(|(min, _, max)| min <= wavelength && wavelength <= max)
            .unwrap_or(false)
    }

    pub fn attrs(&self) -> ProductAttrs {
        ProductAttrs {
            name: self.name.clone(),
            units: self.calibration.units().to_string(),
            standard_name: self.calibration.standard_name().to_string(),
            wavelength: self.wavelength.map(|(_, c, _)| c),
            calibration: Some(self.calibration),
            mode: "L".to_string(),
            start_time: self.start_time,
            platform_name: self.platform_name.clone(),
            sensor: "abi".to_string(),
            prerequisites: Vec::new(),
        }
    }
}

/// Source of raw datasets.
pub trait Reader: Send + Sync {
    /// Registry name of the reader.
    fn name(&self) -> &str;

    /// Datasets available from the bound files, in a stable order.
    fn available_datasets(&self) -> Vec<DatasetInfo>;

    /// Read one dataset's calibrated pixels.
    fn load_dataset(&self, info: &DatasetInfo) -> SceneResult<Raster>;
}

/// Look up a reader by registry name and bind it to `files`.
pub fn create_reader(name: &str, files: &[PathBuf]) -> SceneResult<Arc<dyn Reader>> {
    match name {
        AbiL1bReader::NAME => Ok(Arc::new(AbiL1bReader::new(files)?)),
        other => Err(SceneError::UnknownReader(other.to_string())),
    }
}

/// Resolve a key against a dataset list.
///
/// Names are matched first (case-insensitive). A wavelength matches the
/// datasets whose range contains it; the one with the closest central
/// wavelength wins.
pub fn resolve_dataset<'a>(datasets: &'a [DatasetInfo], key: &ProductKey) -> Option<&'a DatasetInfo> {
    match key {
        ProductKey::Name(name) => datasets.iter().find(|d| d.name.eq_ignore_ascii_case(name)),
        ProductKey::Wavelength(w) => datasets
            .iter()
            .filter(|d| d.contains_wavelength(*w))
            .min_by(|a, b| {
                let da = a.wavelength.map(|(_, c, _)| (c - w).abs()).unwrap_or(f32::MAX);
                let db = b.wavelength.map(|(_, c, _)| (c - w).abs()).unwrap_or(f32::MAX);
                da.total_cmp(&db)
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_common::{Crs, Extent, ABI_CHANNELS};

    fn datasets() -> Vec<DatasetInfo> {
        let area = AreaDefinition::new("a", Crs::LatLon, 2, 2, Extent::new(0.0, 0.0, 1.0, 1.0))
            .unwrap();
        ABI_CHANNELS
            .iter()
            .map(|c| DatasetInfo::for_channel(c, area.clone()))
            .collect()
    }

    #[test]
    fn test_resolve_by_name() {
        let ds = datasets();
        assert_eq!(resolve_dataset(&ds, &ProductKey::from("c13")).unwrap().name, "C13");
        assert!(resolve_dataset(&ds, &ProductKey::from("C17")).is_none());
    }

    #[test]
    fn test_resolve_by_wavelength() {
        let ds = datasets();
        assert_eq!(resolve_dataset(&ds, &ProductKey::Wavelength(0.64)).unwrap().name, "C02");
        assert_eq!(resolve_dataset(&ds, &ProductKey::Wavelength(10.3)).unwrap().name, "C13");
        assert!(resolve_dataset(&ds, &ProductKey::Wavelength(20.0)).is_none());
    }

    #[test]
    fn test_unknown_reader() {
        assert!(matches!(
            create_reader("seviri_l1b_hrit", &[]),
            Err(SceneError::UnknownReader(_))
        ));
    }

    #[test]
    fn test_attrs_from_channel() {
        let ds = datasets();
        let attrs = ds[12].attrs();
        assert_eq!(attrs.units, "K");
        assert_eq!(attrs.mode, "L");
        assert!(!attrs.is_composite());
    }
}
