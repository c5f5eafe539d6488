use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use scene_common::{
    AreaDefinition, CalibrationKind, Crs, Extent, GeosParams, ABI_CHANNELS,
};

use super::{DatasetInfo, Reader};
use crate::error::{SceneError, SceneResult};
use crate::raster::Raster;

/// GOES-16 CONUS sector outer edges in scan-plane meters.
const CONUS_EXTENT: (f64, f64, f64, f64) = (-3627271.29, 1583173.66, 1382771.93, 4589199.58);

/// Reader over rasters held in memory.
///
/// Counts calls to [`Reader::load_dataset`] so callers can observe when
/// pixels are actually read.
#[derive(Debug, Default)]
pub struct MemoryReader {
    datasets: BTreeMap<String, (DatasetInfo, Raster)>,
    loads: AtomicUsize,
}

impl MemoryReader {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset. The raster must match the dataset's area.
    pub fn with_dataset(mut self, info: DatasetInfo, raster: Raster) -> SceneResult<Self> {
        if (raster.width, raster.height) != (info.area.width, info.area.height) {
            return Err(SceneError::InvalidRaster(format!(
                "{} is {}x{} but its area is {}x{}",
                info.name, raster.width, raster.height, info.area.width, info.area.height
            )));
        }
        self.datasets.insert(info.name.clone(), (info, raster));
        Ok(self)
    }

    /// All sixteen ABI channels on a GOES-16 CONUS grid with `width x height`
    /// pixels at 2 km; 1 km and 0.5 km channels get 2x and 4x the pixels.
    pub fn synthetic_abi(width: usize, height: usize) -> SceneResult<Self> {
        let (min_x, min_y, max_x, max_y) = CONUS_EXTENT;
        let area = AreaDefinition::new(
            "goes16_abi_conus_2000m",
            Crs::Geostationary(GeosParams::goes16()),
            width,
            height,
            Extent::new(min_x, min_y, max_x, max_y),
        )?;
        Self::synthetic_abi_on(&area)
    }

    /// All sixteen ABI channels with `base` as the 2 km grid.
    pub fn synthetic_abi_on(base: &AreaDefinition) -> SceneResult<Self> {
        let mut reader = Self::new();
        for channel in ABI_CHANNELS.iter() {
            let factor = (2.0 / channel.resolution_km).round().max(1.0) as usize;
            let area = if factor == 1 {
                base.clone()
            } else {
                let mut fine = base.refine(factor)?;
                fine.area_id = base.area_id.replace("2000m", &format!("{}m", 2000 / factor));
                fine
            };
            let data = synthetic_field(&area, channel.band, channel.calibration);
            let raster = Raster::single(area.width, area.height, data)?;
            let mut info = DatasetInfo::for_channel(channel, area);
            info.platform_name = Some("GOES-16".to_string());
            reader = reader.with_dataset(info, raster)?;
        }
        Ok(reader)
    }

    /// Number of datasets read so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// Smooth field evaluated at pixel centers, so grids of different
/// resolution sample the same underlying scene.
fn synthetic_field(area: &AreaDefinition, band: u8, kind: CalibrationKind) -> Vec<f32> {
    let mut data = Vec::with_capacity(area.len());
    for row in 0..area.height {
        for col in 0..area.width {
            let (x, y) = area.pixel_center(col as f64, row as f64);
            let wave = (x / 5.0e5).sin() * (y / 5.0e5).cos();
            let value = match kind {
                CalibrationKind::Reflectance => 45.0 + 40.0 * wave + band as f64,
                CalibrationKind::BrightnessTemperature => 255.0 + 30.0 * wave - band as f64,
            };
            data.push(value as f32);
        }
    }
    data
}

impl Reader for MemoryReader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn available_datasets(&self) -> Vec<DatasetInfo> {
        self.datasets.values().map(|(info, _)| info.clone()).collect()
    }

    fn load_dataset(&self, info: &DatasetInfo) -> SceneResult<Raster> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.datasets
            .get(&info.name)
            .map(|(_, raster)| raster.clone())
            .ok_or_else(|| SceneError::unknown_product(&info.name))
    }
}
