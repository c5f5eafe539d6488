use std::collections::BTreeMap;
use std::path::PathBuf;

use netcdf_parser::AbiL1bFile;
use tracing::{debug, info, instrument};

use super::{DatasetInfo, Reader};
use crate::error::{SceneError, SceneResult};
use crate::raster::Raster;

/// Maximum spread of file start times within one observation (seconds).
const MAX_START_SPREAD_SECS: i64 = 60;

/// Reader for GOES ABI L1b radiance files, one file per channel.
#[derive(Debug)]
pub struct AbiL1bReader {
    files: BTreeMap<String, AbiL1bFile>,
}

impl AbiL1bReader {
    pub const NAME: &'static str = "abi_l1b";

    /// Open the headers of `paths`. Pixel data is not read.
    #[instrument(skip(paths), fields(files = paths.len()))]
    pub fn new(paths: &[PathBuf]) -> SceneResult<Self> {
        let files = paths
            .iter()
            .map(|path| {
                AbiL1bFile::open(path).map_err(|source| SceneError::Read {
                    product: path.display().to_string(),
                    source,
                })
            })
            .collect::<SceneResult<Vec<_>>>()?;
        Self::from_files(files)
    }

    /// Group already opened files by channel.
    pub fn from_files(files: Vec<AbiL1bFile>) -> SceneResult<Self> {
        if files.is_empty() {
            return Err(SceneError::NoFiles(Self::NAME.to_string()));
        }

        let first_start = files.iter().map(|f| f.start_time()).min();
        let last_start = files.iter().map(|f| f.start_time()).max();
        if let (Some(first), Some(last)) = (first_start, last_start) {
            if (last - first).num_seconds() > MAX_START_SPREAD_SECS {
                return Err(SceneError::MixedObservationTimes(format!(
                    "{} .. {}",
                    first.format("%Y-%m-%dT%H:%M:%S"),
                    last.format("%Y-%m-%dT%H:%M:%S")
                )));
            }
        }

        let mut by_channel = BTreeMap::new();
        for file in files {
            let name = file.name().to_string();
            debug!(channel = %name, path = %file.path.display(), "Adding ABI file");
            if by_channel.insert(name.clone(), file).is_some() {
                return Err(SceneError::DuplicateChannel(name));
            }
        }

        info!(channels = by_channel.len(), "ABI L1b reader ready");
        Ok(Self { files: by_channel })
    }

    pub fn file(&self, channel: &str) -> Option<&AbiL1bFile> {
        self.files.get(channel)
    }
}

impl Reader for AbiL1bReader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn available_datasets(&self) -> Vec<DatasetInfo> {
        self.files
            .values()
            .map(|file| {
                let mut info = DatasetInfo::for_channel(file.channel, file.area.clone());
                info.start_time = Some(file.start_time());
                info.platform_name = Some(file.filename.platform_name());
                info
            })
            .collect()
    }

    fn load_dataset(&self, info: &DatasetInfo) -> SceneResult<Raster> {
        let file = self
            .files
            .get(&info.name)
            .ok_or_else(|| SceneError::unknown_product(&info.name))?;
        debug!(channel = %info.name, path = %file.path.display(), "Reading ABI radiances");
        let data = file
            .read_calibrated(info.calibration)
            .map_err(|source| SceneError::Read {
                product: info.name.clone(),
                source,
            })?;
        Raster::single(file.width, file.height, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_files() {
        assert!(matches!(AbiL1bReader::new(&[]), Err(SceneError::NoFiles(_))));
    }

    #[test]
    fn test_unreadable_file_names_path() {
        let path = PathBuf::from(
            "/nonexistent/OR_ABI-L1b-RadC-M3C01_G16_s20190730002186_e20190730004559_c20190730005006.nc",
        );
        let err = AbiL1bReader::new(&[path]).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/OR_ABI"));
    }
}
