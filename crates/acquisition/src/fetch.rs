//! Scenario-level acquisition: list, select, download concurrently.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tracing::{error, info, instrument};
use walkdir::WalkDir;

use crate::download::{DownloadConfig, DownloadManager};
use crate::error::{AcquisitionError, AcquisitionResult};
use crate::s3::S3Lister;
use crate::scenario::{select_scenario_files, Scenario, ScenarioFile};

/// Scenario files already present in `dir` (searched recursively).
///
/// Fails with [`AcquisitionError::IncompleteListing`] unless all channels
/// are there exactly once.
pub fn find_local_files(scenario: Scenario, dir: &Path) -> AcquisitionResult<Vec<PathBuf>> {
    let mut listing = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().ok().map(|m| m.len());
        listing.push((entry.path().to_string_lossy().into_owned(), size));
    }
    let files = select_scenario_files(&listing, scenario)?;
    Ok(files.into_iter().map(|f| PathBuf::from(f.key)).collect())
}

/// Download every file of `scenario` into `config.output_dir`.
///
/// Files already present with the listed size are not fetched again. The
/// returned paths are ordered C01..C16; any failed download fails the call.
#[instrument(skip(config), fields(scenario = %scenario))]
pub async fn fetch_scenario(
    scenario: Scenario,
    config: &DownloadConfig,
) -> AcquisitionResult<Vec<PathBuf>> {
    let lister = S3Lister::anonymous().await;
    let listing = lister.list(scenario.bucket(), scenario.prefix()).await?;
    let files = select_scenario_files(&listing, scenario)?;
    info!(files = files.len(), "Scenario files selected");

    let manager = DownloadManager::new(config.clone())?;
    download_all(&manager, scenario, files).await
}

/// Download `files` with at most `max_concurrent` transfers in flight.
pub async fn download_all(
    manager: &DownloadManager,
    scenario: Scenario,
    files: Vec<ScenarioFile>,
) -> AcquisitionResult<Vec<PathBuf>> {
    let total = files.len();
    let max_concurrent = manager.config().max_concurrent.max(1);

    let results: Vec<(usize, AcquisitionResult<PathBuf>)> = stream::iter(files.into_iter().enumerate())
        .map(|(index, file)| async move {
            let url = file.url(scenario);
            let result = manager.download(&url, &file.filename, file.size).await;
            if let Err(ref e) = result {
                error!(url = %url, channel = %file.channel, error = %e, "Download failed");
            }
            (index, result)
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut paths: Vec<(usize, PathBuf)> = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (index, result) in results {
        match result {
            Ok(path) => paths.push((index, path)),
            Err(e) => failures.push(e),
        }
    }

    if !failures.is_empty() {
        let failed = failures.len();
        return Err(AcquisitionError::DownloadsFailed {
            failed,
            total,
            first: Box::new(failures.swap_remove(0)),
        });
    }

    paths.sort_by_key(|(index, _)| *index);
    info!(files = paths.len(), "Scenario download complete");
    Ok(paths.into_iter().map(|(_, path)| path).collect())
}
