//! Resumable download manager with retry logic and progress tracking.
//!
//! - Partial data goes to `{temp_dir}/{filename}.partial`
//! - HTTP Range requests resume an interrupted transfer
//! - Exponential backoff between attempts
//! - The final size is checked against Content-Length (or the listing size)
//!   before the file is moved into `output_dir`

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{header, Client, Response, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{AcquisitionError, AcquisitionResult};

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Downloads running at once
    pub max_concurrent: usize,
    /// Directory for `.partial` files
    pub temp_dir: PathBuf,
    /// Directory for completed downloads
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(120),
            request_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(30),
            max_concurrent: 4,
            temp_dir: PathBuf::from("data/tmp"),
            output_dir: PathBuf::from("data/abi"),
        }
    }
}

impl DownloadConfig {
    /// Defaults with both directories under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            temp_dir: dir.join(".partial"),
            output_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }
}

/// Download progress information.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub url: String,
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub retry_count: u32,
}

impl DownloadProgress {
    fn new(url: &str, total_bytes: Option<u64>) -> Self {
        let now = Utc::now();
        Self {
            url: url.to_string(),
            total_bytes,
            downloaded_bytes: 0,
            started_at: now,
            last_update: now,
            retry_count: 0,
        }
    }

    pub fn percent_complete(&self) -> Option<f64> {
        self.total_bytes
            .filter(|total| *total > 0)
            .map(|total| (self.downloaded_bytes as f64 / total as f64) * 100.0)
    }

    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = (self.last_update - self.started_at).num_milliseconds() as f64 / 1000.0;
        if elapsed > 0.0 {
            self.downloaded_bytes as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Manages downloads with resumption and retry support.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: Client,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(config: DownloadConfig) -> AcquisitionResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| AcquisitionError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Final location of `filename`.
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.config.output_dir.join(filename)
    }

    /// Download `url` to `output_dir/filename` with retry and resumption.
    ///
    /// An existing output file is kept when its size matches `expected_size`
    /// (or when no size is known).
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download(
        &self,
        url: &str,
        filename: &str,
        expected_size: Option<u64>,
    ) -> AcquisitionResult<PathBuf> {
        let temp_dir = &self.config.temp_dir;
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(temp_dir)
            .await
            .map_err(|e| AcquisitionError::io(temp_dir, e))?;
        fs::create_dir_all(output_dir)
            .await
            .map_err(|e| AcquisitionError::io(output_dir, e))?;

        let temp_path = temp_dir.join(format!("{}.partial", filename));
        let final_path = output_dir.join(filename);

        if let Ok(meta) = fs::metadata(&final_path).await {
            match expected_size {
                Some(expected) if meta.len() != expected => {
                    warn!(
                        path = %final_path.display(),
                        size = meta.len(),
                        expected,
                        "Existing file has wrong size, downloading again"
                    );
                    fs::remove_file(&final_path)
                        .await
                        .map_err(|e| AcquisitionError::io(&final_path, e))?;
                }
                _ => {
                    info!(path = %final_path.display(), "File already exists, skipping download");
                    return Ok(final_path);
                }
            }
        }

        let mut progress = DownloadProgress::new(url, expected_size);
        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            let attempt = self.download_with_resume(url, &temp_path, &mut progress).await;
            let attempt = match attempt {
                Ok(()) => self.verify_size(&temp_path, progress.total_bytes).await,
                Err(e) => Err(e),
            };

            match attempt {
                Ok(()) => {
                    move_into_place(&temp_path, &final_path).await?;
                    info!(
                        path = %final_path.display(),
                        bytes = progress.downloaded_bytes,
                        retries = retry_count,
                        "Download completed"
                    );
                    return Ok(final_path);
                }
                Err(e) => {
                    if matches!(e, AcquisitionError::SizeMismatch { .. }) {
                        // start over rather than append to a corrupt partial
                        fs::remove_file(&temp_path).await.ok();
                    }

                    retry_count += 1;
                    progress.retry_count = retry_count;
                    if !e.is_retryable() || retry_count > self.config.max_retries {
                        return Err(AcquisitionError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: retry_count,
                            last: Box::new(e),
                        });
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }

    async fn verify_size(&self, path: &Path, expected: Option<u64>) -> AcquisitionResult<()> {
        let Some(expected) = expected else {
            return Ok(());
        };
        let actual = fs::metadata(path)
            .await
            .map_err(|e| AcquisitionError::io(path, e))?
            .len();
        if actual != expected {
            return Err(AcquisitionError::SizeMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Download with HTTP Range support for resumption.
    async fn download_with_resume(
        &self,
        url: &str,
        temp_path: &Path,
        progress: &mut DownloadProgress,
    ) -> AcquisitionResult<()> {
        let head = self.head(url).await?;
        if progress.total_bytes.is_none() {
            progress.total_bytes = head.content_length;
        }

        // Loop to handle RANGE_NOT_SATISFIABLE without recursion
        loop {
            let resume_from = match fs::metadata(temp_path).await {
                Ok(meta) => meta.len(),
                Err(_) => 0,
            };

            if let Some(total) = progress.total_bytes {
                if resume_from >= total {
                    progress.downloaded_bytes = resume_from;
                    return Ok(());
                }
            }

            let mut request = self.client.get(url);
            if resume_from > 0 && head.accepts_ranges {
                info!(resume_from, total = ?progress.total_bytes, "Resuming download");
                request = request.header(header::RANGE, format!("bytes={}-", resume_from));
                progress.downloaded_bytes = resume_from;
            } else if resume_from > 0 {
                warn!("Server does not support range requests, restarting download");
                fs::remove_file(temp_path).await.ok();
                progress.downloaded_bytes = 0;
            }

            let response = request.send().await.map_err(|source| AcquisitionError::Http {
                url: url.to_string(),
                source,
            })?;

            match response.status() {
                StatusCode::OK => {
                    if resume_from > 0 {
                        fs::remove_file(temp_path).await.ok();
                        progress.downloaded_bytes = 0;
                    }
                }
                StatusCode::PARTIAL_CONTENT => {
                    debug!("Received partial content, resuming download");
                }
                StatusCode::RANGE_NOT_SATISFIABLE => {
                    fs::remove_file(temp_path).await.ok();
                    progress.downloaded_bytes = 0;
                    if resume_from == 0 {
                        return Err(AcquisitionError::Status {
                            url: url.to_string(),
                            status: StatusCode::RANGE_NOT_SATISFIABLE.as_u16(),
                        });
                    }
                    continue;
                }
                status => {
                    return Err(AcquisitionError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
            }

            if progress.total_bytes.is_none() && response.status() == StatusCode::OK {
                progress.total_bytes = content_length(&response);
            }

            return self.stream_to_file(response, temp_path, progress).await;
        }
    }

    /// Stream response body to file with progress updates.
    async fn stream_to_file(
        &self,
        response: Response,
        path: &Path,
        progress: &mut DownloadProgress,
    ) -> AcquisitionResult<()> {
        let url = progress.url.clone();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| AcquisitionError::io(path, e))?;

        let mut stream = response.bytes_stream();
        let mut bytes_since_log = 0u64;
        let log_interval = 8_000_000;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| AcquisitionError::Http {
                url: url.clone(),
                source,
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| AcquisitionError::io(path, e))?;

            progress.downloaded_bytes += chunk.len() as u64;
            progress.last_update = Utc::now();
            bytes_since_log += chunk.len() as u64;

            if bytes_since_log >= log_interval {
                bytes_since_log = 0;
                if let Some(percent) = progress.percent_complete() {
                    debug!(
                        downloaded = progress.downloaded_bytes,
                        total = ?progress.total_bytes,
                        percent = format!("{:.1}%", percent),
                        speed = format!("{:.1} KB/s", progress.bytes_per_second() / 1024.0),
                        "Download progress"
                    );
                }
            }
        }

        file.flush().await.map_err(|e| AcquisitionError::io(path, e))?;
        file.sync_all().await.map_err(|e| AcquisitionError::io(path, e))?;
        Ok(())
    }

    /// Content length and range support from a HEAD request. A failed HEAD
    /// is not an error; the GET decides.
    async fn head(&self, url: &str) -> AcquisitionResult<HeadInfo> {
        let response = match self.client.head(url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "HEAD request failed");
                return Ok(HeadInfo::default());
            }
        };
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AcquisitionError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        if !response.status().is_success() {
            return Ok(HeadInfo::default());
        }

        // Assume support if the header is missing; many servers omit it
        let accepts_ranges = response
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v != "none")
            .unwrap_or(true);

        Ok(HeadInfo {
            content_length: content_length(&response),
            accepts_ranges,
        })
    }
}

#[derive(Debug, Default)]
struct HeadInfo {
    content_length: Option<u64>,
    accepts_ranges: bool,
}

fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

/// Rename, falling back to copy and delete across filesystems.
async fn move_into_place(from: &Path, to: &Path) -> AcquisitionResult<()> {
    if fs::rename(from, to).await.is_err() {
        fs::copy(from, to)
            .await
            .map_err(|e| AcquisitionError::io(to, e))?;
        fs::remove_file(from)
            .await
            .map_err(|e| AcquisitionError::io(from, e))?;
    }
    Ok(())
}
