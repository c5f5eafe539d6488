//! Anonymous listing of the public NOAA buckets.

use tracing::{debug, info, instrument};

use crate::error::{AcquisitionError, AcquisitionResult};

const DEFAULT_REGION: &str = "us-east-1";

/// Lists object keys with unsigned requests.
#[derive(Debug, Clone)]
pub struct S3Lister {
    client: aws_sdk_s3::Client,
    page_size: i32,
}

impl S3Lister {
    /// Client for the NOAA open-data region without credentials.
    pub async fn anonymous() -> Self {
        Self::anonymous_in(DEFAULT_REGION).await
    }

    pub async fn anonymous_in(region: &str) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .no_credentials()
            .load()
            .await;
        Self {
            client: aws_sdk_s3::Client::new(&aws_config),
            page_size: 1000,
        }
    }

    /// All `(key, size)` pairs under `prefix`, following continuation tokens.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> AcquisitionResult<Vec<(String, Option<u64>)>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .max_keys(self.page_size);

            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token.clone());
            }

            let response = request.send().await.map_err(|e| AcquisitionError::Listing {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                message: e.to_string(),
            })?;
            pages += 1;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    let size = object.size().and_then(|s| u64::try_from(s).ok());
                    objects.push((key.to_string(), size));
                }
            }
            debug!(page = pages, objects = objects.len(), "Listed page");

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(|s| s.to_string());
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        info!(bucket = %bucket, prefix = %prefix, objects = objects.len(), pages, "Listed bucket");
        Ok(objects)
    }
}
