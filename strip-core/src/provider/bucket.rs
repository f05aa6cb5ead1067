//! Token-authenticated HTTP object store.
//!
//! Artifacts are written to `<endpoint>/<bucket>/<key>` and read back through
//! a separate public base URL, mirroring the write-endpoint/public-CDN split
//! of S3-compatible storage.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::ObjectStore;
use crate::error::{StoreError, StoreResult};

/// HTTP object store client.
pub struct HttpBucket {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
    public_base_url: String,
}

impl HttpBucket {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            endpoint: trim_trailing_slash(endpoint.into()),
            bucket: bucket.into(),
            token,
            public_base_url: trim_trailing_slash(public_base_url.into()),
        }
    }

    /// Public URL for a stored key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[async_trait]
impl ObjectStore for HttpBucket {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<String> {
        let url = format!("{}/{}/{}", self.endpoint, self.bucket, key);
        let mut request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| StoreError::Unavailable {
            reason: format!("upload failed: {e}"),
        })?;
        if !response.status().is_success() {
            return Err(StoreError::Unavailable {
                reason: format!("upload failed with status {}", response.status()),
            });
        }
        Ok(self.public_url(key))
    }

    async fn get(&self, url: &str) -> StoreResult<(Vec<u8>, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable {
                reason: format!("fetch failed: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(StoreError::Unavailable {
                reason: format!("fetch failed with status {}", response.status()),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Unavailable {
                reason: format!("fetch body failed: {e}"),
            })?;
        Ok((bytes.to_vec(), content_type))
    }
}
