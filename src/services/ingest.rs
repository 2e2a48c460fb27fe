//! Image ingestion service
//!
//! Both ingestion modes funnel through the same store-one path: generate a
//! short id, derive the file extension from the content type, persist via
//! the object store, and record a result entry under the caller-supplied
//! identifier. Items are processed sequentially; the first failure aborts
//! the request and earlier writes are kept.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::errors::{AppError, AppResult};
use crate::keys::{extension_for_content_type, KeyGenerator};
use crate::models::{UploadResultEntry, UploadedFile};
use crate::storage::ObjectStore;

pub struct IngestService {
    http_client: Client,
    store: Arc<dyn ObjectStore>,
    keys: KeyGenerator,
    public_base_url: String,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        base_url: &str,
        fetch_timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            store,
            keys: KeyGenerator::new(),
            public_base_url: sanitize_base_url(base_url),
        })
    }

    /// URL-list mode: fetch each remote image in order and persist it.
    ///
    /// The result map is keyed by the original URL string exactly as the
    /// caller sent it.
    pub async fn ingest_urls(
        &self,
        urls: Vec<String>,
    ) -> AppResult<BTreeMap<String, UploadResultEntry>> {
        let mut results = BTreeMap::new();

        for raw_url in urls {
            let url = Url::parse(&raw_url)
                .map_err(|e| AppError::upstream_fetch(&raw_url, format!("invalid URL: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(AppError::upstream_fetch(
                    &raw_url,
                    format!("unsupported URL scheme '{}'", url.scheme()),
                ));
            }

            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(|e| AppError::upstream_fetch(&raw_url, e.to_string()))?;
            if !response.status().is_success() {
                return Err(AppError::upstream_fetch(
                    &raw_url,
                    format!("HTTP {}", response.status()),
                ));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = response
                .bytes()
                .await
                .map_err(|e| AppError::upstream_fetch(&raw_url, e.to_string()))?;

            let entry = self.store_one(body, &content_type).await?;
            debug!("ingested {} -> {}", raw_url, entry.path);
            results.insert(raw_url, entry);
        }

        Ok(results)
    }

    /// Multipart mode, second pass: persist parts already validated by the
    /// handler. The result map is keyed by each part's declared filename.
    pub async fn ingest_uploads(
        &self,
        files: Vec<UploadedFile>,
    ) -> AppResult<BTreeMap<String, UploadResultEntry>> {
        let mut results = BTreeMap::new();

        for file in files {
            let entry = self.store_one(file.data, &file.content_type).await?;
            debug!("ingested upload '{}' -> {}", file.file_name, entry.path);
            results.insert(file.file_name, entry);
        }

        Ok(results)
    }

    async fn store_one(&self, body: Bytes, content_type: &str) -> AppResult<UploadResultEntry> {
        let key = format!(
            "{}.{}",
            self.keys.generate()?,
            extension_for_content_type(content_type)
        );
        let meta = self.store.put(&key, body, content_type).await?;

        Ok(UploadResultEntry {
            path: format!("{}/images/{}", self.public_base_url, key),
            etag: meta.etag,
            content_type: meta.content_type,
        })
    }
}

/// Trim whitespace and trailing slashes so public paths join cleanly.
fn sanitize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}
