//! HTTP request handlers
//!
//! Thin handlers: validation at the boundary, then delegation to the
//! collaborators carried in [`AppState`]. Upload dispatches on a closed
//! ingestion-mode enum decided once from the request content type;
//! retrieval is cache-aside with a background write-back.

use std::collections::BTreeMap;

use axum::body::{to_bytes, Body};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::debug;

use crate::cache::CachedResponse;
use crate::errors::{AppError, AppResult};
use crate::models::{UploadResultEntry, UploadedFile};

use super::AppState;

/// Multipart field name carrying file parts
const FILES_FIELD: &str = "files";

/// Header carrying the shared upload secret
const API_KEY_HEADER: &str = "x-api-key";

/// Ingestion mode, decided once from the request content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestionMode {
    /// JSON array of absolute image URLs to fetch
    UrlList,
    /// Multipart form data with `files` parts
    Multipart,
}

impl IngestionMode {
    fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("application/json") {
            Some(Self::UrlList)
        } else if content_type.to_ascii_lowercase().contains("multipart/form-data") {
            Some(Self::Multipart)
        } else {
            None
        }
    }
}

/// PUT /upload
pub async fn upload(State(state): State<AppState>, request: Request) -> Response {
    match upload_inner(state, request).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn upload_inner(
    state: AppState,
    request: Request,
) -> AppResult<BTreeMap<String, UploadResultEntry>> {
    authorize(request.headers(), &state.config.auth.api_key)?;

    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let mode =
        IngestionMode::from_content_type(content_type).ok_or(AppError::InvalidContentType)?;

    match mode {
        IngestionMode::UrlList => {
            let urls = read_url_list(request, state.config.ingest.max_upload_bytes).await?;
            state.ingest.ingest_urls(urls).await
        }
        IngestionMode::Multipart => {
            let files = read_multipart_files(request).await?;
            state.ingest.ingest_uploads(files).await
        }
    }
}

/// Exact byte-for-byte comparison against the configured secret.
fn authorize(headers: &HeaderMap, expected: &str) -> AppResult<()> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if !expected.is_empty() && key == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

async fn read_url_list(request: Request, limit: usize) -> AppResult<Vec<String>> {
    let body = to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| AppError::bad_request(format!("failed to read request body: {e}")))?;
    serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))
}

/// Buffer every `files` part, then validate all declared types before any
/// write can happen. The declared type is trusted as-is; no payload
/// sniffing.
async fn read_multipart_files(request: Request) -> AppResult<Vec<UploadedFile>> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| AppError::bad_request(format!("invalid multipart body: {e}")))?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("malformed multipart field: {e}")))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("failed to read upload '{file_name}': {e}")))?;

        files.push(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }

    if files
        .iter()
        .any(|file| !file.content_type.starts_with("image/"))
    {
        return Err(AppError::InvalidFileType);
    }

    Ok(files)
}

/// GET /images/{filename}.{extension}
pub async fn get_image(
    State(state): State<AppState>,
    uri: Uri,
    Path(key): Path<String>,
) -> Response {
    let cache_key = uri.to_string();

    if let Some(cached) = state.cache.lookup(&cache_key).await {
        debug!("cache hit for {}", cache_key);
        return cached_to_response(&cached);
    }
    debug!("cache miss for {}, reading from store", cache_key);

    // Only `{filename}.{extension}` segments name an object
    if key.rsplit_once('.').is_none() {
        return AppError::NotFound.into_response();
    }

    let object = match state.store.get(&key).await {
        Ok(Some(object)) => object,
        Ok(None) => return AppError::NotFound.into_response(),
        Err(e) => return AppError::from(e).into_response(),
    };

    let mut headers: Vec<(HeaderName, HeaderValue)> = Vec::with_capacity(3);
    headers.push((
        header::CONTENT_TYPE,
        object
            .meta
            .content_type
            .parse()
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    ));
    if let Ok(etag) = object.meta.etag.parse() {
        headers.push((header::ETAG, etag));
    }
    let max_age = state.cache.max_age().as_secs();
    headers.push((
        header::CACHE_CONTROL,
        format!("s-maxage={max_age}").parse().unwrap(),
    ));

    let cached = CachedResponse {
        status: StatusCode::OK,
        headers,
        body: object.body,
    };
    let response = cached_to_response(&cached);

    // Populate the cache off the response path
    let cache = state.cache.clone();
    tokio::spawn(async move {
        cache.insert(cache_key, cached).await;
    });

    response
}

fn cached_to_response(cached: &CachedResponse) -> Response {
    let mut response = Response::new(Body::from(cached.body.clone()));
    *response.status_mut() = cached.status;
    let headers = response.headers_mut();
    for (name, value) in &cached.headers {
        headers.insert(name.clone(), value.clone());
    }
    response
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "image-vault",
    }))
}

/// Fallback for unmatched routes
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404, not found!").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_mode_selection() {
        assert_eq!(
            IngestionMode::from_content_type("application/json"),
            Some(IngestionMode::UrlList)
        );
        assert_eq!(
            IngestionMode::from_content_type("application/json; charset=utf-8"),
            Some(IngestionMode::UrlList)
        );
        assert_eq!(
            IngestionMode::from_content_type("multipart/form-data; boundary=xyz"),
            Some(IngestionMode::Multipart)
        );
        assert_eq!(IngestionMode::from_content_type("text/plain"), None);
        assert_eq!(IngestionMode::from_content_type(""), None);
    }

    #[test]
    fn test_authorize_requires_exact_match() {
        let mut headers = HeaderMap::new();
        assert!(authorize(&headers, "secret").is_err());

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        assert!(authorize(&headers, "secret").is_err());

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(authorize(&headers, "secret").is_ok());

        // An unset secret never matches
        assert!(authorize(&headers, "").is_err());
    }
}
