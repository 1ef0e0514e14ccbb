use std::path::Path as FsPath;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{
    CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use axum::http::response::Builder;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use httpdate::{fmt_http_date, parse_http_date};
use tracing::debug;

use super::AppState;
use crate::constants::IMAGE_CACHE_CONTROL;
use crate::error::MemeForgeError;

/// Cache headers derived from file metadata.
#[derive(Clone, Debug)]
pub(crate) struct ImageCacheHeaders {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: Option<SystemTime>,
}

impl ImageCacheHeaders {
    /// Builds cache headers from filesystem metadata.
    pub(crate) fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let modified_at = metadata.modified().ok();
        let etag = build_etag(metadata.len(), modified_at);
        let last_modified =
            modified_at.and_then(|modified| HeaderValue::from_str(&fmt_http_date(modified)).ok());
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }

    /// Weak ETag built from size and modification time, if available.
    pub(crate) fn etag(&self) -> Option<&HeaderValue> {
        self.etag.as_ref()
    }

    /// Last-Modified header value, if the filesystem reports an mtime.
    pub(crate) fn last_modified(&self) -> Option<&HeaderValue> {
        self.last_modified.as_ref()
    }
}

/// Applies image cache headers to a response builder.
pub(crate) fn apply_cache_headers(mut builder: Builder, cache: &ImageCacheHeaders) -> Builder {
    builder = builder.header(CACHE_CONTROL, IMAGE_CACHE_CONTROL.as_str());
    if let Some(etag) = cache.etag() {
        builder = builder.header(ETAG, etag.clone());
    }
    if let Some(last_modified) = cache.last_modified() {
        builder = builder.header(LAST_MODIFIED, last_modified.clone());
    }
    builder
}

/// Returns true when the request matches a not-modified response.
/// `If-None-Match` wins over `If-Modified-Since` when both are sent.
pub(crate) fn is_not_modified(headers: &HeaderMap, cache: &ImageCacheHeaders) -> bool {
    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if let Ok(value) = if_none_match.to_str() {
            let value = value.trim();
            if value == "*" {
                return true;
            }
            if let Some(etag) = cache.etag().and_then(|value| value.to_str().ok())
                && value.split(',').any(|candidate| candidate.trim() == etag)
            {
                return true;
            }
        }
        return false;
    }

    if let (Some(if_modified_since), Some(modified_at)) =
        (headers.get(IF_MODIFIED_SINCE), cache.modified_at)
        && let Ok(value) = if_modified_since.to_str()
        && let Ok(since) = parse_http_date(value)
        && modified_at <= since
    {
        return true;
    }

    false
}

/// Builds a 304 response that preserves cache headers.
pub(crate) fn not_modified_response(cache: &ImageCacheHeaders) -> Result<Response, MemeForgeError> {
    let builder = Response::builder().status(StatusCode::NOT_MODIFIED);
    let builder = apply_cache_headers(builder, cache);
    builder.body(Body::empty()).map_err(MemeForgeError::from)
}

fn build_etag(size: u64, modified_at: Option<SystemTime>) -> Option<HeaderValue> {
    let suffix = match modified_at {
        Some(modified) => modified
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_secs().to_string())
            .unwrap_or_else(|_| "0".to_string()),
        None => "0".to_string(),
    };
    let value = format!("W/\"{}-{}\"", size, suffix);
    HeaderValue::from_str(&value).ok()
}

fn content_type_for(filename: &str) -> &'static str {
    match FsPath::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Serves a file from the output directory.
pub(crate) async fn generated_file_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, MemeForgeError> {
    let path = state.forge.store().resolve(&filename)?;
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(MemeForgeError::NotFound(filename)),
    };

    let cache = ImageCacheHeaders::from_metadata(&metadata);
    if is_not_modified(&headers, &cache) {
        debug!("304 {filename}");
        return not_modified_response(&cache);
    }

    let bytes = tokio::fs::read(&path).await?;
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type_for(&filename));
    apply_cache_headers(builder, &cache)
        .body(Body::from(bytes))
        .map_err(MemeForgeError::from)
}
