//! Static asset server for the built dashboard.

use crate::config::ServeConfig;
use crate::update::{asset_manifest, cache_name};
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_ENCODING, CONTENT_TYPE, VARY};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use flate2::{write::GzEncoder, Compression};
use serde_json::json;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const NO_CACHE: &str = "no-cache";
const IMMUTABLE: &str = "public, max-age=31536000, immutable";
const SHORT_CACHE: &str = "public, max-age=3600";

pub fn build_router(config: ServeConfig) -> Router {
    Router::new()
        .route("/version.json", get(version_handler))
        .route("/asset-manifest.json", get(manifest_handler))
        .fallback(static_handler)
        .with_state(Arc::new(config))
}

pub(crate) fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|accept| {
            accept
                .split(',')
                .any(|part| part.trim().split(';').next() == Some("gzip"))
        })
        .unwrap_or(false)
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(
        Vec::with_capacity((bytes.len() / 2).max(256)),
        Compression::default(),
    );
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn is_compressible(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.starts_with("application/json")
        || content_type.starts_with("application/manifest")
        || content_type.starts_with("image/svg")
}

fn cache_policy(rel: &Path) -> &'static str {
    match rel.to_str().unwrap_or("") {
        "index.html" | "service-worker.js" | "version.json" => NO_CACHE,
        p if p.starts_with("static/") => IMMUTABLE,
        _ => SHORT_CACHE,
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], message).into_response()
}

fn respond(
    headers: &HeaderMap,
    config: &ServeConfig,
    bytes: Vec<u8>,
    content_type: &'static str,
    cache: &'static str,
) -> Response {
    let compressible = is_compressible(content_type);
    let mut encoded = false;
    let mut body = bytes;
    if compressible && body.len() >= config.compression_min_bytes && accepts_gzip(headers) {
        match gzip(&body) {
            Ok(compressed) => {
                body = compressed;
                encoded = true;
            }
            Err(e) => tracing::warn!(error = %e, "gzip failed, sending identity body"),
        }
    }

    let mut resp = Response::new(Body::from(body));
    let h = resp.headers_mut();
    h.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    h.insert(CACHE_CONTROL, HeaderValue::from_static(cache));
    if compressible {
        h.insert(VARY, HeaderValue::from_static("accept-encoding"));
    }
    if encoded {
        h.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    resp
}

/// Decodes `%XX` escapes. Malformed escapes pass through; invalid UTF-8 yields None.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let h1 = bytes[i + 1] as char;
            let h2 = bytes[i + 2] as char;
            if let (Some(a), Some(b)) = (h1.to_digit(16), h2.to_digit(16)) {
                out.push(((a << 4) + b) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok()
}

/// Maps a request path onto the dist dir. Returns None for anything that could escape it.
fn resolve(uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode(uri_path)?;
    let trimmed = decoded.trim_start_matches('/');
    if trimmed.is_empty() {
        return Some(PathBuf::from("index.html"));
    }
    if trimmed.contains('\\') || trimmed.contains('\0') {
        return None;
    }
    let rel = PathBuf::from(trimmed);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(rel)
}

async fn version_handler(
    State(config): State<Arc<ServeConfig>>,
    headers: HeaderMap,
) -> Response {
    let payload = json!({
        "version": config.version,
        "cacheName": cache_name(&config.version),
    });
    respond(
        &headers,
        &config,
        payload.to_string().into_bytes(),
        "application/json",
        NO_CACHE,
    )
}

async fn manifest_handler(
    State(config): State<Arc<ServeConfig>>,
    headers: HeaderMap,
) -> Response {
    match serde_json::to_vec(&asset_manifest(&config.version)) {
        Ok(bytes) => respond(&headers, &config, bytes, "application/json", NO_CACHE),
        Err(e) => {
            tracing::error!(error = %e, "asset manifest serialization failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn static_handler(
    State(config): State<Arc<ServeConfig>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }
    let Some(rel) = resolve(uri.path()) else {
        tracing::debug!(path = uri.path(), "rejected path");
        return plain(StatusCode::NOT_FOUND, "not found");
    };

    let mut rel = rel;
    let mut bytes = tokio::fs::read(config.dist_dir.join(&rel)).await;
    // Client-side routes have no extension; serve the app shell for them.
    if bytes.is_err() && rel.extension().is_none() {
        rel = PathBuf::from("index.html");
        bytes = tokio::fs::read(config.dist_dir.join(&rel)).await;
    }
    match bytes {
        Ok(bytes) => respond(&headers, &config, bytes, content_type(&rel), cache_policy(&rel)),
        Err(e) => {
            tracing::debug!(path = uri.path(), error = %e, "asset not found");
            plain(StatusCode::NOT_FOUND, "not found")
        }
    }
}
