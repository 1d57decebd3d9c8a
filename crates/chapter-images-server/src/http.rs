//! HTTP endpoints over the resolution layer
//!
//! | Route                      | Result                                   |
//! |----------------------------|------------------------------------------|
//! | `GET /api/images?prefix=`  | `{"keys": [...], "count": n}`            |
//! | `GET /api/image?path=`     | object bytes for the best-matching key   |
//! | `GET /api/resolve?path=`   | `{"url": ...}` from the loader           |
//! | `GET /objects/{key}`       | object bytes for exactly `key`           |
//! | `POST /api/cache/clear`    | empties both caches                      |
//! | `GET /healthz`             | `ok`                                     |

use bytes::Bytes;
use chapter_images::{log_suppressed, ImageLoader, ProviderError, StorageProvider};
use http_body_util::Full;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use percent_encoding::percent_decode_str;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info};

const LIST_CACHE_CONTROL: &str = "public, max-age=300";
const OBJECT_CACHE_CONTROL: &str = "public, max-age=3600";

/// Shared by every connection
pub struct AppState {
    pub loader: ImageLoader,
    pub provider: Arc<dyn StorageProvider>,
}

impl AppState {
    pub fn new(loader: ImageLoader, provider: Arc<dyn StorageProvider>) -> Self {
        AppState { loader, provider }
    }
}

/// Route one request
pub async fn handle<B>(state: Arc<AppState>, req: Request<B>) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    debug!(%method, path = %path, "request");

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/healthz") => text(StatusCode::OK, "ok"),
        (&Method::GET, "/api/images") => list_images(&state, &query).await,
        (&Method::GET, "/api/image") => get_image(&state, &query).await,
        (&Method::GET, "/api/resolve") => resolve(&state, &query).await,
        (&Method::POST, "/api/cache/clear") => {
            state.loader.caches().clear();
            info!("caches cleared");
            json_response(StatusCode::OK, json!({ "cleared": true }), None)
        }
        (&Method::GET, p) if p.starts_with("/objects/") => {
            let key = decode(&p["/objects/".len()..]);
            serve_object(&state, &key).await
        }
        (_, "/healthz" | "/api/images" | "/api/image" | "/api/resolve" | "/api/cache/clear") => {
            text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => text(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(response)
}

async fn list_images(state: &AppState, query: &str) -> Response<Full<Bytes>> {
    let prefix = query_param(query, "prefix").unwrap_or_default();
    let keys = state.loader.lister().keys(&prefix).await;
    json_response(
        StatusCode::OK,
        json!({ "keys": keys.as_slice(), "count": keys.len() }),
        Some(LIST_CACHE_CONTROL),
    )
}

async fn get_image(state: &AppState, query: &str) -> Response<Full<Bytes>> {
    let Some(path) = query_param(query, "path").filter(|p| !p.trim().is_empty()) else {
        return text(StatusCode::BAD_REQUEST, "missing path parameter");
    };

    let key = match state.loader.match_key(&path).await {
        Some(key) => key,
        None => path.trim().trim_start_matches('/').to_string(),
    };
    serve_object(state, &key).await
}

async fn resolve(state: &AppState, query: &str) -> Response<Full<Bytes>> {
    let path = query_param(query, "path").unwrap_or_default();
    let url = state.loader.load(&path).await;
    json_response(StatusCode::OK, json!({ "url": url }), None)
}

async fn serve_object(state: &AppState, key: &str) -> Response<Full<Bytes>> {
    match state.provider.get(key).await {
        Ok(body) => {
            let mut resp = Response::new(Full::new(body.bytes));
            let content_type = HeaderValue::from_str(&body.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            resp.headers_mut().insert(CONTENT_TYPE, content_type);
            resp.headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static(OBJECT_CACHE_CONTROL));
            resp
        }
        Err(ProviderError::NotFound { .. }) => text(StatusCode::NOT_FOUND, "image not found"),
        Err(e) => {
            log_suppressed("http", "get", key, &e);
            text(StatusCode::BAD_GATEWAY, "storage unavailable")
        }
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp
}

fn json_response(status: StatusCode, value: serde_json::Value, cache: Option<&'static str>) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(value.to_string())));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(cache) = cache {
        resp.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static(cache));
    }
    resp
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// First value of `name` in a query string, form-decoded
pub fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(k, _)| decode(&k.replace('+', " ")) == name)
        .map(|(_, v)| decode(&v.replace('+', " ")))
}
