//! Route tests against the in-memory provider

use bytes::Bytes;
use chapter_images::{ImageLoader, InMemoryProvider, StorageConfig};
use chapter_images_server::{handle, AppState};
use http_body_util::{BodyExt, Full};
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

fn config() -> StorageConfig {
    StorageConfig {
        use_object_storage: true,
        bucket_name: "chapter-photos".to_string(),
        public_base_url: Some("https://cdn.example.com".to_string()),
        ..StorageConfig::default()
    }
}

fn setup() -> (Arc<AppState>, Arc<InMemoryProvider>) {
    let provider = Arc::new(InMemoryProvider::new("chapter-photos"));
    provider.insert("FGM Pics/possiblefrontpage.JPG", Bytes::from_static(b"fgm"));
    provider.insert("Tabling/booth.jpg", Bytes::from_static(b"booth"));
    provider.insert("ASCELOGO/ASCE.png", Bytes::from_static(b"logo"));

    let loader = ImageLoader::new(&config(), provider.clone());
    (Arc::new(AppState::new(loader, provider.clone())), provider)
}

async fn call(state: &Arc<AppState>, method: Method, uri: &str) -> Response<Full<Bytes>> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Full::new(Bytes::new()))
        .unwrap();
    handle(state.clone(), req).await.unwrap()
}

async fn body_of(resp: Response<Full<Bytes>>) -> Bytes {
    resp.into_body().collect().await.unwrap().to_bytes()
}

async fn json_of(resp: Response<Full<Bytes>>) -> serde_json::Value {
    serde_json::from_slice(&body_of(resp).await).unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let (state, _) = setup();
    let resp = call(&state, Method::GET, "/healthz").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_of(resp).await[..], b"ok");
}

#[tokio::test]
async fn test_list_images() {
    let (state, provider) = setup();

    let resp = call(&state, Method::GET, "/api/images").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), "public, max-age=300");
    let value = json_of(resp).await;
    assert_eq!(value["count"], 3);
    assert_eq!(value["keys"][0], "ASCELOGO/ASCE.png");

    // Second listing is served from the key-list cache
    call(&state, Method::GET, "/api/images").await;
    assert_eq!(provider.list_calls(), 1);
}

#[tokio::test]
async fn test_list_images_with_prefix() {
    let (state, _) = setup();
    let value = json_of(call(&state, Method::GET, "/api/images?prefix=FGM%20Pics%2F").await).await;
    assert_eq!(value["count"], 1);
    assert_eq!(value["keys"][0], "FGM Pics/possiblefrontpage.JPG");
}

#[tokio::test]
async fn test_get_image_by_loose_path() {
    let (state, _) = setup();
    let resp = call(
        &state,
        Method::GET,
        "/api/image?path=%2Fimages%2FPhotos%2FFGM%20Pics%2FPossibleFrontPage.jpg",
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(resp.headers().get(CACHE_CONTROL).unwrap(), "public, max-age=3600");
    assert_eq!(&body_of(resp).await[..], b"fgm");
}

#[tokio::test]
async fn test_get_image_falls_back_to_raw_key() {
    let (state, provider) = setup();
    // Cache the listing, then add an object the cached listing cannot know about
    call(&state, Method::GET, "/api/images").await;
    provider.insert("late.png", Bytes::from_static(b"late"));

    let resp = call(&state, Method::GET, "/api/image?path=/late.png").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(&body_of(resp).await[..], b"late");
}

#[tokio::test]
async fn test_get_image_errors() {
    let (state, _) = setup();

    let resp = call(&state, Method::GET, "/api/image").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = call(&state, Method::GET, "/api/image?path=%20").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = call(&state, Method::GET, "/api/image?path=/images/missing.jpg").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resolve() {
    let (state, _) = setup();

    let value = json_of(call(&state, Method::GET, "/api/resolve?path=/images/ASCELOGO/ASCE.png").await).await;
    assert_eq!(value["url"], "https://cdn.example.com/ASCELOGO/ASCE.png");

    let value = json_of(call(&state, Method::GET, "/api/resolve").await).await;
    assert_eq!(value["url"], "/images/fallback.jpg");

    let value = json_of(call(&state, Method::GET, "/api/resolve?path=/images/nowhere.jpg").await).await;
    assert_eq!(value["url"], "/images/nowhere.jpg");
}

#[tokio::test]
async fn test_objects_route_exact_key() {
    let (state, _) = setup();

    let resp = call(&state, Method::GET, "/objects/Tabling/booth.jpg").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_of(resp).await[..], b"booth");

    let resp = call(&state, Method::GET, "/objects/FGM%20Pics/possiblefrontpage.JPG").await;
    assert_eq!(resp.status(), StatusCode::OK);

    // No fuzzy matching on the objects route
    let resp = call(&state, Method::GET, "/objects/tabling/booth.jpg").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cache_clear() {
    let (state, provider) = setup();

    call(&state, Method::GET, "/api/images").await;
    let resp = call(&state, Method::POST, "/api/cache/clear").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_of(resp).await["cleared"], true);

    call(&state, Method::GET, "/api/images").await;
    assert_eq!(provider.list_calls(), 2);
}

#[tokio::test]
async fn test_unknown_routes_and_methods() {
    let (state, _) = setup();

    let resp = call(&state, Method::GET, "/api/cache/clear").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = call(&state, Method::DELETE, "/api/images").await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let resp = call(&state, Method::GET, "/nope").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_listing_uses_raw_path() {
    let provider = Arc::new(InMemoryProvider::new("chapter-photos"));
    provider.insert("a.jpg", Bytes::from_static(b"a"));
    let loader = ImageLoader::new(&config(), provider.clone());
    provider.set_fail_list(true);
    let state = Arc::new(AppState::new(loader, provider));

    let resp = call(&state, Method::GET, "/api/image?path=a.jpg").await;
    assert_eq!(resp.status(), StatusCode::OK);
}
