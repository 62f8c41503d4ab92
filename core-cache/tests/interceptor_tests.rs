mod common;

use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpMethod, HttpResponse};
use bytes::Bytes;
use common::{audio_body, manifest, ok_audio, store, MemoryFileSystem, MockHttp, MockMonitor};
use core_cache::{
    CacheError, CacheStore, InterceptedRequest, PartitionKind, RequestDestination,
    RequestInterceptor, StoredResponse,
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const APP: &str = "https://app.example.com";
const EPISODE: &str = "https://cdn.example.com/ep1.mp3";

fn interceptor(store: Arc<CacheStore>, http: MockHttp) -> RequestInterceptor {
    RequestInterceptor::new(store, Arc::new(http), manifest(), "/index.html")
}

fn audio_request(range: Option<&str>) -> InterceptedRequest {
    let request = InterceptedRequest::get(EPISODE)
        .unwrap()
        .with_destination(RequestDestination::Audio);
    match range {
        Some(range) => request.with_header("Range", range),
        None => request,
    }
}

async fn seed_audio(store: &CacheStore, len: usize) {
    let partition = store.open(PartitionKind::Audio).await.unwrap();
    partition
        .put(
            EPISODE,
            &StoredResponse::new(200, audio_body(len)).with_header("content-type", "audio/mpeg"),
        )
        .await
        .unwrap();
}

async fn wait_for_entry(store: &CacheStore, kind: PartitionKind, key: &str) -> bool {
    let partition = store.open(kind).await.unwrap();
    for _ in 0..50 {
        if partition.contains(key).await.unwrap() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ============================================================================
// Audio
// ============================================================================

#[tokio::test]
async fn test_cached_audio_range_request() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    seed_audio(&store, 1000).await;
    let interceptor = interceptor(store, MockHttp::new());

    let response = interceptor
        .handle(audio_request(Some("bytes=100-199")))
        .await
        .unwrap();

    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-range"), Some("bytes 100-199/1000"));
    assert_eq!(response.header("content-length"), Some("100"));
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("content-type"), Some("audio/mpeg"));
    assert_eq!(response.body, audio_body(1000).slice(100..200));
}

#[tokio::test]
async fn test_cached_audio_without_range() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    seed_audio(&store, 1000).await;
    let interceptor = interceptor(store, MockHttp::new());

    let response = interceptor.handle(audio_request(None)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body.len(), 1000);
}

#[tokio::test]
async fn test_cached_audio_malformed_range_serves_full_body() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    seed_audio(&store, 1000).await;
    let interceptor = interceptor(store, MockHttp::new());

    let response = interceptor
        .handle(audio_request(Some("bytes=oops")))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body.len(), 1000);
}

#[tokio::test]
async fn test_audio_miss_stores_full_response() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(ok_audio(500)));
    let interceptor = interceptor(store.clone(), http);

    let response = interceptor.handle(audio_request(None)).await.unwrap();
    assert_eq!(response.status, 200);

    // Served from the partition now; the mock allows only one fetch.
    let response = interceptor
        .handle(audio_request(Some("bytes=0-9")))
        .await
        .unwrap();
    assert_eq!(response.status, 206);
    assert_eq!(response.header("content-range"), Some("bytes 0-9/500"));
}

#[tokio::test]
async fn test_audio_miss_with_range_is_not_stored() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|req| req.headers.get("Range").map(String::as_str) == Some("bytes=0-"))
        .returning(|_| Ok(HttpResponse::new(206, audio_body(10))));
    let interceptor = interceptor(store.clone(), http);

    let response = interceptor
        .handle(audio_request(Some("bytes=0-")))
        .await
        .unwrap();

    assert_eq!(response.status, 206);
    let partition = store.open(PartitionKind::Audio).await.unwrap();
    assert!(!partition.contains(EPISODE).await.unwrap());
}

// ============================================================================
// Images
// ============================================================================

#[tokio::test]
async fn test_image_stored_on_ok_and_served_from_cache() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute().times(1).returning(|_| {
        Ok(HttpResponse::new(200, Bytes::from_static(b"webp")).with_header("Content-Type", "image/webp"))
    });
    let interceptor = interceptor(store.clone(), http);
    let request = InterceptedRequest::get("https://cdn.example.com/cover.webp").unwrap();

    let first = interceptor.handle(request.clone()).await.unwrap();
    let second = interceptor.handle(request).await.unwrap();

    assert_eq!(first.body, second.body);
    assert_eq!(second.header("content-type"), Some("image/webp"));
    let audio = store.open(PartitionKind::Audio).await.unwrap();
    assert!(audio.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_image_error_status_not_stored() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(2)
        .returning(|_| Ok(HttpResponse::new(404, "missing")));
    let interceptor = interceptor(store.clone(), http);
    let request = InterceptedRequest::get("https://cdn.example.com/cover")
        .unwrap()
        .with_destination(RequestDestination::Image);

    assert_eq!(interceptor.handle(request.clone()).await.unwrap().status, 404);
    assert_eq!(interceptor.handle(request).await.unwrap().status, 404);
}

// ============================================================================
// Static
// ============================================================================

#[tokio::test]
async fn test_static_miss_is_stored_in_background() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(HttpResponse::new(200, "body { }")));
    let interceptor = interceptor(store.clone(), http);
    let url = format!("{}/assets/css/style.css", APP);

    let response = interceptor
        .handle(InterceptedRequest::get(&url).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status, 200);

    assert!(wait_for_entry(&store, PartitionKind::Static, &url).await);
    let cached = interceptor
        .handle(InterceptedRequest::get(&url).unwrap())
        .await
        .unwrap();
    assert_eq!(cached.body, Bytes::from_static(b"body { }"));
}

#[tokio::test]
async fn test_offline_document_falls_back_to_shell() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let shell = store.open(PartitionKind::Static).await.unwrap();
    shell
        .put(
            &format!("{}/index.html", APP),
            &StoredResponse::new(200, Bytes::from_static(b"<html>shell</html>")),
        )
        .await
        .unwrap();

    let mut http = MockHttp::new();
    http.expect_execute()
        .returning(|_| Err(BridgeError::Network("offline".to_string())));
    let mut monitor = MockMonitor::new();
    monitor.expect_is_connected().returning(|| false);

    let interceptor = interceptor(store, http).with_network_monitor(Arc::new(monitor));
    let request = InterceptedRequest::get(&format!("{}/podcast/42", APP))
        .unwrap()
        .with_destination(RequestDestination::Document);

    let response = interceptor.handle(request).await.unwrap();
    assert_eq!(response.body, Bytes::from_static(b"<html>shell</html>"));
}

#[tokio::test]
async fn test_online_document_failure_is_surfaced() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute()
        .returning(|_| Err(BridgeError::Network("reset".to_string())));
    let mut monitor = MockMonitor::new();
    monitor.expect_is_connected().returning(|| true);

    let interceptor = interceptor(store, http).with_network_monitor(Arc::new(monitor));
    let request = InterceptedRequest::get(&format!("{}/podcast/42", APP))
        .unwrap()
        .with_destination(RequestDestination::Document);

    let error = interceptor.handle(request).await.unwrap_err();
    assert!(error.is_network());
}

#[tokio::test]
async fn test_passthrough_is_never_cached() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(3)
        .returning(|_| Ok(HttpResponse::new(200, "{}")));
    let interceptor = interceptor(store.clone(), http);

    let feed = InterceptedRequest::get("https://feeds.example.com/show.xml").unwrap();
    interceptor.handle(feed.clone()).await.unwrap();
    interceptor.handle(feed).await.unwrap();

    let post = InterceptedRequest::new(HttpMethod::Post, &format!("{}/index.html", APP))
        .unwrap()
        .with_destination(RequestDestination::Document);
    assert_eq!(interceptor.handle(post).await.unwrap().status, 200);

    tokio::time::sleep(Duration::from_millis(20)).await;
    for kind in PartitionKind::ALL {
        let partition = store.open(kind).await.unwrap();
        assert!(partition.is_empty().await.unwrap(), "{kind} partition");
    }
}

// ============================================================================
// Precache
// ============================================================================

#[tokio::test]
async fn test_precache_stores_whole_manifest() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(2)
        .returning(|req| Ok(HttpResponse::new(200, req.url.clone())));

    let bus = Arc::new(EventBus::new(8));
    let mut events = bus.subscribe();
    let interceptor = interceptor(store.clone(), http).with_event_bus(bus);

    let stored = interceptor
        .precache(&Url::parse(APP).unwrap())
        .await
        .unwrap();

    assert_eq!(stored, 2);
    let partition = store.open(PartitionKind::Static).await.unwrap();
    assert_eq!(partition.len().await.unwrap(), 2);
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Cache(CacheEvent::PrecacheCompleted {
            partition: "static-v1".to_string(),
            entries: 2
        })
    );
}

#[tokio::test]
async fn test_precache_is_all_or_nothing() {
    let store = store(Arc::new(MemoryFileSystem::new()));
    let mut http = MockHttp::new();
    http.expect_execute().returning(|req| {
        if req.url.ends_with("style.css") {
            Ok(HttpResponse::new(404, ""))
        } else {
            Ok(HttpResponse::new(200, "ok"))
        }
    });
    let interceptor = interceptor(store.clone(), http);

    let error = interceptor
        .precache(&Url::parse(APP).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(error, CacheError::Precache { status: 404, .. }));
    let partition = store.open(PartitionKind::Static).await.unwrap();
    assert!(partition.is_empty().await.unwrap());
}
