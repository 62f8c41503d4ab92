mod common;

use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use common::{audio_body, ok_audio, store, MemoryFileSystem, MockHttp, PROXY};
use core_cache::{
    AudioCacheController, AudioResult, CacheReply, CacheRequest, ClearResult, PartitionKind,
};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::sync::Arc;

const EPISODE: &str = "https://cdn.example.com/ep1.mp3";

fn proxied(url: &str) -> String {
    format!("{}{}", PROXY, url)
}

fn controller(fs: Arc<MemoryFileSystem>, http: MockHttp) -> AudioCacheController {
    AudioCacheController::new(store(fs), Arc::new(http), PROXY)
}

#[tokio::test]
async fn test_cache_audio_is_idempotent() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    let mut call = 0usize;
    http.expect_execute()
        .withf(|req| req.url == EPISODE)
        .times(2)
        .returning(move |_| {
            call += 1;
            Ok(ok_audio(100 * call))
        });

    let controller = controller(fs.clone(), http);

    assert_eq!(controller.cache_audio(EPISODE).await, AudioResult::success(EPISODE));
    assert_eq!(controller.cache_audio(EPISODE).await, AudioResult::success(EPISODE));

    let partition = store(fs).open(PartitionKind::Audio).await.unwrap();
    assert_eq!(partition.keys().await.unwrap(), vec![EPISODE.to_string()]);
    let entry = partition.match_key(EPISODE).await.unwrap().unwrap();
    assert_eq!(entry.body, audio_body(200));
}

#[tokio::test]
async fn test_cache_check_delete_round_trip() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute().returning(|_| Ok(ok_audio(64)));
    let controller = controller(fs, http);

    assert!(controller.cache_audio(EPISODE).await.ok);
    assert_eq!(
        controller.check_audio(EPISODE).await,
        AudioResult::checked(EPISODE, true)
    );

    assert_eq!(controller.delete_audio(EPISODE).await, AudioResult::success(EPISODE));
    assert_eq!(
        controller.check_audio(EPISODE).await,
        AudioResult::checked(EPISODE, false)
    );
}

#[tokio::test]
async fn test_proxy_fallback_after_network_error() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|req| req.url == EPISODE)
        .times(1)
        .returning(|_| Err(BridgeError::Network("connection refused".to_string())));
    http.expect_execute()
        .withf(|req| req.url == proxied(EPISODE))
        .times(1)
        .returning(|_| Ok(ok_audio(32)));

    let controller = controller(fs.clone(), http);
    let result = controller.cache_audio(EPISODE).await;

    assert!(result.ok, "{:?}", result.error);
    let partition = store(fs).open(PartitionKind::Audio).await.unwrap();
    assert!(partition.contains(EPISODE).await.unwrap());
    assert!(!partition.contains(&proxied(EPISODE)).await.unwrap());
}

#[tokio::test]
async fn test_proxy_fallback_after_error_status() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|req| req.url == EPISODE)
        .times(1)
        .returning(|_| Ok(HttpResponse::new(403, "forbidden")));
    http.expect_execute()
        .withf(|req| req.url == proxied(EPISODE))
        .times(1)
        .returning(|_| Ok(ok_audio(32)));

    let result = controller(fs, http).cache_audio(EPISODE).await;
    assert!(result.ok);
}

#[tokio::test]
async fn test_both_fetches_fail() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(2)
        .returning(|_| Err(BridgeError::Network("offline".to_string())));

    let controller = controller(fs.clone(), http);
    let result = controller.cache_audio(EPISODE).await;

    assert!(!result.ok);
    assert_eq!(result.url, EPISODE);
    let error = result.error.unwrap();
    assert!(
        error.starts_with("Both direct and proxy fetch failed:"),
        "{error}"
    );
    assert!(!store(fs)
        .open(PartitionKind::Audio)
        .await
        .unwrap()
        .contains(EPISODE)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_proxy_error_status_is_reported() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|req| req.url == EPISODE)
        .returning(|_| Ok(HttpResponse::new(500, "")));
    http.expect_execute()
        .withf(|req| req.url == proxied(EPISODE))
        .returning(|_| Ok(HttpResponse::new(502, "")));

    let result = controller(fs, http).cache_audio(EPISODE).await;

    assert_eq!(result, AudioResult::failure(EPISODE, "Proxy fetch failed: HTTP 502"));
}

#[tokio::test]
async fn test_non_200_success_is_not_stored() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(HttpResponse::new(206, audio_body(10))));

    let controller = controller(fs, http);
    let result = controller.cache_audio(EPISODE).await;

    assert!(!result.ok);
    assert_eq!(controller.check_audio(EPISODE).await.cached, Some(false));
}

#[tokio::test]
async fn test_delete_of_uncached_url_succeeds() {
    let fs = Arc::new(MemoryFileSystem::new());
    let controller = controller(fs, MockHttp::new());

    let result = controller.delete_audio("https://cdn.example.com/never.mp3").await;

    assert!(result.ok);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_clear_cache() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute().returning(|_| Ok(ok_audio(8)));
    let controller = controller(fs, http);
    controller.cache_audio(EPISODE).await;

    assert_eq!(controller.clear_cache("audio").await, ClearResult { success: true });
    assert_eq!(controller.check_audio(EPISODE).await.cached, Some(false));

    assert_eq!(controller.clear_cache("missing").await, ClearResult { success: true });
    assert_eq!(controller.clear_cache("../x").await, ClearResult { success: false });
}

#[tokio::test]
async fn test_handle_dispatches_by_request_type() {
    let fs = Arc::new(MemoryFileSystem::new());
    let controller = controller(fs, MockHttp::new());

    let reply = controller
        .handle(CacheRequest::CheckAudio {
            url: EPISODE.to_string(),
        })
        .await;
    assert_eq!(reply, CacheReply::CheckAudio(AudioResult::checked(EPISODE, false)));

    let reply = controller
        .handle(CacheRequest::ClearCache {
            cache_name: "images".to_string(),
        })
        .await;
    assert_eq!(reply, CacheReply::ClearCache(ClearResult { success: true }));
}

#[tokio::test]
async fn test_events_are_published() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute().returning(|_| Ok(ok_audio(8)));

    let bus = Arc::new(EventBus::new(16));
    let mut events = bus.subscribe();
    let controller = controller(fs, http).with_event_bus(bus);

    controller.cache_audio(EPISODE).await;
    controller.delete_audio(EPISODE).await;

    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Cache(CacheEvent::AudioCached {
            url: EPISODE.to_string()
        })
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Cache(CacheEvent::AudioDeleted {
            url: EPISODE.to_string(),
            existed: true
        })
    );
}

#[tokio::test]
async fn test_unparseable_url_fails_without_fetching() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute().never();
    let controller = controller(fs, http);

    let cached = controller.cache_audio("ep1.mp3").await;
    assert!(!cached.ok);
    assert_eq!(cached.url, "ep1.mp3");
    assert!(cached.error.unwrap().starts_with("Invalid URL ep1.mp3"));

    assert!(!controller.check_audio("ep1.mp3").await.ok);
    assert!(!controller.delete_audio("ep1.mp3").await.ok);
}

#[tokio::test]
async fn test_equivalent_urls_share_one_entry() {
    let fs = Arc::new(MemoryFileSystem::new());
    let mut http = MockHttp::new();
    http.expect_execute().times(1).returning(|_| Ok(ok_audio(16)));
    let controller = controller(fs.clone(), http);

    assert!(controller.cache_audio("https://CDN.example.com:443/ep1.mp3").await.ok);

    assert_eq!(controller.check_audio(EPISODE).await.cached, Some(true));
    let partition = store(fs).open(PartitionKind::Audio).await.unwrap();
    assert_eq!(partition.keys().await.unwrap(), vec![EPISODE.to_string()]);
}
