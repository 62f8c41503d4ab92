//! # Audio Cache Controller
//!
//! On-demand operations on single audio resources, plus whole-partition
//! clears. Every operation resolves to a result value; failures are reported
//! as `ok: false` rather than returned as errors so the worker always has a
//! reply to post.
//!
//! Fetching goes direct first and falls back once to `proxy_prefix + url`
//! when the direct fetch fails or returns a non-ok status. Entries are keyed
//! by the normalized original URL, never the proxied one; replies echo the
//! URL exactly as the caller sent it.

use crate::error::{CacheError, Result};
use crate::partition::{CacheStore, Partition, PartitionKind};
use crate::protocol::{AudioResult, CacheReply, CacheRequest, ClearResult};
use crate::stored::StoredResponse;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct AudioCacheController {
    store: Arc<CacheStore>,
    http_client: Arc<dyn HttpClient>,
    proxy_prefix: String,
    event_bus: Option<Arc<EventBus>>,
}

impl AudioCacheController {
    pub fn new(
        store: Arc<CacheStore>,
        http_client: Arc<dyn HttpClient>,
        proxy_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            http_client,
            proxy_prefix: proxy_prefix.into(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn proxied_url(&self, url: &str) -> String {
        format!("{}{}", self.proxy_prefix, url)
    }

    /// Dispatch a decoded request to its operation.
    pub async fn handle(&self, request: CacheRequest) -> CacheReply {
        match request {
            CacheRequest::CacheAudio { url } => CacheReply::CacheAudio(self.cache_audio(&url).await),
            CacheRequest::DeleteAudio { url } => {
                CacheReply::DeleteAudio(self.delete_audio(&url).await)
            }
            CacheRequest::CheckAudio { url } => CacheReply::CheckAudio(self.check_audio(&url).await),
            CacheRequest::ClearCache { cache_name } => {
                CacheReply::ClearCache(self.clear_cache(&cache_name).await)
            }
        }
    }

    /// Fetch `url` and store it in the audio partition.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn cache_audio(&self, url: &str) -> AudioResult {
        match self.try_cache_audio(url).await {
            Ok(()) => {
                info!("Audio cached");
                self.emit(CacheEvent::AudioCached {
                    url: url.to_string(),
                });
                AudioResult::success(url)
            }
            Err(e) => {
                warn!(error = %e, "Audio caching failed");
                self.emit(CacheEvent::AudioCacheFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                AudioResult::failure(url, e.to_string())
            }
        }
    }

    async fn audio_entry(&self, url: &str) -> Result<(Partition, String)> {
        let key = Partition::key_for(url)?;
        Ok((self.store.open(PartitionKind::Audio).await?, key))
    }

    async fn try_cache_audio(&self, url: &str) -> Result<()> {
        let (partition, key) = self.audio_entry(url).await?;
        let response = self.fetch_with_proxy(url).await?;
        if response.status != 200 {
            return Err(CacheError::Fetch(format!(
                "Refusing to cache HTTP {} response",
                response.status
            )));
        }

        partition
            .put(&key, &StoredResponse::from_response(&response))
            .await
    }

    /// Direct fetch, then a single proxied retry.
    pub async fn fetch_with_proxy(&self, url: &str) -> Result<HttpResponse> {
        match self.http_client.execute(HttpRequest::get(url)).await {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => {
                debug!(status = response.status, "Direct fetch returned error status, trying proxy");
            }
            Err(e) => {
                debug!(error = %e, "Direct fetch failed, trying proxy");
            }
        }

        match self
            .http_client
            .execute(HttpRequest::get(self.proxied_url(url)))
            .await
        {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(CacheError::Fetch(format!(
                "Proxy fetch failed: HTTP {}",
                response.status
            ))),
            Err(e) => Err(CacheError::Fetch(format!(
                "Both direct and proxy fetch failed: {}",
                e
            ))),
        }
    }

    /// Remove `url` from the audio partition.
    ///
    /// A URL that was never cached still reports `ok: true`; only storage
    /// failures report `ok: false`.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn delete_audio(&self, url: &str) -> AudioResult {
        let outcome = match self.audio_entry(url).await {
            Ok((partition, key)) => partition.delete(&key).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(existed) => {
                debug!(existed, "Audio entry deleted");
                self.emit(CacheEvent::AudioDeleted {
                    url: url.to_string(),
                    existed,
                });
                AudioResult::success(url)
            }
            Err(e) => {
                warn!(error = %e, "Audio delete failed");
                AudioResult::failure(url, e.to_string())
            }
        }
    }

    /// Report whether `url` is in the audio partition. Never mutates.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn check_audio(&self, url: &str) -> AudioResult {
        let outcome = match self.audio_entry(url).await {
            Ok((partition, key)) => partition.contains(&key).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(cached) => AudioResult::checked(url, cached),
            Err(e) => {
                warn!(error = %e, "Audio check failed");
                AudioResult::failure(url, e.to_string())
            }
        }
    }

    /// Drop a whole partition by name.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self, cache_name: &str) -> ClearResult {
        match self.store.delete_partition(cache_name).await {
            Ok(existed) => {
                info!(existed, "Cache cleared");
                self.emit(CacheEvent::CacheCleared {
                    cache_name: cache_name.to_string(),
                    existed,
                });
                ClearResult { success: true }
            }
            Err(e) => {
                warn!(error = %e, "Cache clear failed");
                ClearResult { success: false }
            }
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Cache(event)).ok();
        }
    }
}
