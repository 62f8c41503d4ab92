//! # Request Interceptor
//!
//! Every outbound request from the client passes through
//! [`RequestInterceptor::handle`], which classifies it and serves it from the
//! matching partition or the network.
//!
//! | Route | Policy |
//! |---|---|
//! | static | cache-first; a miss is fetched and stored in the background; offline documents fall back to the shell document |
//! | image | cache-first; ok network responses are stored |
//! | audio | cache-first by URL, range-aware; the first full `200` response is stored |
//! | passthrough | network only |

pub mod classify;

pub use classify::{classify, Route, StaticManifest};

use crate::error::{CacheError, Result};
use crate::partition::{CacheStore, Partition, PartitionKind};
use crate::range;
use crate::stored::StoredResponse;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::network::NetworkMonitor;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// What the requester intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDestination {
    Document,
    Style,
    Script,
    Image,
    Audio,
    Video,
    Font,
    #[default]
    Empty,
}

/// An outbound request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub destination: RequestDestination,
    pub headers: HashMap<String, String>,
}

impl InterceptedRequest {
    pub fn new(method: HttpMethod, url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| CacheError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            method,
            url,
            destination: RequestDestination::Empty,
            headers: HashMap::new(),
        })
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Cache key: the full URL, independent of any `Range` header.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }

    fn to_http_request(&self) -> HttpRequest {
        let mut request = HttpRequest::new(self.method, self.url.as_str());
        request.headers = self.headers.clone();
        request
    }
}

/// Routes intercepted requests to partitions or the network.
pub struct RequestInterceptor {
    store: Arc<CacheStore>,
    http_client: Arc<dyn HttpClient>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    manifest: StaticManifest,
    fallback_document: String,
    event_bus: Option<Arc<EventBus>>,
}

impl RequestInterceptor {
    pub fn new(
        store: Arc<CacheStore>,
        http_client: Arc<dyn HttpClient>,
        manifest: StaticManifest,
        fallback_document: impl Into<String>,
    ) -> Self {
        Self {
            store,
            http_client,
            network_monitor: None,
            manifest,
            fallback_document: fallback_document.into(),
            event_bus: None,
        }
    }

    /// Without a monitor, any network failure of a document counts as offline.
    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn manifest(&self) -> &StaticManifest {
        &self.manifest
    }

    /// Serve one request.
    ///
    /// Network errors are returned unchanged when no cached response can
    /// stand in for them.
    #[instrument(skip(self, request), fields(url = %redact_url(request.url.as_str()), destination = ?request.destination))]
    pub async fn handle(&self, request: InterceptedRequest) -> Result<HttpResponse> {
        match classify(&request, &self.manifest) {
            Route::Static => self.handle_static(request).await,
            Route::Image => self.handle_image(request).await,
            Route::Audio => self.handle_audio(request).await,
            Route::Passthrough => self.fetch(&request).await,
        }
    }

    async fn fetch(&self, request: &InterceptedRequest) -> Result<HttpResponse> {
        Ok(self.http_client.execute(request.to_http_request()).await?)
    }

    /// Cache lookup that degrades read failures to a miss.
    async fn lookup(&self, partition: &Partition, key: &str) -> Option<StoredResponse> {
        match partition.match_key(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(partition = partition.name(), error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store_best_effort(&self, partition: &Partition, key: &str, response: &HttpResponse) {
        if let Err(e) = partition
            .put(key, &StoredResponse::from_response(response))
            .await
        {
            warn!(partition = partition.name(), error = %e, "Failed to store response");
        }
    }

    async fn handle_static(&self, request: InterceptedRequest) -> Result<HttpResponse> {
        let partition = self.store.open(PartitionKind::Static).await?;

        if let Some(hit) = self.lookup(&partition, request.cache_key()).await {
            debug!("Static cache hit");
            return Ok(hit.to_response());
        }

        match self.fetch(&request).await {
            Ok(response) => {
                if response.is_success() {
                    let key = request.cache_key().to_string();
                    let stored = StoredResponse::from_response(&response);
                    tokio::spawn(async move {
                        if let Err(e) = partition.put(&key, &stored).await {
                            warn!(error = %e, "Background static store failed");
                        }
                    });
                }
                Ok(response)
            }
            Err(e) if request.destination == RequestDestination::Document => {
                if !self.is_offline().await {
                    return Err(e);
                }
                match self.offline_document(&partition, &request.url).await {
                    Some(fallback) => {
                        info!("Serving offline fallback document");
                        Ok(fallback.to_response())
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn is_offline(&self) -> bool {
        match &self.network_monitor {
            Some(monitor) => !monitor.is_connected().await,
            None => true,
        }
    }

    async fn offline_document(&self, partition: &Partition, url: &Url) -> Option<StoredResponse> {
        let key = url.join(&self.fallback_document).ok()?;
        self.lookup(partition, key.as_str()).await
    }

    async fn handle_image(&self, request: InterceptedRequest) -> Result<HttpResponse> {
        let partition = self.store.open(PartitionKind::Image).await?;

        if let Some(hit) = self.lookup(&partition, request.cache_key()).await {
            debug!("Image cache hit");
            return Ok(hit.to_response());
        }

        let response = self.fetch(&request).await?;
        if response.is_success() {
            self.store_best_effort(&partition, request.cache_key(), &response)
                .await;
        }
        Ok(response)
    }

    async fn handle_audio(&self, request: InterceptedRequest) -> Result<HttpResponse> {
        let partition = self.store.open(PartitionKind::Audio).await?;
        let range_header = request.header("range");

        if let Some(hit) = self.lookup(&partition, request.cache_key()).await {
            debug!(range = ?range_header, "Audio cache hit");
            return Ok(range::serve(&hit, range_header));
        }

        let response = self.fetch(&request).await?;
        if response.status == 200 && range_header.is_none() {
            self.store_best_effort(&partition, request.cache_key(), &response)
                .await;
        }
        Ok(response)
    }

    /// Fetch every manifest path under `origin` and store them together.
    ///
    /// Nothing is stored unless every entry fetched with an ok status.
    #[instrument(skip(self), fields(origin = %origin))]
    pub async fn precache(&self, origin: &Url) -> Result<usize> {
        let partition = self.store.open(PartitionKind::Static).await?;

        let result = self.fetch_manifest(origin).await;
        let entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Static precache failed");
                self.emit(CacheEvent::PrecacheFailed {
                    partition: partition.name().to_string(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        for (key, response) in &entries {
            partition
                .put(key, &StoredResponse::from_response(response))
                .await?;
        }

        info!(entries = entries.len(), "Static manifest precached");
        self.emit(CacheEvent::PrecacheCompleted {
            partition: partition.name().to_string(),
            entries: entries.len(),
        });
        Ok(entries.len())
    }

    async fn fetch_manifest(&self, origin: &Url) -> Result<Vec<(String, HttpResponse)>> {
        let fetches = self.manifest.paths().map(|path| async move {
            let url = origin.join(path).map_err(|e| CacheError::InvalidUrl {
                url: path.to_string(),
                message: e.to_string(),
            })?;
            let response = self
                .http_client
                .execute(HttpRequest::get(url.as_str()))
                .await?;
            if !response.is_success() {
                return Err(CacheError::Precache {
                    path: path.to_string(),
                    status: response.status,
                });
            }
            Ok((url.to_string(), response))
        });

        try_join_all(fetches).await
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Cache(event)).ok();
        }
    }
}
