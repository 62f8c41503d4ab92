//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! network monitor) into the offline cache and the podcast metadata store.
//! Desktop apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so the bridges are filled in automatically.
//!
//! Bootstrap order matters: the stale partition sweep runs before any
//! partition is opened, and the worker only starts once the sweep is done.
//!
//! ```ignore
//! use core_cache::CacheConfig;
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/podcasts.db")
//!     .cache_dir("/data/cache")
//!     .build()?;
//! let origin = url::Url::parse("https://app.example.com")?;
//!
//! let core = core_service::bootstrap(config, CacheConfig::default(), Some(&origin)).await?;
//! core.reconciler().download("episode-guid").await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_cache::{
    AudioCacheController, CacheClient, CacheConfig, CacheStore, CacheWorker, DownloadReconciler,
    RequestInterceptor, StaticManifest, SweepReport,
};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::models::PodcastDeletion;
use core_library::repositories::{
    EpisodeRepository, PodcastRepository, SqliteEpisodeRepository, SqlitePodcastRepository,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, LibraryEvent};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use url::Url;

const EVENT_BUS_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: CoreConfig,
    event_bus: Arc<EventBus>,
    store: Arc<CacheStore>,
    interceptor: Arc<RequestInterceptor>,
    cache_client: CacheClient,
    reconciler: Arc<DownloadReconciler>,
    podcasts: Arc<dyn PodcastRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    sweep: SweepReport,
    worker: JoinHandle<()>,
}

/// Bring up the metadata store and the offline cache.
///
/// When `precache_static` is enabled and an `origin` is given, the static
/// manifest is fetched from it. A failed precache is logged and published on
/// the event bus; it does not abort bootstrap.
#[instrument(skip_all, fields(database = %config.database_path.display()))]
pub async fn bootstrap(
    config: CoreConfig,
    cache_config: CacheConfig,
    origin: Option<&Url>,
) -> Result<CoreService> {
    config.validate()?;
    cache_config.validate()?;

    let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));

    let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
    let podcasts: Arc<dyn PodcastRepository> = Arc::new(SqlitePodcastRepository::new(pool.clone()));
    let episodes: Arc<dyn EpisodeRepository> = Arc::new(SqliteEpisodeRepository::new(pool));

    let store = Arc::new(
        CacheStore::in_cache_directory(
            config.file_system.clone(),
            &cache_config.cache_directory,
            cache_config.versions.clone(),
        )
        .await?,
    );

    let sweep = store.activate().await?;
    if !sweep.deleted.is_empty() || !sweep.failed.is_empty() {
        event_bus
            .emit(CoreEvent::Cache(CacheEvent::PartitionsSwept {
                deleted: sweep.deleted.clone(),
                failed: sweep.failed.clone(),
            }))
            .ok();
    }

    let mut interceptor = RequestInterceptor::new(
        store.clone(),
        config.http_client.clone(),
        StaticManifest::new(cache_config.static_manifest.iter().cloned()),
        cache_config.fallback_document.clone(),
    )
    .with_event_bus(event_bus.clone());
    if let Some(monitor) = &config.network_monitor {
        interceptor = interceptor.with_network_monitor(monitor.clone());
    }
    let interceptor = Arc::new(interceptor);

    if config.features.precache_static {
        match origin {
            Some(origin) => {
                if let Err(e) = interceptor.precache(origin).await {
                    warn!(error = %e, "Static precache failed; continuing without it");
                }
            }
            None => info!("No origin configured; skipping static precache"),
        }
    }

    let controller = Arc::new(
        AudioCacheController::new(
            store.clone(),
            config.http_client.clone(),
            cache_config.proxy_prefix.clone(),
        )
        .with_event_bus(event_bus.clone()),
    );

    let (worker, handle) = CacheWorker::new(controller, interceptor.clone(), cache_config.queue_depth);
    let worker = worker.spawn();
    let cache_client = CacheClient::new(handle);

    let reconciler = Arc::new(
        DownloadReconciler::new(cache_client.clone(), episodes.clone())
            .with_event_bus(event_bus.clone()),
    );

    info!(
        root = %store.root().display(),
        swept = sweep.deleted.len(),
        "Core service ready"
    );

    Ok(CoreService {
        config,
        event_bus,
        store,
        interceptor,
        cache_client,
        reconciler,
        podcasts,
        episodes,
        sweep,
        worker,
    })
}

impl CoreService {
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn store(&self) -> Arc<CacheStore> {
        Arc::clone(&self.store)
    }

    /// Client for the cache worker; cheap to clone.
    pub fn cache_client(&self) -> CacheClient {
        self.cache_client.clone()
    }

    pub fn reconciler(&self) -> Arc<DownloadReconciler> {
        Arc::clone(&self.reconciler)
    }

    pub fn podcasts(&self) -> Arc<dyn PodcastRepository> {
        Arc::clone(&self.podcasts)
    }

    pub fn episodes(&self) -> Arc<dyn EpisodeRepository> {
        Arc::clone(&self.episodes)
    }

    /// Outcome of the stale partition sweep run during bootstrap.
    pub fn sweep_report(&self) -> &SweepReport {
        &self.sweep
    }

    /// Remove a podcast and its episodes from the metadata store.
    ///
    /// Cached audio is left in place; it is reachable again if the podcast
    /// is re-subscribed and goes with the next audio version sweep otherwise.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, feed_url: &str) -> Result<PodcastDeletion> {
        let deletion = self.podcasts.delete(feed_url).await?;
        if deletion.deleted {
            self.event_bus
                .emit(CoreEvent::Library(LibraryEvent::PodcastRemoved {
                    feed_url: feed_url.to_string(),
                }))
                .ok();
        }
        Ok(deletion)
    }

    /// Re-run the static precache, e.g. once the host knows its origin.
    pub async fn precache_static(&self, origin: &Url) -> Result<usize> {
        Ok(self.interceptor.precache(origin).await?)
    }

    /// Stop the worker. Outstanding requests are answered with
    /// `WorkerUnavailable`.
    pub fn shutdown(self) {
        self.worker.abort();
    }
}
