//! # Offline Media Cache
//!
//! Serves static assets, images and audio from durable cache partitions and
//! performs explicit audio cache operations on behalf of the UI.
//!
//! ## Architecture
//!
//! ```text
//!   UI ──CacheClient──▶ WorkerHandle ══mpsc══▶ CacheWorker
//!    ▲                                          │  (task per message)
//!    └──────── ReplyPort (oneshot) ◀────────────┤
//!                                               ├──▶ AudioCacheController
//!                                               └──▶ RequestInterceptor
//!                                                        │
//!                                  CacheStore ◀──────────┘
//!                         static-<v> / images[-<v>] / audio[-<v>]
//! ```
//!
//! [`DownloadReconciler`] sits on the UI side and mirrors replies into the
//! episode store's `downloaded` flag.
//!
//! ## Startup
//!
//! ```rust,ignore
//! let store = Arc::new(CacheStore::in_cache_directory(fs, &config.cache_directory, config.versions.clone()).await?);
//! store.activate().await?;          // sweep stale versions first
//! let controller = Arc::new(AudioCacheController::new(store.clone(), http.clone(), &config.proxy_prefix));
//! let interceptor = Arc::new(RequestInterceptor::new(store, http, manifest, &config.fallback_document));
//! let (worker, handle) = CacheWorker::new(controller, interceptor, config.queue_depth);
//! worker.spawn();
//! let client = CacheClient::new(handle);
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod intercept;
pub mod partition;
pub mod protocol;
pub mod range;
pub mod reconcile;
pub mod stored;
pub mod worker;

pub use client::CacheClient;
pub use config::{CacheConfig, VersionTable};
pub use controller::AudioCacheController;
pub use error::{CacheError, Result};
pub use intercept::{
    classify, InterceptedRequest, RequestDestination, RequestInterceptor, Route, StaticManifest,
};
pub use partition::{CacheStore, Partition, PartitionKind, SweepReport};
pub use protocol::{AudioResult, CacheReply, CacheRequest, ClearResult, ReplyPort};
pub use range::{parse_range, serve, ByteRange};
pub use reconcile::DownloadReconciler;
pub use stored::StoredResponse;
pub use worker::{CacheWorker, WorkerHandle, WorkerMessage};
