//! # Download Reconciliation
//!
//! Keeps each episode's `downloaded` flag in line with the audio partition.
//! The flag is written only after the worker has replied, and only from the
//! reply:
//!
//! - `CACHE_AUDIO_RESULT` with `ok` → `true`
//! - `DELETE_AUDIO_RESULT` with `ok` → `false`
//! - `CHECK_AUDIO_RESULT` → the reported `cached` value, which repairs the
//!   flag after a version sweep evicted the file
//!
//! Episodes that share an enclosure URL share one partition entry, so the
//! flag is written on every one of them.
//!
//! Operations on the same URL are not serialised against each other; the
//! last reply to arrive wins.

use crate::client::CacheClient;
use crate::error::{CacheError, Result};
use crate::protocol::AudioResult;
use core_library::models::{Episode, EpisodeProp};
use core_library::repositories::EpisodeRepository;
use core_library::LibraryError;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct DownloadReconciler {
    client: CacheClient,
    episodes: Arc<dyn EpisodeRepository>,
    event_bus: Option<Arc<EventBus>>,
}

impl DownloadReconciler {
    pub fn new(client: CacheClient, episodes: Arc<dyn EpisodeRepository>) -> Self {
        Self {
            client,
            episodes,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    async fn episode(&self, guid: &str) -> Result<Episode> {
        self.episodes
            .find_by_guid(guid)
            .await?
            .ok_or_else(|| CacheError::Library(LibraryError::not_found("episode", guid)))
    }

    /// Cache the episode's audio and mark it downloaded on success.
    #[instrument(skip(self))]
    pub async fn download(&self, guid: &str) -> Result<AudioResult> {
        let episode = self.episode(guid).await?;
        let result = self.client.cache_audio(&episode.audio).await?;

        if result.ok {
            self.set_downloaded(&episode, true).await;
        }
        Ok(result)
    }

    /// Remove the episode's audio and clear the flag on success.
    #[instrument(skip(self))]
    pub async fn remove(&self, guid: &str) -> Result<AudioResult> {
        let episode = self.episode(guid).await?;
        let result = self.client.delete_audio(&episode.audio).await?;

        if result.ok {
            self.set_downloaded(&episode, false).await;
        }
        Ok(result)
    }

    /// Re-check the partition and copy the answer into the flag.
    #[instrument(skip(self))]
    pub async fn refresh(&self, guid: &str) -> Result<AudioResult> {
        let episode = self.episode(guid).await?;
        let result = self.client.check_audio(&episode.audio).await?;

        if let Some(cached) = result.cached {
            self.set_downloaded(&episode, cached).await;
        }
        Ok(result)
    }

    /// Guids of every episode backed by the same audio entry as `episode`.
    async fn sharing_audio(&self, episode: &Episode) -> Vec<String> {
        match self.episodes.find_by_audio_url(&episode.audio).await {
            Ok(found) => {
                let mut guids: Vec<String> = found.into_iter().map(|e| e.guid).collect();
                if !guids.contains(&episode.guid) {
                    guids.push(episode.guid.clone());
                }
                guids
            }
            Err(e) => {
                warn!(error = %e, "Failed to look up episodes sharing audio");
                vec![episode.guid.clone()]
            }
        }
    }

    async fn set_downloaded(&self, episode: &Episode, downloaded: bool) {
        for guid in self.sharing_audio(episode).await {
            self.set_flag(&guid, downloaded).await;
        }
    }

    /// Flag writes are best effort; the cache operation already happened.
    async fn set_flag(&self, guid: &str, downloaded: bool) {
        match self
            .episodes
            .update_prop(guid, EpisodeProp::Downloaded(downloaded))
            .await
        {
            Ok(_) => {
                debug!(downloaded, "Episode download flag updated");
                if let Some(bus) = &self.event_bus {
                    bus.emit(CoreEvent::Library(LibraryEvent::EpisodeDownloadChanged {
                        guid: guid.to_string(),
                        downloaded,
                    }))
                    .ok();
                }
            }
            Err(e) => {
                warn!(downloaded, error = %e, "Failed to update episode download flag");
            }
        }
    }
}
