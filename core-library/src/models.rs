//! Domain models for the podcast metadata store
//!
//! Records are produced by feed refresh (outside this crate) and consumed by
//! the UI and the offline cache reconciler.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// =============================================================================
// Podcast
// =============================================================================

/// A subscribed podcast, keyed by its RSS feed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Podcast {
    /// RSS feed URL (unique key)
    pub feed_url: String,
    pub title: String,
    /// Podcast website
    pub link: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    /// Publication date as unix seconds
    pub pub_date: Option<i64>,
    /// Cover image URL
    pub image: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub explicit: bool,
    pub subtitle: Option<String>,
    /// Last write time (unix seconds)
    pub updated_at: i64,
}

impl Podcast {
    pub fn new(feed_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            title: title.into(),
            link: None,
            description: None,
            summary: None,
            pub_date: None,
            image: None,
            author: None,
            category: None,
            explicit: false,
            subtitle: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.feed_url.trim().is_empty() {
            return Err("Podcast feed URL cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Podcast title cannot be empty".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// Episode
// =============================================================================

/// A single episode, keyed by its feed GUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Episode {
    /// Feed-provided unique identifier
    pub guid: String,
    /// Parent podcast's feed URL
    pub podcast: String,
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
    pub subtitle: Option<String>,
    pub pub_date: Option<i64>,
    pub image: Option<String>,
    /// Audio enclosure URL; this is the key used by the audio cache
    pub audio: String,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    /// Enclosure size in bytes as advertised by the feed
    pub filesize: Option<i64>,
    /// Duration in seconds
    pub duration: Option<i64>,
    /// Playback position in seconds
    pub progress: f64,
    /// Whether the audio is available in the offline cache
    pub downloaded: bool,
    pub archived: bool,
    pub updated_at: i64,
}

impl Episode {
    pub fn new(
        guid: impl Into<String>,
        podcast: impl Into<String>,
        title: impl Into<String>,
        audio: impl Into<String>,
    ) -> Self {
        Self {
            guid: guid.into(),
            podcast: podcast.into(),
            title: title.into(),
            link: None,
            description: None,
            subtitle: None,
            pub_date: None,
            image: None,
            audio: audio.into(),
            season: None,
            episode: None,
            filesize: None,
            duration: None,
            progress: 0.0,
            downloaded: false,
            archived: false,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.guid.trim().is_empty() {
            return Err("Episode guid cannot be empty".to_string());
        }

        if self.podcast.trim().is_empty() {
            return Err("Episode must reference a podcast feed URL".to_string());
        }

        if self.audio.trim().is_empty() {
            return Err("Episode audio URL cannot be empty".to_string());
        }

        if !self.progress.is_finite() || self.progress < 0.0 {
            return Err(format!("Episode progress {} is not a valid position", self.progress));
        }

        if let Some(duration) = self.duration {
            if duration < 0 {
                return Err("Episode duration cannot be negative".to_string());
            }
        }

        Ok(())
    }
}

// =============================================================================
// Single-property updates
// =============================================================================

/// A single mutable episode property, written through `update_prop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "lowercase")]
pub enum EpisodeProp {
    Downloaded(bool),
    Progress(f64),
    Archived(bool),
}

impl EpisodeProp {
    /// Column backing this property.
    pub fn column(&self) -> &'static str {
        match self {
            EpisodeProp::Downloaded(_) => "downloaded",
            EpisodeProp::Progress(_) => "progress",
            EpisodeProp::Archived(_) => "archived",
        }
    }
}

impl fmt::Display for EpisodeProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeProp::Downloaded(v) => write!(f, "downloaded={}", v),
            EpisodeProp::Progress(v) => write!(f, "progress={}", v),
            EpisodeProp::Archived(v) => write!(f, "archived={}", v),
        }
    }
}

/// Outcome of removing a podcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastDeletion {
    pub deleted: bool,
    pub deleted_episodes: u64,
}
