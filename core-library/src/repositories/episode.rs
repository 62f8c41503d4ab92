//! Episode repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{Episode, EpisodeProp};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::{debug, instrument};

/// Episode repository interface for data access operations
///
/// `find_by_guid` and `update_prop` are the read/write pair the offline cache
/// consumes; everything else serves feed refresh and the UI.
#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    /// Insert or replace an episode.
    ///
    /// When the episode already exists its `progress` and `archived` values
    /// are kept; every other column takes the incoming value.
    async fn upsert(&self, episode: &Episode) -> Result<()>;

    /// Find an episode by GUID
    ///
    /// # Returns
    /// - `Ok(Some(episode))` if found
    /// - `Ok(None)` if not found
    async fn find_by_guid(&self, guid: &str) -> Result<Option<Episode>>;

    /// Episodes whose enclosure URL is `audio`
    async fn find_by_audio_url(&self, audio: &str) -> Result<Vec<Episode>>;

    /// Episodes of one podcast, newest first
    async fn list_by_podcast(&self, feed_url: &str) -> Result<Vec<Episode>>;

    /// Write a single property and return the updated episode.
    ///
    /// # Errors
    /// `LibraryError::NotFound` when no episode has this GUID.
    async fn update_prop(&self, guid: &str, prop: EpisodeProp) -> Result<Episode>;

    /// Delete an episode by GUID
    ///
    /// # Returns
    /// - `Ok(true)` if the episode was deleted
    /// - `Ok(false)` if it was not found
    async fn delete(&self, guid: &str) -> Result<bool>;
}

/// SQLite implementation of EpisodeRepository
pub struct SqliteEpisodeRepository {
    pool: SqlitePool,
}

impl SqliteEpisodeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EpisodeRepository for SqliteEpisodeRepository {
    #[instrument(skip(self, episode), fields(guid = %episode.guid))]
    async fn upsert(&self, episode: &Episode) -> Result<()> {
        episode.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "episode".to_string(),
            message: msg,
        })?;

        sqlx::query(
            r#"
            INSERT INTO episodes (
                guid, podcast, title, link, description, subtitle, pub_date,
                image, audio, season, episode, filesize, duration,
                progress, downloaded, archived, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO UPDATE SET
                podcast = excluded.podcast,
                title = excluded.title,
                link = excluded.link,
                description = excluded.description,
                subtitle = excluded.subtitle,
                pub_date = excluded.pub_date,
                image = excluded.image,
                audio = excluded.audio,
                season = excluded.season,
                episode = excluded.episode,
                filesize = excluded.filesize,
                duration = excluded.duration,
                downloaded = excluded.downloaded,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&episode.guid)
        .bind(&episode.podcast)
        .bind(&episode.title)
        .bind(&episode.link)
        .bind(&episode.description)
        .bind(&episode.subtitle)
        .bind(episode.pub_date)
        .bind(&episode.image)
        .bind(&episode.audio)
        .bind(episode.season)
        .bind(episode.episode)
        .bind(episode.filesize)
        .bind(episode.duration)
        .bind(episode.progress)
        .bind(episode.downloaded)
        .bind(episode.archived)
        .bind(episode.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Episode upserted");
        Ok(())
    }

    async fn find_by_guid(&self, guid: &str) -> Result<Option<Episode>> {
        let episode = query_as::<_, Episode>("SELECT * FROM episodes WHERE guid = ?")
            .bind(guid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(episode)
    }

    async fn find_by_audio_url(&self, audio: &str) -> Result<Vec<Episode>> {
        let episodes = query_as::<_, Episode>("SELECT * FROM episodes WHERE audio = ?")
            .bind(audio)
            .fetch_all(&self.pool)
            .await?;

        Ok(episodes)
    }

    async fn list_by_podcast(&self, feed_url: &str) -> Result<Vec<Episode>> {
        let episodes = query_as::<_, Episode>(
            "SELECT * FROM episodes WHERE podcast = ? ORDER BY pub_date DESC, guid",
        )
        .bind(feed_url)
        .fetch_all(&self.pool)
        .await?;

        Ok(episodes)
    }

    #[instrument(skip(self), fields(prop = %prop))]
    async fn update_prop(&self, guid: &str, prop: EpisodeProp) -> Result<Episode> {
        let now = chrono::Utc::now().timestamp();

        let query = match prop {
            EpisodeProp::Downloaded(value) => {
                sqlx::query("UPDATE episodes SET downloaded = ?, updated_at = ? WHERE guid = ?")
                    .bind(value)
            }
            EpisodeProp::Progress(value) => {
                if !value.is_finite() || value < 0.0 {
                    return Err(LibraryError::InvalidInput {
                        field: "progress".to_string(),
                        message: format!("{} is not a valid position", value),
                    });
                }
                sqlx::query("UPDATE episodes SET progress = ?, updated_at = ? WHERE guid = ?")
                    .bind(value)
            }
            EpisodeProp::Archived(value) => {
                sqlx::query("UPDATE episodes SET archived = ?, updated_at = ? WHERE guid = ?")
                    .bind(value)
            }
        };

        let result = query.bind(now).bind(guid).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("episode", guid));
        }

        debug!(column = prop.column(), "Episode property updated");
        self.find_by_guid(guid)
            .await?
            .ok_or_else(|| LibraryError::not_found("episode", guid))
    }

    async fn delete(&self, guid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM episodes WHERE guid = ?")
            .bind(guid)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
