//! Podcast repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{Podcast, PodcastDeletion};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::{debug, instrument};

/// Podcast repository interface for data access operations
#[async_trait]
pub trait PodcastRepository: Send + Sync {
    /// Insert the podcast, or replace every column of an existing one.
    async fn upsert(&self, podcast: &Podcast) -> Result<()>;

    /// Find a podcast by its feed URL
    async fn find_by_feed_url(&self, feed_url: &str) -> Result<Option<Podcast>>;

    /// All podcasts ordered by title
    async fn list_all(&self) -> Result<Vec<Podcast>>;

    /// Delete a podcast and all of its episodes.
    async fn delete(&self, feed_url: &str) -> Result<PodcastDeletion>;
}

/// SQLite implementation of PodcastRepository
pub struct SqlitePodcastRepository {
    pool: SqlitePool,
}

impl SqlitePodcastRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PodcastRepository for SqlitePodcastRepository {
    #[instrument(skip(self, podcast), fields(feed_url = %podcast.feed_url))]
    async fn upsert(&self, podcast: &Podcast) -> Result<()> {
        podcast.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "podcast".to_string(),
            message: msg,
        })?;

        sqlx::query(
            r#"
            INSERT INTO podcasts (
                feed_url, title, link, description, summary, pub_date,
                image, author, category, explicit, subtitle, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_url) DO UPDATE SET
                title = excluded.title,
                link = excluded.link,
                description = excluded.description,
                summary = excluded.summary,
                pub_date = excluded.pub_date,
                image = excluded.image,
                author = excluded.author,
                category = excluded.category,
                explicit = excluded.explicit,
                subtitle = excluded.subtitle,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&podcast.feed_url)
        .bind(&podcast.title)
        .bind(&podcast.link)
        .bind(&podcast.description)
        .bind(&podcast.summary)
        .bind(podcast.pub_date)
        .bind(&podcast.image)
        .bind(&podcast.author)
        .bind(&podcast.category)
        .bind(podcast.explicit)
        .bind(&podcast.subtitle)
        .bind(podcast.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Podcast upserted");
        Ok(())
    }

    async fn find_by_feed_url(&self, feed_url: &str) -> Result<Option<Podcast>> {
        let podcast = query_as::<_, Podcast>("SELECT * FROM podcasts WHERE feed_url = ?")
            .bind(feed_url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(podcast)
    }

    async fn list_all(&self) -> Result<Vec<Podcast>> {
        let podcasts =
            query_as::<_, Podcast>("SELECT * FROM podcasts ORDER BY title COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;

        Ok(podcasts)
    }

    #[instrument(skip(self))]
    async fn delete(&self, feed_url: &str) -> Result<PodcastDeletion> {
        let mut tx = self.pool.begin().await?;

        let episodes = sqlx::query("DELETE FROM episodes WHERE podcast = ?")
            .bind(feed_url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let podcasts = sqlx::query("DELETE FROM podcasts WHERE feed_url = ?")
            .bind(feed_url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(deleted_episodes = episodes, "Podcast deleted");
        Ok(PodcastDeletion {
            deleted: podcasts > 0,
            deleted_episodes: episodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_upsert_and_find() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePodcastRepository::new(pool);

        let mut podcast = Podcast::new("https://feeds.example.com/a.xml", "Alpha");
        repo.upsert(&podcast).await.unwrap();

        podcast.author = Some("Host".to_string());
        podcast.explicit = true;
        repo.upsert(&podcast).await.unwrap();

        let found = repo
            .find_by_feed_url("https://feeds.example.com/a.xml")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, podcast);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_podcast() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePodcastRepository::new(pool);

        let result = repo.upsert(&Podcast::new("", "No feed")).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_list_all_is_sorted_by_title() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePodcastRepository::new(pool);

        repo.upsert(&Podcast::new("https://b", "beta")).await.unwrap();
        repo.upsert(&Podcast::new("https://a", "Alpha")).await.unwrap();

        let titles: Vec<_> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing_podcast() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqlitePodcastRepository::new(pool);

        let deletion = repo.delete("https://nowhere").await.unwrap();
        assert!(!deletion.deleted);
        assert_eq!(deletion.deleted_episodes, 0);
    }
}
