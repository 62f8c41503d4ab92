//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! - Traits define the interface for each entity
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `PodcastRepository` - Subscribed podcasts keyed by feed URL
//! - `EpisodeRepository` - Episodes keyed by GUID, including the offline `downloaded` flag

pub mod episode;
pub mod podcast;

pub use episode::{EpisodeRepository, SqliteEpisodeRepository};
pub use podcast::{PodcastRepository, SqlitePodcastRepository};
