//! # Podcast Library Module
//!
//! Owns the local podcast/episode metadata database and provides repository
//! patterns for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Repositories for podcasts and episodes
//! - The single-property update path (`update_prop`) the offline cache uses to
//!   keep each episode's `downloaded` flag accurate

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{Episode, EpisodeProp, Podcast, PodcastDeletion};
pub use repositories::{
    EpisodeRepository, PodcastRepository, SqliteEpisodeRepository, SqlitePodcastRepository,
};
