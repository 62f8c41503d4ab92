//! # Cache Error Types
//!
//! Errors surfaced by the offline cache. Worker-side failures never escape
//! as errors: they become `ok: false` replies on the correlation port.

use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    // ========================================================================
    // Storage
    // ========================================================================
    /// A host filesystem or network bridge call failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// A stored entry's metadata could not be read or written.
    #[error("Corrupt cache entry {key}: {message}")]
    CorruptEntry { key: String, message: String },

    /// Partition names must be a single path segment.
    #[error("Invalid partition name: {0}")]
    InvalidPartitionName(String),

    // ========================================================================
    // Fetching
    // ========================================================================
    /// Both the direct and the proxied fetch failed.
    #[error("{0}")]
    Fetch(String),

    /// A precache entry did not come back with an ok status.
    #[error("Precache of {path} failed: HTTP {status}")]
    Precache { path: String, status: u16 },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    // ========================================================================
    // Messaging
    // ========================================================================
    /// The worker has stopped, or dropped the reply port without answering.
    #[error("Cache worker is unavailable")]
    WorkerUnavailable,

    /// A reply arrived that does not belong to the request.
    #[error("Unexpected reply: expected {expected}, received {received}")]
    UnexpectedReply { expected: String, received: String },

    /// The worker could not decode the message.
    #[error("Request rejected: {0}")]
    Rejected(String),

    // ========================================================================
    // Configuration / metadata store
    // ========================================================================
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    #[error("Metadata store error: {0}")]
    Library(#[from] LibraryError),
}

impl CacheError {
    /// True when the failure came from the transport rather than the store.
    pub fn is_network(&self) -> bool {
        match self {
            CacheError::Bridge(e) => e.is_network(),
            CacheError::Fetch(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
