//! Stored responses

use bridge_traits::http::HttpResponse;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A response body plus the status and headers it was fetched with.
///
/// Header names are lower-cased on construction. Entries are immutable once
/// written; a re-cache replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            stored_at: Utc::now(),
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Snapshot a network response for storage.
    pub fn from_response(response: &HttpResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        Self {
            status: response.status,
            headers,
            body: response.body.clone(),
            stored_at: Utc::now(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Rebuild the response exactly as it was stored.
    pub fn to_response(&self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            headers: self.headers.clone().into_iter().collect(),
            body: self.body.clone(),
        }
    }

    pub(crate) fn meta(&self, key: &str) -> EntryMeta {
        EntryMeta {
            key: key.to_string(),
            status: self.status,
            headers: self.headers.clone(),
            stored_at: self.stored_at,
        }
    }
}

/// On-disk sidecar describing an entry body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntryMeta {
    pub key: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub stored_at: DateTime<Utc>,
}

impl EntryMeta {
    pub fn into_stored(self, body: Bytes) -> StoredResponse {
        StoredResponse {
            status: self.status,
            headers: self.headers,
            body,
            stored_at: self.stored_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_lowercases_headers() {
        let response = HttpResponse::new(200, Bytes::from_static(b"abc"))
            .with_header("Content-Type", "audio/mpeg")
            .with_header("Content-Length", "3");

        let stored = StoredResponse::from_response(&response);
        assert_eq!(stored.content_type(), Some("audio/mpeg"));
        assert_eq!(stored.headers.get("content-length").map(String::as_str), Some("3"));
        assert_eq!(stored.header("CONTENT-TYPE"), Some("audio/mpeg"));
        assert_eq!(stored.len(), 3);
    }

    #[test]
    fn test_to_response_keeps_status_and_body() {
        let stored = StoredResponse::new(203, Bytes::from_static(b"body"))
            .with_header("X-Custom", "1");

        let response = stored.to_response();
        assert_eq!(response.status, 203);
        assert_eq!(response.body, Bytes::from_static(b"body"));
        assert_eq!(response.header("x-custom"), Some("1"));
    }

    #[test]
    fn test_meta_round_trip_preserves_entry() {
        let stored = StoredResponse::new(200, Bytes::from_static(b"xyz"))
            .with_header("content-type", "image/png");

        let json = serde_json::to_vec(&stored.meta("https://a/b.png")).unwrap();
        let meta: EntryMeta = serde_json::from_slice(&json).unwrap();
        assert_eq!(meta.key, "https://a/b.png");
        assert_eq!(meta.into_stored(stored.body.clone()), stored);
    }
}
