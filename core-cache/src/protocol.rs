//! # Cache Message Protocol
//!
//! Requests the UI posts to the cache worker and the replies it gets back.
//!
//! | Request | Payload | Reply | Reply payload |
//! |---|---|---|---|
//! | `CACHE_AUDIO` | `{url}` | `CACHE_AUDIO_RESULT` | `{ok, url, error?}` |
//! | `DELETE_AUDIO` | `{url}` | `DELETE_AUDIO_RESULT` | `{ok, url, error?}` |
//! | `CHECK_AUDIO` | `{url}` | `CHECK_AUDIO_RESULT` | `{ok, cached?, url, error?}` |
//! | `CLEAR_CACHE` | `{cacheName}` | `CLEAR_CACHE_RESULT` | `{success}` |
//!
//! Messages that do not decode into a [`CacheRequest`] are answered with
//! `REJECTED`.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

/// A request to the cache worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheRequest {
    CacheAudio {
        url: String,
    },
    DeleteAudio {
        url: String,
    },
    CheckAudio {
        url: String,
    },
    ClearCache {
        #[serde(rename = "cacheName")]
        cache_name: String,
    },
}

impl CacheRequest {
    pub fn type_name(&self) -> &'static str {
        match self {
            CacheRequest::CacheAudio { .. } => "CACHE_AUDIO",
            CacheRequest::DeleteAudio { .. } => "DELETE_AUDIO",
            CacheRequest::CheckAudio { .. } => "CHECK_AUDIO",
            CacheRequest::ClearCache { .. } => "CLEAR_CACHE",
        }
    }

    /// Type tag of the reply this request expects.
    pub fn reply_type(&self) -> &'static str {
        match self {
            CacheRequest::CacheAudio { .. } => "CACHE_AUDIO_RESULT",
            CacheRequest::DeleteAudio { .. } => "DELETE_AUDIO_RESULT",
            CacheRequest::CheckAudio { .. } => "CHECK_AUDIO_RESULT",
            CacheRequest::ClearCache { .. } => "CLEAR_CACHE_RESULT",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            CacheRequest::CacheAudio { url }
            | CacheRequest::DeleteAudio { url }
            | CacheRequest::CheckAudio { url } => Some(url),
            CacheRequest::ClearCache { .. } => None,
        }
    }
}

/// Result of a single-resource audio operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioResult {
    pub ok: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AudioResult {
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            ok: true,
            url: url.into(),
            cached: None,
            error: None,
        }
    }

    pub fn checked(url: impl Into<String>, cached: bool) -> Self {
        Self {
            cached: Some(cached),
            ..Self::success(url)
        }
    }

    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            url: url.into(),
            cached: None,
            error: Some(error.into()),
        }
    }
}

/// Result of clearing a whole partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResult {
    pub success: bool,
}

/// A reply posted on a correlation port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CacheReply {
    #[serde(rename = "CACHE_AUDIO_RESULT")]
    CacheAudio(AudioResult),
    #[serde(rename = "DELETE_AUDIO_RESULT")]
    DeleteAudio(AudioResult),
    #[serde(rename = "CHECK_AUDIO_RESULT")]
    CheckAudio(AudioResult),
    #[serde(rename = "CLEAR_CACHE_RESULT")]
    ClearCache(ClearResult),
    #[serde(rename = "REJECTED")]
    Rejected { error: String },
}

impl CacheReply {
    pub fn type_name(&self) -> &'static str {
        match self {
            CacheReply::CacheAudio(_) => "CACHE_AUDIO_RESULT",
            CacheReply::DeleteAudio(_) => "DELETE_AUDIO_RESULT",
            CacheReply::CheckAudio(_) => "CHECK_AUDIO_RESULT",
            CacheReply::ClearCache(_) => "CLEAR_CACHE_RESULT",
            CacheReply::Rejected { .. } => "REJECTED",
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            CacheReply::CacheAudio(result)
            | CacheReply::DeleteAudio(result)
            | CacheReply::CheckAudio(result) => Some(&result.url),
            _ => None,
        }
    }

    /// Whether this reply answers `request`: same type, and same URL for
    /// audio operations.
    pub fn answers(&self, request: &CacheRequest) -> bool {
        self.type_name() == request.reply_type() && self.url() == request.url()
    }
}

/// Private, single-use reply channel for one request.
///
/// Sending consumes the port, so at most one reply is ever delivered.
#[derive(Debug)]
pub struct ReplyPort {
    sender: oneshot::Sender<CacheReply>,
}

impl ReplyPort {
    /// A port and the receiver its creator awaits.
    pub fn channel() -> (Self, oneshot::Receiver<CacheReply>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Post the reply. Returns `false` when the requester has gone away.
    pub fn send(self, reply: CacheReply) -> bool {
        let kind = reply.type_name();
        match self.sender.send(reply) {
            Ok(()) => true,
            Err(_) => {
                debug!(reply = kind, "Requester dropped before reply");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request: CacheRequest =
            serde_json::from_value(json!({"type": "CACHE_AUDIO", "url": "https://a/ep.mp3"}))
                .unwrap();
        assert_eq!(
            request,
            CacheRequest::CacheAudio {
                url: "https://a/ep.mp3".to_string()
            }
        );

        let clear = serde_json::to_value(CacheRequest::ClearCache {
            cache_name: "images".to_string(),
        })
        .unwrap();
        assert_eq!(clear, json!({"type": "CLEAR_CACHE", "cacheName": "images"}));
    }

    #[test]
    fn test_unknown_request_type_does_not_decode() {
        let result = serde_json::from_value::<CacheRequest>(json!({"type": "PREFETCH", "url": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_reply_wire_format() {
        let reply = CacheReply::CheckAudio(AudioResult::checked("https://a/ep.mp3", true));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "CHECK_AUDIO_RESULT", "ok": true, "url": "https://a/ep.mp3", "cached": true})
        );

        let reply = CacheReply::CacheAudio(AudioResult::failure("https://a/ep.mp3", "boom"));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "CACHE_AUDIO_RESULT", "ok": false, "url": "https://a/ep.mp3", "error": "boom"})
        );

        let reply = CacheReply::ClearCache(ClearResult { success: true });
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "CLEAR_CACHE_RESULT", "success": true})
        );
    }

    #[test]
    fn test_reply_matching() {
        let request = CacheRequest::DeleteAudio {
            url: "https://a/1.mp3".to_string(),
        };

        assert!(CacheReply::DeleteAudio(AudioResult::success("https://a/1.mp3")).answers(&request));
        assert!(!CacheReply::DeleteAudio(AudioResult::success("https://a/2.mp3")).answers(&request));
        assert!(!CacheReply::CacheAudio(AudioResult::success("https://a/1.mp3")).answers(&request));

        let clear = CacheRequest::ClearCache {
            cache_name: "audio".to_string(),
        };
        assert!(CacheReply::ClearCache(ClearResult { success: false }).answers(&clear));
    }

    #[tokio::test]
    async fn test_reply_port_delivers_once() {
        let (port, receiver) = ReplyPort::channel();
        assert!(port.send(CacheReply::ClearCache(ClearResult { success: true })));
        assert_eq!(
            receiver.await.unwrap(),
            CacheReply::ClearCache(ClearResult { success: true })
        );

        let (port, receiver) = ReplyPort::channel();
        drop(receiver);
        assert!(port.is_closed());
        assert!(!port.send(CacheReply::Rejected {
            error: "late".to_string()
        }));
    }
}
