//! # Cache Client
//!
//! Typed request/reply front end for the cache worker. Each call creates its
//! own [`ReplyPort`], so concurrent calls can never see each other's replies.

use crate::error::{CacheError, Result};
use crate::intercept::InterceptedRequest;
use crate::protocol::{AudioResult, CacheReply, CacheRequest, ClearResult, ReplyPort};
use crate::worker::WorkerHandle;
use bridge_traits::http::HttpResponse;
use core_runtime::logging::redact_url;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub struct CacheClient {
    handle: WorkerHandle,
}

impl CacheClient {
    pub fn new(handle: WorkerHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &WorkerHandle {
        &self.handle
    }

    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn cache_audio(&self, url: &str) -> Result<AudioResult> {
        self.audio_request(CacheRequest::CacheAudio {
            url: url.to_string(),
        })
        .await
    }

    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn delete_audio(&self, url: &str) -> Result<AudioResult> {
        self.audio_request(CacheRequest::DeleteAudio {
            url: url.to_string(),
        })
        .await
    }

    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn check_audio(&self, url: &str) -> Result<AudioResult> {
        self.audio_request(CacheRequest::CheckAudio {
            url: url.to_string(),
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn clear_cache(&self, cache_name: &str) -> Result<ClearResult> {
        match self
            .request(CacheRequest::ClearCache {
                cache_name: cache_name.to_string(),
            })
            .await?
        {
            CacheReply::ClearCache(result) => Ok(result),
            other => Err(CacheError::UnexpectedReply {
                expected: "CLEAR_CACHE_RESULT".to_string(),
                received: other.type_name().to_string(),
            }),
        }
    }

    /// Route an outbound request through the worker's interceptor.
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<HttpResponse> {
        self.handle.fetch(request).await
    }

    async fn audio_request(&self, request: CacheRequest) -> Result<AudioResult> {
        match self.request(request).await? {
            CacheReply::CacheAudio(result)
            | CacheReply::DeleteAudio(result)
            | CacheReply::CheckAudio(result) => Ok(result),
            other => Err(CacheError::UnexpectedReply {
                expected: "audio result".to_string(),
                received: other.type_name().to_string(),
            }),
        }
    }

    /// Post `request` on a fresh port and wait for the reply that answers it.
    pub async fn request(&self, request: CacheRequest) -> Result<CacheReply> {
        let (port, reply) = ReplyPort::channel();
        self.handle.post(request.clone(), port).await?;

        let reply = reply.await.map_err(|_| CacheError::WorkerUnavailable)?;

        if let CacheReply::Rejected { error } = reply {
            return Err(CacheError::Rejected(error));
        }

        if !reply.answers(&request) {
            warn!(
                expected = request.reply_type(),
                received = reply.type_name(),
                "Discarding mismatched reply"
            );
            return Err(CacheError::UnexpectedReply {
                expected: format!("{} for {:?}", request.reply_type(), request.url()),
                received: format!("{} for {:?}", reply.type_name(), reply.url()),
            });
        }

        Ok(reply)
    }
}
