//! # Cache Worker
//!
//! The execution context owning the interceptor and the controller. Callers
//! reach it only through [`WorkerHandle`] messages; each message is handled
//! on its own task so a slow download never blocks other requests.
//!
//! There is no cancellation: once accepted, a message runs to completion and
//! its reply port is answered exactly once.

use crate::controller::AudioCacheController;
use crate::error::{CacheError, Result};
use crate::intercept::{InterceptedRequest, RequestInterceptor};
use crate::protocol::{CacheReply, CacheRequest, ReplyPort};
use bridge_traits::http::HttpResponse;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Inbound worker message.
#[derive(Debug)]
pub enum WorkerMessage {
    /// A decoded cache request
    Request {
        request: CacheRequest,
        port: ReplyPort,
    },
    /// An undecoded message from a loosely typed caller
    Raw {
        payload: serde_json::Value,
        port: ReplyPort,
    },
    /// An outbound request to intercept
    Fetch {
        request: InterceptedRequest,
        respond_to: oneshot::Sender<Result<HttpResponse>>,
    },
}

pub struct CacheWorker {
    controller: Arc<AudioCacheController>,
    interceptor: Arc<RequestInterceptor>,
    receiver: mpsc::Receiver<WorkerMessage>,
}

impl CacheWorker {
    /// Create a worker and the handle used to talk to it.
    pub fn new(
        controller: Arc<AudioCacheController>,
        interceptor: Arc<RequestInterceptor>,
        queue_depth: usize,
    ) -> (Self, WorkerHandle) {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        (
            Self {
                controller,
                interceptor,
                receiver,
            },
            WorkerHandle { sender },
        )
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process messages until every handle has been dropped.
    pub async fn run(mut self) {
        info!("Cache worker started");

        while let Some(message) = self.receiver.recv().await {
            let controller = Arc::clone(&self.controller);
            let interceptor = Arc::clone(&self.interceptor);
            tokio::spawn(async move {
                dispatch(&controller, &interceptor, message).await;
            });
        }

        info!("Cache worker stopped");
    }
}

async fn dispatch(
    controller: &AudioCacheController,
    interceptor: &RequestInterceptor,
    message: WorkerMessage,
) {
    match message {
        WorkerMessage::Request { request, port } => {
            debug!(request = request.type_name(), "Handling cache request");
            port.send(controller.handle(request).await);
        }
        WorkerMessage::Raw { payload, port } => {
            match serde_json::from_value::<CacheRequest>(payload) {
                Ok(request) => {
                    port.send(controller.handle(request).await);
                }
                Err(e) => {
                    warn!(error = %e, "Rejecting undecodable message");
                    port.send(CacheReply::Rejected {
                        error: format!("Unrecognized message: {}", e),
                    });
                }
            }
        }
        WorkerMessage::Fetch {
            request,
            respond_to,
        } => {
            let response = interceptor.handle(request).await;
            if respond_to.send(response).is_err() {
                debug!("Fetch requester dropped before response");
            }
        }
    }
}

/// Sending side of the worker queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<WorkerMessage>,
}

impl WorkerHandle {
    /// Queue a request; its reply arrives on `port`.
    pub async fn post(&self, request: CacheRequest, port: ReplyPort) -> Result<()> {
        self.send(WorkerMessage::Request { request, port }).await
    }

    /// Queue an undecoded JSON message; undecodable ones are answered with `REJECTED`.
    pub async fn post_raw(&self, payload: serde_json::Value, port: ReplyPort) -> Result<()> {
        self.send(WorkerMessage::Raw { payload, port }).await
    }

    /// Route an outbound request through the interceptor.
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<HttpResponse> {
        let (respond_to, response) = oneshot::channel();
        self.send(WorkerMessage::Fetch {
            request,
            respond_to,
        })
        .await?;

        response.await.map_err(|_| CacheError::WorkerUnavailable)?
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, message: WorkerMessage) -> Result<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| CacheError::WorkerUnavailable)
    }
}
