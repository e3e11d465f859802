//! Internal job-callback notifier.
//!
//! The splitter and the worker report chunk lifecycle events to a backend
//! over plain HTTP: `POST {base}/internal/jobs/{id}/chunk-complete` and
//! `POST {base}/internal/jobs/{id}/fail`, authenticated with an
//! `X-Internal-Token` header. Delivery is strictly best-effort — a dead
//! backend must never fail a chunk that was otherwise processed, so every
//! implementation swallows its own errors and logs them.

use crate::jobs::{ChunkCompleteNotice, ChunkFailNotice};
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, warn};

/// Receiver of chunk-complete / chunk-fail notifications.
///
/// Futures are `'static` so callers can fire them from any task without
/// borrowing the notifier across an await point.
pub trait CompletionNotifier: Send + Sync {
    fn chunk_complete(&self, job_id: &str, notice: ChunkCompleteNotice) -> BoxFuture<'static, ()>;

    fn chunk_failed(&self, job_id: &str, notice: ChunkFailNotice) -> BoxFuture<'static, ()>;
}

/// HTTP notifier matching the internal job API.
pub struct HttpNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpNotifier {
    /// `base_url` without a trailing slash, e.g. `https://api.example.com`.
    ///
    /// The short request timeout keeps a slow backend from stalling chunk
    /// processing; five seconds mirrors what the backend itself tolerates.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn post<T: serde::Serialize>(&self, url: String, body: &T) -> BoxFuture<'static, ()> {
        let req = self
            .client
            .post(&url)
            .header("X-Internal-Token", self.token.clone())
            .json(body);
        Box::pin(async move {
            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("notified {}", url);
                }
                Ok(resp) => {
                    warn!("notification to {} rejected: HTTP {}", url, resp.status());
                }
                Err(e) => {
                    warn!("notification to {} failed: {}", url, e);
                }
            }
        })
    }
}

impl CompletionNotifier for HttpNotifier {
    fn chunk_complete(&self, job_id: &str, notice: ChunkCompleteNotice) -> BoxFuture<'static, ()> {
        let url = format!("{}/internal/jobs/{}/chunk-complete", self.base_url, job_id);
        self.post(url, &notice)
    }

    fn chunk_failed(&self, job_id: &str, notice: ChunkFailNotice) -> BoxFuture<'static, ()> {
        let url = format!("{}/internal/jobs/{}/fail", self.base_url, job_id);
        self.post(url, &notice)
    }
}

/// Notifier for callers that track progress in-process (or not at all).
pub struct NoopNotifier;

impl CompletionNotifier for NoopNotifier {
    fn chunk_complete(&self, _job_id: &str, _notice: ChunkCompleteNotice) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }

    fn chunk_failed(&self, _job_id: &str, _notice: ChunkFailNotice) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}
