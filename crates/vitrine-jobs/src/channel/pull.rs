//! Polling transport.
//!
//! Polls the status endpoint on a fixed interval with a hard attempt ceiling. Polls never
//! overlap: the next one is scheduled only after the previous response was handled.

use super::{ChannelEvent, JobChannel};
use crate::error::{ChannelError, ChannelResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use vitrine_core::{GeneratedImage, JobChannelConfig, JobStatus, StatusUpdate};

/// Body of `GET /api/generate-status/{jobId}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResponse {
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub images: Vec<GeneratedImage>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PollResponse {
    pub fn into_update(self, job_id: &str) -> StatusUpdate {
        let progress = self.progress.map(|p| p.clamp(0.0, 100.0).round() as u8);
        let update = match JobStatus::from_wire(&self.status) {
            JobStatus::Completed => StatusUpdate::completed(job_id, self.images),
            JobStatus::Failed => StatusUpdate::failed(
                job_id,
                self.error.unwrap_or_else(|| "Generation failed".to_string()),
            ),
            JobStatus::Pending => StatusUpdate {
                status: JobStatus::Pending,
                ..StatusUpdate::processing(job_id, progress)
            },
            _ => StatusUpdate::processing(job_id, progress),
        };
        match self.message {
            Some(message) => update.with_message(message),
            None => update,
        }
    }
}

/// Fetches one status observation.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, job_id: &str) -> ChannelResult<PollResponse>;
}

#[async_trait]
impl<S: StatusSource + ?Sized> StatusSource for Arc<S> {
    async fn fetch(&self, job_id: &str) -> ChannelResult<PollResponse> {
        (**self).fetch(job_id).await
    }
}

/// [`StatusSource`] backed by the job API.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpStatusSource {
    pub fn new(client: reqwest::Client, api_base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn status_url(&self, job_id: &str) -> String {
        format!(
            "{}/api/generate-status/{}",
            self.api_base_url,
            urlencoding::encode(job_id)
        )
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, job_id: &str) -> ChannelResult<PollResponse> {
        let response = self.client.get(self.status_url(job_id)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Http {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<PollResponse>().await?)
    }
}

pub struct PollChannel<S> {
    source: S,
    interval: Duration,
    max_attempts: u32,
}

impl<S: StatusSource> PollChannel<S> {
    pub fn new(source: S, config: &JobChannelConfig) -> Self {
        Self::with_budget(source, config.poll_interval(), config.poll_max_attempts)
    }

    pub fn with_budget(source: S, interval: Duration, max_attempts: u32) -> Self {
        Self {
            source,
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Total wall-clock budget before the job is declared timed out.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[async_trait]
impl<S: StatusSource> JobChannel for PollChannel<S> {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn run(
        &self,
        job_id: String,
        events: mpsc::Sender<ChannelEvent>,
        cancel: CancellationToken,
    ) {
        tracing::debug!(
            job_id = %job_id,
            interval_ms = self.interval.as_millis() as u64,
            max_attempts = self.max_attempts,
            "Polling job status"
        );

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                outcome = self.source.fetch(&job_id) => outcome,
            };

            match outcome {
                Ok(response) => {
                    let update = response.into_update(&job_id);
                    let terminal = update.is_terminal();
                    if events.send(ChannelEvent::Update(update)).await.is_err() {
                        return;
                    }
                    if terminal {
                        tracing::info!(job_id = %job_id, attempts, "Polling reached terminal state");
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        attempt = attempts,
                        error = %e,
                        "Status poll failed"
                    );
                }
            }

            if attempts >= self.max_attempts {
                tracing::warn!(job_id = %job_id, attempts, "Polling budget exhausted");
                let _ = events
                    .send(ChannelEvent::Update(StatusUpdate::timed_out(&job_id, attempts)))
                    .await;
                return;
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::FailureReason;

    fn response(json: &str) -> PollResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_processing_surfaces_progress() {
        let update = response(r#"{"status":"processing","progress":42.4}"#).into_update("j1");
        assert_eq!(update.status, JobStatus::Processing);
        assert_eq!(update.progress, Some(42));
    }

    #[test]
    fn test_queued_maps_to_pending() {
        let update = response(r#"{"status":"queued"}"#).into_update("j1");
        assert_eq!(update.status, JobStatus::Pending);
    }

    #[test]
    fn test_unknown_status_counts_as_processing() {
        let update = response(r#"{"status":"upscaling"}"#).into_update("j1");
        assert_eq!(update.status, JobStatus::Processing);
        assert!(!update.is_terminal());
    }

    #[test]
    fn test_completed_carries_images() {
        let update = response(
            r#"{"status":"completed","images":[{"id":"i1","url":"https://x/1.png"}]}"#,
        )
        .into_update("j1");
        assert_eq!(update.status, JobStatus::Completed);
        assert_eq!(update.progress, Some(100));
        assert_eq!(update.assets.len(), 1);
    }

    #[test]
    fn test_failed_is_explicit() {
        let update = response(r#"{"status":"failed","error":"NSFW prompt"}"#).into_update("j1");
        assert_eq!(update.error.as_deref(), Some("NSFW prompt"));
        assert_eq!(update.failure_reason, Some(FailureReason::Explicit));
    }

    #[test]
    fn test_status_url_encodes_job_id() {
        let source = HttpStatusSource::new(reqwest::Client::new(), "https://api.example/");
        assert_eq!(
            source.status_url("job 1/2"),
            "https://api.example/api/generate-status/job%201%2F2"
        );
    }

    #[test]
    fn test_budget_is_interval_times_attempts() {
        let channel = PollChannel::new(
            HttpStatusSource::new(reqwest::Client::new(), "http://localhost"),
            &JobChannelConfig::default(),
        );
        assert_eq!(channel.budget(), Duration::from_secs(120));
    }
}
