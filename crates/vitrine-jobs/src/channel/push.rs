//! Server-sent event transport.
//!
//! Listens on `/api/sse/generation/{jobId}`. Transport disruptions are retried by the
//! event source itself; [`SseChannel::reconnect`] forces a fresh connection.

use super::{ChannelEvent, ConnectionState, JobChannel};
use crate::error::ChannelResult;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use vitrine_core::{GeneratedImage, JobChannelConfig, JobStatus, StatusUpdate};

pub const CONNECTED_MESSAGE: &str = "Connected to generation stream";
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Connection error. EventSource will automatically reconnect.";
const STREAM_ERROR_MESSAGE: &str = "Stream error occurred";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    job_id: Option<String>,
    status: Option<String>,
    progress: Option<f64>,
    message: Option<String>,
    #[serde(default)]
    assets: Vec<GeneratedImage>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

fn clamp_progress(progress: f64) -> u8 {
    progress.clamp(0.0, 100.0).round() as u8
}

/// Map one named stream event to channel events.
///
/// Returns an empty list for liveness pings and unknown names, and an error for payloads
/// that are not valid JSON.
pub fn map_event(job_id: &str, name: &str, data: &str) -> ChannelResult<Vec<ChannelEvent>> {
    let payload = || -> ChannelResult<StatusPayload> {
        if data.trim().is_empty() {
            return Ok(StatusPayload::default());
        }
        Ok(serde_json::from_str(data)?)
    };

    let events = match name {
        "connected" => {
            let p = payload()?;
            let id = p.job_id.as_deref().unwrap_or(job_id);
            vec![
                ChannelEvent::Connection(ConnectionState::Connected),
                ChannelEvent::Update(StatusUpdate::pending(id, CONNECTED_MESSAGE)),
            ]
        }
        "status" => {
            let p = payload()?;
            let id = p.job_id.clone().unwrap_or_else(|| job_id.to_string());
            let progress = p.progress.map(clamp_progress);
            let status = p.status.as_deref().map(JobStatus::from_wire);
            let update = match status {
                Some(JobStatus::Completed) => StatusUpdate::completed(&id, p.assets),
                Some(JobStatus::Failed) => StatusUpdate::failed(
                    &id,
                    p.error.unwrap_or_else(|| "Generation failed".to_string()),
                ),
                Some(JobStatus::Pending) => StatusUpdate {
                    status: JobStatus::Pending,
                    ..StatusUpdate::processing(&id, progress)
                },
                _ => StatusUpdate::processing(&id, progress),
            };
            let update = match p.message {
                Some(message) => update.with_message(message),
                None => update,
            };
            vec![ChannelEvent::Update(update)]
        }
        "progress" => {
            let p = payload()?;
            let id = p.job_id.as_deref().unwrap_or(job_id);
            let progress = p.progress.map(clamp_progress);
            let message = p.message.unwrap_or_else(|| {
                format!("Generating... {}%", progress.unwrap_or(0))
            });
            vec![ChannelEvent::Update(
                StatusUpdate::processing(id, progress).with_message(message),
            )]
        }
        "completed" => {
            let p = payload()?;
            let id = p.job_id.as_deref().unwrap_or(job_id);
            let message = p
                .message
                .unwrap_or_else(|| "Generation completed!".to_string());
            vec![ChannelEvent::Update(
                StatusUpdate::completed(id, p.assets).with_message(message),
            )]
        }
        "failed" => {
            let p = payload()?;
            let id = p.job_id.as_deref().unwrap_or(job_id);
            let message = p.message.unwrap_or_else(|| "Generation failed".to_string());
            let error = p.error.unwrap_or_else(|| message.clone());
            vec![ChannelEvent::Update(
                StatusUpdate::failed(id, error).with_message(message),
            )]
        }
        "ping" => Vec::new(),
        "error" => {
            let p: ErrorPayload = if data.trim().is_empty() {
                ErrorPayload::default()
            } else {
                serde_json::from_str(data)?
            };
            vec![ChannelEvent::RecoverableError(
                p.error.unwrap_or_else(|| STREAM_ERROR_MESSAGE.to_string()),
            )]
        }
        other => {
            tracing::debug!(job_id = %job_id, event = %other, "Ignoring unknown stream event");
            Vec::new()
        }
    };

    Ok(events)
}

/// Why a single connection stopped being read.
enum StreamEnd {
    Cancelled,
    ReceiverGone,
    Terminal,
    ReconnectRequested,
    Closed,
}

/// Forces an [`SseChannel`] to drop its connection and open a new one.
#[derive(Debug, Clone)]
pub struct ReconnectHandle(Arc<Notify>);

impl ReconnectHandle {
    pub fn reconnect(&self) {
        self.0.notify_one();
    }
}

pub struct SseChannel {
    client: reqwest::Client,
    api_base_url: String,
    close_grace: Duration,
    reconnect_delay: Duration,
    reconnect: Arc<Notify>,
}

impl SseChannel {
    pub fn new(client: reqwest::Client, config: &JobChannelConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            close_grace: config.close_grace(),
            reconnect_delay: config.reconnect_delay(),
            reconnect: Arc::new(Notify::new()),
        }
    }

    pub fn stream_url(&self, job_id: &str) -> String {
        format!(
            "{}/api/sse/generation/{}",
            self.api_base_url,
            urlencoding::encode(job_id)
        )
    }

    /// Tear down the current connection and open a new one after the reconnect delay.
    pub fn reconnect(&self) {
        self.reconnect.notify_one();
    }

    pub fn reconnect_handle(&self) -> ReconnectHandle {
        ReconnectHandle(self.reconnect.clone())
    }

    async fn read_stream(
        &self,
        job_id: &str,
        source: &mut EventSource,
        events: &mpsc::Sender<ChannelEvent>,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Cancelled,
                _ = self.reconnect.notified() => return StreamEnd::ReconnectRequested,
                next = source.next() => next,
            };

            let outgoing = match next {
                None => return StreamEnd::Closed,
                Some(Ok(Event::Open)) => {
                    tracing::debug!(job_id = %job_id, "Generation stream opened");
                    vec![ChannelEvent::Connection(ConnectionState::Connected)]
                }
                Some(Ok(Event::Message(message))) => {
                    match map_event(job_id, &message.event, &message.data) {
                        Ok(mapped) => mapped,
                        Err(e) => {
                            tracing::warn!(
                                job_id = %job_id,
                                event = %message.event,
                                error = %e,
                                "Skipping malformed stream event"
                            );
                            continue;
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Generation stream error");
                    let fatal = matches!(
                        e,
                        reqwest_eventsource::Error::InvalidStatusCode(..)
                            | reqwest_eventsource::Error::InvalidContentType(..)
                    );
                    let disrupted = vec![
                        ChannelEvent::Connection(ConnectionState::Disconnected),
                        ChannelEvent::RecoverableError(CONNECTION_ERROR_MESSAGE.to_string()),
                    ];
                    for event in disrupted {
                        if events.send(event).await.is_err() {
                            return StreamEnd::ReceiverGone;
                        }
                    }
                    if fatal {
                        return StreamEnd::Closed;
                    }
                    continue;
                }
            };

            for event in outgoing {
                let terminal = matches!(&event, ChannelEvent::Update(u) if u.is_terminal());
                if events.send(event).await.is_err() {
                    return StreamEnd::ReceiverGone;
                }
                if terminal {
                    return StreamEnd::Terminal;
                }
            }
        }
    }
}

#[async_trait]
impl JobChannel for SseChannel {
    fn name(&self) -> &'static str {
        "sse"
    }

    async fn run(
        &self,
        job_id: String,
        events: mpsc::Sender<ChannelEvent>,
        cancel: CancellationToken,
    ) {
        let url = self.stream_url(&job_id);

        loop {
            if events
                .send(ChannelEvent::Connection(ConnectionState::Connecting))
                .await
                .is_err()
            {
                return;
            }

            let mut source = match EventSource::new(self.client.get(&url)) {
                Ok(source) => source,
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = ?e, "Failed to create event source");
                    return;
                }
            };
            tracing::info!(job_id = %job_id, url = %url, "Connecting to generation stream");

            let end = self.read_stream(&job_id, &mut source, &events, &cancel).await;

            match end {
                StreamEnd::Cancelled | StreamEnd::ReceiverGone => {
                    source.close();
                    return;
                }
                StreamEnd::Terminal => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sleep(self.close_grace) => {}
                    }
                    source.close();
                    let _ = events
                        .send(ChannelEvent::Connection(ConnectionState::Disconnected))
                        .await;
                    tracing::debug!(job_id = %job_id, "Generation stream closed after terminal event");
                    return;
                }
                StreamEnd::ReconnectRequested => {
                    source.close();
                    tracing::info!(job_id = %job_id, "Reconnecting generation stream");
                }
                StreamEnd::Closed => {
                    source.close();
                    let _ = events
                        .send(ChannelEvent::Connection(ConnectionState::Disconnected))
                        .await;
                    // Stay down until someone asks for a new connection.
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = self.reconnect.notified() => {}
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(self.reconnect_delay) => {}
            }
        }
    }
}
