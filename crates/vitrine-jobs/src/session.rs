//! Channel wiring for one job.
//!
//! A `JobSession` owns the reconciler, one pump task per channel and the cancellation tree.
//! Dropping the session cancels everything; no update is applied afterwards.

use crate::channel::pull::{HttpStatusSource, PollChannel};
use crate::channel::push::{ReconnectHandle, SseChannel};
use crate::channel::{ChannelEvent, ConnectionState, JobChannel};
use crate::reconciler::JobReconciler;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vitrine_core::{GenerationJob, JobChannelConfig};

const CHANNEL_BUFFER: usize = 32;

/// Transport health as last reported by any channel. Not part of the job status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkState {
    pub connection: ConnectionState,
    pub last_error: Option<String>,
}

/// The push channel plus the polling fallback, both against the configured job API.
///
/// The returned handle forces the push channel to reconnect.
pub fn standard_channels(
    client: reqwest::Client,
    config: &JobChannelConfig,
) -> (Vec<Arc<dyn JobChannel>>, ReconnectHandle) {
    let sse = SseChannel::new(client.clone(), config);
    let reconnect = sse.reconnect_handle();
    let channels: Vec<Arc<dyn JobChannel>> = vec![
        Arc::new(sse),
        Arc::new(PollChannel::new(
            HttpStatusSource::new(client, config.api_base_url.clone()),
            config,
        )),
    ];
    (channels, reconnect)
}

pub struct JobSession {
    reconciler: Arc<JobReconciler>,
    cancel: CancellationToken,
    link: watch::Receiver<LinkState>,
    reconnect: Option<ReconnectHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl JobSession {
    /// Open every channel for `job_id` and start pumping their events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(job_id: impl Into<String>, channels: Vec<Arc<dyn JobChannel>>) -> Self {
        let job_id = job_id.into();
        let reconciler = Arc::new(JobReconciler::new(job_id.clone()));
        let cancel = CancellationToken::new();
        let (link_tx, link) = watch::channel(LinkState::default());
        let link_tx = Arc::new(link_tx);
        let mut tasks = Vec::with_capacity(channels.len() * 2);

        for channel in channels {
            let token = cancel.child_token();
            reconciler.register_channel(token.clone());

            let (tx, rx) = mpsc::channel(CHANNEL_BUFFER);

            tracing::debug!(job_id = %job_id, channel = channel.name(), "Opening job channel");
            let run_token = token.clone();
            let run_job_id = job_id.clone();
            tasks.push(tokio::spawn(async move {
                channel.run(run_job_id, tx, run_token).await;
            }));

            tasks.push(tokio::spawn(pump(
                rx,
                reconciler.clone(),
                link_tx.clone(),
                token,
            )));
        }

        Self {
            reconciler,
            cancel,
            link,
            reconnect: None,
            tasks,
        }
    }

    /// Open the standard push and poll channels.
    pub fn open_standard(
        job_id: impl Into<String>,
        client: reqwest::Client,
        config: &JobChannelConfig,
    ) -> Self {
        let (channels, reconnect) = standard_channels(client, config);
        let mut session = Self::open(job_id, channels);
        session.reconnect = Some(reconnect);
        session
    }

    pub fn job_id(&self) -> &str {
        self.reconciler.job_id()
    }

    pub fn snapshot(&self) -> GenerationJob {
        self.reconciler.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationJob> {
        self.reconciler.subscribe()
    }

    pub fn link(&self) -> watch::Receiver<LinkState> {
        self.link.clone()
    }

    /// Wait until the job is completed, failed or abandoned.
    pub async fn wait_final(&self) -> GenerationJob {
        let mut rx = self.reconciler.subscribe();
        let job = match rx.wait_for(|job| job.status.is_final()).await {
            Ok(job) => job.clone(),
            Err(_) => self.reconciler.snapshot(),
        };
        job
    }

    /// Drop the push connection and open a new one. Returns false when the session has no
    /// reconnectable channel.
    pub fn reconnect(&self) -> bool {
        match &self.reconnect {
            Some(handle) => {
                tracing::info!(job_id = %self.job_id(), "Reconnect requested");
                handle.reconnect();
                true
            }
            None => false,
        }
    }

    /// Abandon the job and stop every channel.
    pub fn cancel(&self) {
        self.reconciler.cancel();
        self.cancel.cancel();
    }
}

impl Drop for JobSession {
    fn drop(&mut self) {
        // Closing under the reconciler lock fences off pumps that already passed their
        // cancellation check.
        self.reconciler.close();
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn pump(
    mut events: mpsc::Receiver<ChannelEvent>,
    reconciler: Arc<JobReconciler>,
    link: Arc<watch::Sender<LinkState>>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        // The token may have fired while this event was queued.
        if token.is_cancelled() {
            break;
        }

        match event {
            ChannelEvent::Update(update) => {
                let status = update.status;
                let outcome = reconciler.apply(update);
                tracing::debug!(
                    job_id = %reconciler.job_id(),
                    status = %status,
                    outcome = ?outcome,
                    "Channel update"
                );
            }
            ChannelEvent::Connection(connection) => {
                link.send_modify(|state| {
                    state.connection = connection;
                    if connection == ConnectionState::Connected {
                        state.last_error = None;
                    }
                });
            }
            ChannelEvent::RecoverableError(message) => {
                link.send_modify(|state| state.last_error = Some(message));
            }
        }
    }
}
