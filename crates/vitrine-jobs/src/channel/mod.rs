//! Job status transports.

pub mod pull;
pub mod push;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vitrine_core::StatusUpdate;

/// Connection lifecycle of a streaming transport. Orthogonal to the job status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// What a channel reports to its session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Update(StatusUpdate),
    Connection(ConnectionState),
    /// Something went wrong but the channel keeps going (or can be reconnected).
    RecoverableError(String),
}

/// A source of status updates for one job.
///
/// `run` delivers events in arrival order until the job reaches a terminal state, the
/// budget runs out, or `cancel` fires. Cancellation is the only teardown handle: once it
/// fires the channel stops listening and releases its transport.
#[async_trait]
pub trait JobChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        job_id: String,
        events: mpsc::Sender<ChannelEvent>,
        cancel: CancellationToken,
    );
}
