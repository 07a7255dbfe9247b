//! Vitrine Jobs Library
//!
//! Follows a generation job from submission to exactly one terminal state.
//!
//! Two transports report progress: a server-sent event stream ([`SseChannel`]) and a bounded
//! polling loop ([`PollChannel`]). Both emit the same [`StatusUpdate`](vitrine_core::StatusUpdate)
//! shape into a [`JobSession`], which funnels them through a single [`JobReconciler`].

pub mod channel;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod submission;

pub use channel::pull::{HttpStatusSource, PollChannel, PollResponse, StatusSource};
pub use channel::push::{ReconnectHandle, SseChannel};
pub use channel::{ChannelEvent, ConnectionState, JobChannel};
pub use error::{ChannelError, ChannelResult};
pub use reconciler::{ApplyOutcome, IgnoreReason, JobReconciler};
pub use session::{standard_channels, JobSession, LinkState};
pub use submission::{new_idempotency_key, JobSubmitter, Submission, SubmissionGuard};
