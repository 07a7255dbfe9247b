//! Terminal-state arbiter.
//!
//! Every channel for a job feeds one `JobReconciler`. It applies updates in the order they
//! arrive, refuses anything that would move the job backwards, and lets exactly one
//! terminal update through. Observers see one watch transition per applied update.

use std::fmt;
use std::sync::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use vitrine_core::{GenerationJob, JobStatus, StatusUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The update belongs to a different job.
    OtherJob,
    /// The job already reached a terminal state, or was abandoned.
    AlreadyFinal,
    /// Progress or status would move backwards.
    Stale,
    /// The owner went away; the job is no longer observed.
    Closed,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::OtherJob => write!(f, "other_job"),
            IgnoreReason::AlreadyFinal => write!(f, "already_final"),
            IgnoreReason::Stale => write!(f, "stale"),
            IgnoreReason::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Ignored(IgnoreReason),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

struct Inner {
    channels: Vec<CancellationToken>,
    closed: bool,
}

pub struct JobReconciler {
    job_id: String,
    state: watch::Sender<GenerationJob>,
    inner: Mutex<Inner>,
}

impl JobReconciler {
    pub fn new(job_id: impl Into<String>) -> Self {
        let job_id = job_id.into();
        let (state, _) = watch::channel(GenerationJob::new(job_id.clone()));
        Self {
            job_id,
            state,
            inner: Mutex::new(Inner {
                channels: Vec::new(),
                closed: false,
            }),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Register a channel's teardown handle. Cancelled as soon as the job is final.
    pub fn register_channel(&self, token: CancellationToken) {
        let mut inner = self.lock();
        if inner.closed || self.state.borrow().status.is_final() {
            token.cancel();
            return;
        }
        inner.channels.push(token);
    }

    pub fn snapshot(&self) -> GenerationJob {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationJob> {
        self.state.subscribe()
    }

    pub fn apply(&self, update: StatusUpdate) -> ApplyOutcome {
        if update.job_id != self.job_id {
            tracing::debug!(
                job_id = %self.job_id,
                update_job_id = %update.job_id,
                "Ignoring update for another job"
            );
            return ApplyOutcome::Ignored(IgnoreReason::OtherJob);
        }

        // Serializes concurrent appliers; the watch value is only written under this lock.
        let mut inner = self.lock();
        if inner.closed {
            return ApplyOutcome::Ignored(IgnoreReason::Closed);
        }

        let current = self.state.borrow().clone();
        if current.status.is_final() {
            if update.is_terminal() && update.status != current.status {
                tracing::warn!(
                    job_id = %self.job_id,
                    current = %current.status,
                    incoming = %update.status,
                    "Conflicting terminal update discarded"
                );
            } else {
                tracing::debug!(
                    job_id = %self.job_id,
                    status = %update.status,
                    "Update after final state discarded"
                );
            }
            return ApplyOutcome::Ignored(IgnoreReason::AlreadyFinal);
        }

        if !update.is_terminal() && is_regression(&current, &update) {
            tracing::debug!(
                job_id = %self.job_id,
                current_progress = current.progress,
                incoming_progress = ?update.progress,
                "Stale update discarded"
            );
            return ApplyOutcome::Ignored(IgnoreReason::Stale);
        }

        let terminal = update.is_terminal();
        self.state.send_modify(|job| merge(job, update));

        if terminal {
            let job = self.state.borrow().clone();
            tracing::info!(
                job_id = %self.job_id,
                status = %job.status,
                failure_reason = ?job.failure_reason,
                assets = job.assets.len(),
                "Job reached terminal state"
            );
            teardown(&mut inner);
        }

        ApplyOutcome::Applied
    }

    /// Abandon the job: tear down every channel and refuse all later updates.
    ///
    /// Returns false when the job was already final or closed.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        teardown(&mut inner);
        if inner.closed {
            return false;
        }

        let mut abandoned = false;
        self.state.send_if_modified(|job| {
            if job.status.is_final() {
                return false;
            }
            job.status = JobStatus::Abandoned;
            abandoned = true;
            true
        });

        if abandoned {
            tracing::info!(job_id = %self.job_id, "Job abandoned");
        }
        abandoned
    }

    /// Stop observing the job without publishing anything.
    ///
    /// Tears down every channel; later updates are refused and watchers keep the last
    /// published value.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        teardown(&mut inner);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn teardown(inner: &mut Inner) {
    for token in inner.channels.drain(..) {
        token.cancel();
    }
}

fn is_regression(current: &GenerationJob, update: &StatusUpdate) -> bool {
    if current.status != JobStatus::Processing {
        return false;
    }
    if update.status == JobStatus::Pending {
        return true;
    }
    matches!(update.progress, Some(p) if p < current.progress)
}

fn merge(job: &mut GenerationJob, update: StatusUpdate) {
    job.status = update.status;
    if let Some(progress) = update.progress {
        job.progress = progress;
    }
    if let Some(message) = update.message {
        job.message = Some(message);
    } else if job.status == JobStatus::Processing {
        job.message = Some(format!("Generating... {}%", job.progress));
    }
    match job.status {
        JobStatus::Completed => {
            job.assets = update.assets;
            job.error = None;
            job.failure_reason = None;
        }
        JobStatus::Failed => {
            job.assets.clear();
            job.error = update.error;
            job.failure_reason = update.failure_reason;
        }
        _ => {}
    }
}
