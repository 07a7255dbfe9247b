use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Lifecycle of a generation job as seen by the client.
///
/// `Completed` and `Failed` are absorbing. `Abandoned` is client-only: the job was
/// cancelled locally without a terminal signal from the backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Abandoned,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// No further update may be applied once the job reached this state.
    pub fn is_final(&self) -> bool {
        self.is_terminal() || matches!(self, JobStatus::Abandoned)
    }

    /// Maps a backend status string. Unknown values count as still processing.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "pending" | "queued" => JobStatus::Pending,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Why a job failed. Presented identically to users, kept apart for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    /// The backend reported the failure.
    Explicit,
    /// The polling budget ran out before a terminal state was observed.
    Timeout,
}

/// One image produced by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    #[serde(alias = "r2_url")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(
        default,
        alias = "imagine_image_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub index: Option<u32>,
}

/// A single status observation emitted by a job channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub message: Option<String>,
    #[serde(default)]
    pub assets: Vec<GeneratedImage>,
    pub error: Option<String>,
    pub failure_reason: Option<FailureReason>,
}

impl StatusUpdate {
    fn base(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            progress: None,
            message: None,
            assets: Vec::new(),
            error: None,
            failure_reason: None,
        }
    }

    pub fn pending(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            progress: Some(0),
            message: Some(message.into()),
            ..Self::base(job_id, JobStatus::Pending)
        }
    }

    pub fn processing(job_id: impl Into<String>, progress: Option<u8>) -> Self {
        Self {
            progress: progress.map(|p| p.min(100)),
            ..Self::base(job_id, JobStatus::Processing)
        }
    }

    pub fn completed(job_id: impl Into<String>, assets: Vec<GeneratedImage>) -> Self {
        Self {
            progress: Some(100),
            assets,
            ..Self::base(job_id, JobStatus::Completed)
        }
    }

    pub fn failed(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            failure_reason: Some(FailureReason::Explicit),
            ..Self::base(job_id, JobStatus::Failed)
        }
    }

    pub fn timed_out(job_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            error: Some(format!("Generation timed out after {} attempts", attempts)),
            failure_reason: Some(FailureReason::Timeout),
            ..Self::base(job_id, JobStatus::Failed)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Client-side state of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: Option<String>,
    /// Populated only when completed.
    pub assets: Vec<GeneratedImage>,
    /// Populated only when failed.
    pub error: Option<String>,
    pub failure_reason: Option<FailureReason>,
}

impl GenerationJob {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress: 0,
            message: None,
            assets: Vec::new(),
            error: None,
            failure_reason: None,
        }
    }
}
