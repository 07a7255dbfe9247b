//! Duplicate-submission protection.
//!
//! [`SubmissionGuard`] keeps the set of idempotency keys whose submission round-trip is still
//! running; a second trigger with the same key is skipped without calling anything.
//! [`JobSubmitter`] sends the key along so the backend can deduplicate retries as well.

use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use crate::error::ChannelError;
use vitrine_core::{AppError, ErrorMetadata, JobChannelConfig, LogLevel};

/// Generate a fresh idempotency key (UUID v4).
pub fn new_idempotency_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<T> {
    Completed(T),
    /// Another submission with the same key was still in flight.
    Skipped,
}

impl<T> Submission<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Submission::Completed(value) => Some(value),
            Submission::Skipped => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SubmissionGuard {
    in_flight: Mutex<HashSet<String>>,
}

/// Removes its key when dropped, so cancellation and panics release the key too.
struct InFlight<'a> {
    guard: &'a SubmissionGuard,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.key);
    }
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Run `submit` unless a submission for `key` is already running.
    pub async fn try_submit<F, Fut, T>(&self, key: &str, submit: F) -> Submission<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.lock().insert(key.to_string()) {
            tracing::debug!(idempotency_key = %key, "Duplicate submission skipped");
            return Submission::Skipped;
        }
        let _in_flight = InFlight {
            guard: self,
            key: key.to_string(),
        };

        Submission::Completed(submit().await)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(alias = "job_id")]
    job_id: String,
    #[serde(default)]
    status: Option<String>,
}

/// Client for `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct JobSubmitter {
    client: reqwest::Client,
    api_base_url: String,
}

impl JobSubmitter {
    pub fn new(client: reqwest::Client, config: &JobChannelConfig) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Submit a generation request and return the job id.
    ///
    /// The key travels in the `Idempotency-Key` header and, for object bodies, as
    /// `idempotencyKey`, so a retried request maps to the job created the first time.
    pub async fn submit(
        &self,
        request: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<String, AppError> {
        let result = self.send(request, idempotency_key).await;
        if let Err(e) = &result {
            report_failure(e, idempotency_key);
        }
        result
    }

    async fn send(
        &self,
        request: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<String, AppError> {
        if idempotency_key.is_empty() || idempotency_key.len() > 256 {
            return Err(AppError::InvalidInput(
                "Idempotency key must be between 1 and 256 characters".to_string(),
            ));
        }

        let mut body = request.clone();
        if let Some(object) = body.as_object_mut() {
            object
                .entry("idempotencyKey")
                .or_insert_with(|| serde_json::Value::String(idempotency_key.to_string()));
        }

        let url = format!("{}/api/generate", self.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(ChannelError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SubmitResponse = response.json().await.map_err(ChannelError::from)?;

        tracing::info!(
            job_id = %parsed.job_id,
            idempotency_key = %idempotency_key,
            status = parsed.status.as_deref().unwrap_or("unknown"),
            "Generation job submitted"
        );

        Ok(parsed.job_id)
    }
}

fn report_failure(err: &AppError, idempotency_key: &str) {
    let code = err.error_code();
    let retryable = err.is_recoverable();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            idempotency_key = %idempotency_key,
            code,
            error = %err,
            "Job submission refused"
        ),
        LogLevel::Warn => tracing::warn!(
            idempotency_key = %idempotency_key,
            code,
            retryable,
            error = %err,
            "Job submission failed"
        ),
        LogLevel::Error => tracing::error!(
            idempotency_key = %idempotency_key,
            code,
            retryable,
            error = %err,
            "Job submission rejected"
        ),
    }
}
