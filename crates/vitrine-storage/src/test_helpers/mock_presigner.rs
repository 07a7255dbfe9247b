use crate::traits::{Presigner, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// In-memory presigner that records every call.
///
/// Signed URLs look like `https://signed.test/{key}?expires={secs}`.
#[derive(Debug, Default)]
pub struct MockPresigner {
    calls: Mutex<Vec<String>>,
    fail: bool,
    delays: HashMap<String, Duration>,
}

impl MockPresigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every presign returns an error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Delay the answer for `key` (uses tokio time, so works with paused clocks).
    pub fn with_delay(mut self, key: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(key.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Presigner for MockPresigner {
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.calls.lock().unwrap().push(key.to_string());

        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }

        if self.fail {
            return Err(StorageError::PresignFailed(format!("mock failure for {}", key)));
        }

        Ok(format!(
            "https://signed.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
