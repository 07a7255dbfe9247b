//! Deduplicating log sink.
//!
//! Some degradations (missing storage credentials, a signer that keeps failing) are hit on
//! every request. `DedupLog` lets the first occurrence of each category through and counts
//! the rest, so the condition stays visible without flooding the log.

use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct DedupLog {
    seen: Mutex<HashMap<&'static str, u64>>,
}

impl DedupLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an occurrence of `category`. Returns true only for the first one.
    pub fn first_occurrence(&self, category: &'static str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = seen.entry(category).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Run `emit` on the first occurrence of `category` only.
    pub fn once<F: FnOnce()>(&self, category: &'static str, emit: F) {
        if self.first_occurrence(category) {
            emit();
        } else {
            tracing::trace!(category, "Suppressed repeated log line");
        }
    }

    /// Number of occurrences that were swallowed after the first.
    pub fn suppressed(&self, category: &'static str) -> u64 {
        let seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        seen.get(category).map(|c| c.saturating_sub(1)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emits_once_per_category() {
        let log = DedupLog::new();
        let emitted = AtomicUsize::new(0);

        for _ in 0..5 {
            log.once("presign", || {
                emitted.fetch_add(1, Ordering::SeqCst);
            });
        }
        log.once("other", || {
            emitted.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(emitted.load(Ordering::SeqCst), 2);
        assert_eq!(log.suppressed("presign"), 4);
        assert_eq!(log.suppressed("other"), 0);
        assert_eq!(log.suppressed("never"), 0);
    }

    #[test]
    fn test_first_occurrence_is_shared_across_threads() {
        let log = std::sync::Arc::new(DedupLog::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let log = log.clone();
                std::thread::spawn(move || log.first_occurrence("signer"))
            })
            .collect();
        let firsts = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|first| *first)
            .count();
        assert_eq!(firsts, 1);
    }
}
