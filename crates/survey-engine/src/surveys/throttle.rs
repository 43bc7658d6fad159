//! Per-source submission throttling.
//!
//! The service only sees the [`SubmissionThrottle`] trait so deployments can swap the store.
//! [`InMemorySubmissionThrottle`] keeps its window map inside the process: it forgets every
//! source on restart and does not coordinate across instances. Entries whose window has
//! closed are dropped on every acquire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_SUBMISSION_WINDOW_SECS: u64 = 3600;

/// Store deciding whether a source may submit again.
pub trait SubmissionThrottle: Send + Sync {
    /// Admit the source and open its window in one step, or reject it when it submitted
    /// within the current window.
    fn try_acquire(&self, source: &str, now: DateTime<Utc>) -> Result<(), ThrottleError>;
    /// Hand back the window opened at `acquired_at` when its submission was not stored.
    fn release(&self, source: &str, acquired_at: DateTime<Utc>) -> Result<(), ThrottleError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    #[error("submission limit reached; retry in {retry_after_secs}s")]
    Limited { retry_after_secs: u64 },
    #[error("throttle store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct InMemorySubmissionThrottle {
    window: Duration,
    last_seen: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl Default for InMemorySubmissionThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_SUBMISSION_WINDOW_SECS)
    }
}

impl InMemorySubmissionThrottle {
    pub fn new(window_secs: u64) -> Self {
        let window_secs = i64::try_from(window_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Self {
            window: Duration::seconds(window_secs),
            last_seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>>, ThrottleError> {
        self.last_seen
            .lock()
            .map_err(|_| ThrottleError::Unavailable("throttle mutex poisoned".to_string()))
    }
}

impl SubmissionThrottle for InMemorySubmissionThrottle {
    fn try_acquire(&self, source: &str, now: DateTime<Utc>) -> Result<(), ThrottleError> {
        let mut guard = self.lock()?;
        let window = self.window;
        guard.retain(|_, last| now - *last < window);

        if let Some(last) = guard.get(source) {
            let remaining = window - (now - *last);
            return Err(ThrottleError::Limited {
                retry_after_secs: remaining.num_seconds().max(1) as u64,
            });
        }

        guard.insert(source.to_string(), now);
        Ok(())
    }

    fn release(&self, source: &str, acquired_at: DateTime<Utc>) -> Result<(), ThrottleError> {
        let mut guard = self.lock()?;
        if guard.get(source) == Some(&acquired_at) {
            guard.remove(source);
        }
        Ok(())
    }
}

/// Throttle that never limits, for imports and tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

impl SubmissionThrottle for Unthrottled {
    fn try_acquire(&self, _source: &str, _now: DateTime<Utc>) -> Result<(), ThrottleError> {
        Ok(())
    }

    fn release(&self, _source: &str, _acquired_at: DateTime<Utc>) -> Result<(), ThrottleError> {
        Ok(())
    }
}
