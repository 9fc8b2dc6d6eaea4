//! Cancellable repeating tasks.
//!
//! All background activity in the kiosk is interval polling. The registry
//! keys each poll loop by a stable token so a new subscription for the same
//! key cancels the prior loop instead of stacking a second one. Ticks are
//! spawned fire-and-forget — a slow request never delays the next tick —
//! and each tick receives the loop's cancellation token, which it must
//! check before applying a result that may have arrived after teardown.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct PollerRegistry {
    tasks: Mutex<HashMap<String, CancellationToken>>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a repeating task under `key`, replacing (and cancelling) any
    /// prior task registered under the same key. The task runs once
    /// immediately and then once per interval until cancelled.
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe<F, Fut>(&self, key: &str, interval: Duration, task: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let previous = match self.tasks.lock() {
            Ok(mut tasks) => tasks.insert(key.to_string(), token.clone()),
            Err(e) => {
                debug!(key, "poller registry lock failed: {e}");
                return;
            }
        };
        if let Some(prev) = previous {
            prev.cancel();
        }

        let key = key.to_string();
        tokio::spawn(async move {
            debug!(key = %key, interval_ms = interval.as_millis() as u64, "poll loop started");
            loop {
                if token.is_cancelled() {
                    break;
                }
                // Fire-and-forget: overlapping in-flight ticks are possible
                // when a request outlives the interval.
                tokio::spawn(task(token.clone()));
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!(key = %key, "poll loop stopped");
        });
    }

    /// Cancel the loop registered under `key`. Returns whether one existed.
    pub fn cancel(&self, key: &str) -> bool {
        let token = match self.tasks.lock() {
            Ok(mut tasks) => tasks.remove(key),
            Err(_) => None,
        };
        match token {
            Some(t) => {
                t.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered loop.
    pub fn cancel_all(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (_, token) in tasks.drain() {
                token.cancel();
            }
        }
    }

    /// Whether a live (not yet cancelled) loop is registered under `key`.
    pub fn is_active(&self, key: &str) -> bool {
        match self.tasks.lock() {
            Ok(tasks) => tasks
                .get(key)
                .map(|token| !token.is_cancelled())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

impl Default for PollerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
