//! Customer-facing order status tracking.
//!
//! One order is tracked at a time: Idle until an order is placed, Polling
//! while the kitchen works it, Settled once the backend reports a terminal
//! status. Poll errors are swallowed — connectivity hiccups are common and
//! stale-but-present status beats an error banner — and the poll retries on
//! the next tick for as long as the subscription lives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::KioskBackend;
use crate::models::OrderStatus;
use crate::poll::PollerRegistry;

/// Fixed cadence of the customer status poll.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(2500);

/// How long the one-shot "ready" banner stays up before auto-dismissing.
pub const READY_BANNER_DURATION: Duration = Duration::from_millis(3500);

/// What observers of the tracker see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedOrder {
    pub id: i64,
    pub status: OrderStatus,
    /// Terminal status reached; polling for this order has stopped.
    pub settled: bool,
    /// One-shot ready banner, cleared after [`READY_BANNER_DURATION`].
    pub show_ready: bool,
}

pub struct OrderTracker {
    registry: Arc<PollerRegistry>,
    tx: Arc<watch::Sender<Option<TrackedOrder>>>,
    current_key: Mutex<Option<String>>,
}

impl OrderTracker {
    pub fn new(registry: Arc<PollerRegistry>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            registry,
            tx: Arc::new(tx),
            current_key: Mutex::new(None),
        }
    }

    /// Watch the tracked order. Receivers observe every status overwrite.
    pub fn subscribe(&self) -> watch::Receiver<Option<TrackedOrder>> {
        self.tx.subscribe()
    }

    /// Snapshot of the currently tracked order, if any.
    pub fn current(&self) -> Option<TrackedOrder> {
        self.tx.borrow().clone()
    }

    /// Start polling the backend for this order's status at the standard
    /// cadence, replacing any previously tracked order.
    pub fn track<B>(&self, backend: Arc<B>, order_id: i64)
    where
        B: KioskBackend + 'static,
    {
        self.track_every(backend, order_id, STATUS_POLL_INTERVAL);
    }

    /// [`track`](Self::track) with an explicit interval, so a different
    /// cadence (backoff, tests) needs no new call sites.
    pub fn track_every<B>(&self, backend: Arc<B>, order_id: i64, interval: Duration)
    where
        B: KioskBackend + 'static,
    {
        let key = format!("order/{order_id}");

        // One tracked order at a time: drop any prior subscription. The
        // registry itself handles re-tracking the same order id.
        if let Ok(mut current) = self.current_key.lock() {
            if let Some(prev) = current.take() {
                if prev != key {
                    self.registry.cancel(&prev);
                }
            }
            *current = Some(key.clone());
        }

        let _ = self.tx.send(Some(TrackedOrder {
            id: order_id,
            status: OrderStatus::Received,
            settled: false,
            show_ready: false,
        }));
        info!(order_id, "tracking order status");

        let tx = self.tx.clone();
        let registry = self.registry.clone();
        let poll_key = key.clone();
        self.registry.subscribe(&key, interval, move |guard| {
            let backend = backend.clone();
            let tx = tx.clone();
            let registry = registry.clone();
            let poll_key = poll_key.clone();
            async move {
                let record = match backend.get_order(order_id).await {
                    Ok(r) => r,
                    Err(error) => {
                        // Stale-but-present status; retry next tick.
                        debug!(order_id, error = %error, "status fetch failed");
                        return;
                    }
                };
                if guard.is_cancelled() {
                    // Result arrived after teardown.
                    return;
                }

                let status = record.order.status;
                tx.send_modify(|slot| {
                    if let Some(tracked) = slot {
                        if tracked.id == order_id {
                            tracked.status = status;
                        }
                    }
                });

                if status.is_terminal() {
                    info!(order_id, status = %status, "order settled, stopping poll");
                    registry.cancel(&poll_key);
                    tx.send_modify(|slot| {
                        if let Some(tracked) = slot {
                            if tracked.id == order_id {
                                tracked.settled = true;
                                tracked.show_ready = true;
                            }
                        }
                    });

                    let banner_tx = tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(READY_BANNER_DURATION).await;
                        banner_tx.send_modify(|slot| {
                            if let Some(tracked) = slot {
                                if tracked.id == order_id {
                                    tracked.show_ready = false;
                                }
                            }
                        });
                    });
                }
            }
        });
    }

    /// Stop polling without waiting for a terminal status (view went away).
    pub fn stop(&self) {
        if let Ok(mut current) = self.current_key.lock() {
            if let Some(prev) = current.take() {
                self.registry.cancel(&prev);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
