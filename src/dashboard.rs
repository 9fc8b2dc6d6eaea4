//! Kitchen-facing order board.
//!
//! The board mirrors the backend's active-order list on a fixed cadence and
//! filters it client-side to this station's orders. Staff status changes
//! apply optimistically: the previous status is captured before the
//! tentative one is written, and that snapshot — not the mutated value — is
//! restored when the backend rejects the update.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};

use crate::api::KioskBackend;
use crate::models::{OrderRecord, OrderStatus};
use crate::poll::PollerRegistry;

/// Fixed cadence of the board refresh.
pub const DASHBOARD_POLL_INTERVAL: Duration = Duration::from_secs(3);

const DASHBOARD_POLL_KEY: &str = "dashboard";

/// Orders older than this are flagged for attention.
const OVERDUE_AFTER_MINUTES: i64 = 8;

/// Which path removed a completed order from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPath {
    Deleted,
    MarkedCompleted,
}

#[derive(Default)]
pub struct Dashboard {
    orders: Mutex<Vec<OrderRecord>>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn replace(&self, list: Vec<OrderRecord>) {
        if let Ok(mut orders) = self.orders.lock() {
            *orders = list;
        }
    }

    fn remove(&self, id: i64) {
        if let Ok(mut orders) = self.orders.lock() {
            orders.retain(|o| o.id != id);
        }
    }

    /// Current board contents, backend order preserved.
    pub fn orders(&self) -> Vec<OrderRecord> {
        match self.orders.lock() {
            Ok(orders) => orders.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// This station's orders, optionally narrowed to one status. Stable
    /// relative to the fetched order.
    pub fn visible_orders(&self, station: &str, status_filter: Option<OrderStatus>) -> Vec<OrderRecord> {
        match self.orders.lock() {
            Ok(orders) => orders
                .iter()
                .filter(|o| o.order.table == station)
                .filter(|o| status_filter.map_or(true, |f| o.order.status == f))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// One-shot refresh from the backend. Fetch errors keep the stale board
    /// rather than surfacing anything.
    pub async fn refresh<B: KioskBackend>(&self, backend: &B) {
        match backend.list_orders().await {
            Ok(list) => self.replace(list),
            Err(error) => {
                debug!(error = %error, "order list fetch failed, keeping stale board");
            }
        }
    }

    /// Advance an order's status. The tentative value is shown immediately;
    /// if the backend rejects it, the pre-mutation snapshot is restored and
    /// the error reported. Completing an order removes it from the board
    /// whether or not the backend accepted.
    pub async fn update_status<B: KioskBackend>(
        &self,
        backend: &B,
        id: i64,
        new_status: OrderStatus,
    ) -> Result<(), String> {
        let previous = {
            let mut orders = self.orders.lock().map_err(|e| e.to_string())?;
            let order = orders
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or_else(|| format!("Order {id} is not on the board"))?;
            let previous = order.order.status;
            order.order.status = new_status;
            previous
        }; // lock released before the network call

        match backend.update_order_status(id, new_status).await {
            Ok(()) => {
                info!(order_id = id, status = %new_status, "order status updated");
                if new_status == OrderStatus::Completed {
                    self.remove(id);
                }
                Ok(())
            }
            Err(error) => {
                if let Ok(mut orders) = self.orders.lock() {
                    if let Some(order) = orders.iter_mut().find(|o| o.id == id) {
                        order.order.status = previous;
                    }
                }
                if new_status == OrderStatus::Completed {
                    self.remove(id);
                }
                warn!(order_id = id, error = %error, "status update failed, rolled back");
                Err(format!("Failed to update order {id} status: {error}"))
            }
        }
    }

    /// Take a finished order off the backend: delete it, falling back to a
    /// completed-status update when the delete fails. The order leaves the
    /// visible board regardless of which path ran (or whether either
    /// succeeded).
    pub async fn complete_order<B: KioskBackend>(
        &self,
        backend: &B,
        id: i64,
    ) -> Result<CompletionPath, String> {
        let result = match backend.delete_order(id).await {
            Ok(()) => {
                info!(order_id = id, "order completed and deleted");
                Ok(CompletionPath::Deleted)
            }
            Err(delete_error) => {
                warn!(order_id = id, error = %delete_error, "order delete failed, falling back to status update");
                match backend
                    .update_order_status(id, OrderStatus::Completed)
                    .await
                {
                    Ok(()) => Ok(CompletionPath::MarkedCompleted),
                    Err(patch_error) => Err(format!(
                        "Failed to remove order {id} from the backend: {patch_error}"
                    )),
                }
            }
        };
        self.remove(id);
        result
    }
}

/// Start the board poll under the registry. Resubscribing (same key)
/// replaces any running loop.
pub fn start_dashboard_poll<B>(
    registry: &PollerRegistry,
    board: Arc<Dashboard>,
    backend: Arc<B>,
    interval: Duration,
) where
    B: KioskBackend + 'static,
{
    registry.subscribe(DASHBOARD_POLL_KEY, interval, move |guard| {
        let board = board.clone();
        let backend = backend.clone();
        async move {
            match backend.list_orders().await {
                Ok(list) => {
                    if !guard.is_cancelled() {
                        board.replace(list);
                    }
                }
                Err(error) => {
                    debug!(error = %error, "dashboard poll failed, keeping stale board");
                }
            }
        }
    });
}

/// Stop the board poll.
pub fn stop_dashboard_poll(registry: &PollerRegistry) {
    registry.cancel(DASHBOARD_POLL_KEY);
}

/// Whether an order has been waiting long enough to flag.
pub fn is_overdue(created_at: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(created) => {
            now.signed_duration_since(created.with_timezone(&Utc))
                >= ChronoDuration::minutes(OVERDUE_AFTER_MINUTES)
        }
        Err(_) => false,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_record, FakeBackend};
    use tokio::time::sleep;

    fn board_with_all_statuses() -> Dashboard {
        let board = Dashboard::new();
        board.replace(vec![
            sample_record(1, "Kiosk-01", OrderStatus::Received),
            sample_record(2, "Kiosk-01", OrderStatus::Preparing),
            sample_record(3, "Kiosk-01", OrderStatus::Ready),
            sample_record(4, "Kiosk-01", OrderStatus::Completed),
            sample_record(5, "Kiosk-02", OrderStatus::Ready),
        ]);
        board
    }

    #[test]
    fn test_visible_orders_filters_station_and_status() {
        let board = board_with_all_statuses();

        let mine = board.visible_orders("Kiosk-01", None);
        assert_eq!(mine.len(), 4);
        assert_eq!(
            mine.iter().map(|o| o.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4],
            "input order is stable"
        );

        let ready = board.visible_orders("Kiosk-01", Some(OrderStatus::Ready));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, 3);
    }

    #[tokio::test]
    async fn test_update_status_applies_optimistically() {
        let board = board_with_all_statuses();
        let backend = FakeBackend::new();

        board
            .update_status(&backend, 1, OrderStatus::Preparing)
            .await
            .expect("update");
        assert_eq!(board.orders()[0].order.status, OrderStatus::Preparing);
        assert_eq!(
            backend.patched.lock().unwrap().as_slice(),
            &[(1, OrderStatus::Preparing)]
        );
    }

    #[tokio::test]
    async fn test_update_status_failure_restores_pre_mutation_snapshot() {
        let board = board_with_all_statuses();
        let backend = FakeBackend::new();
        backend
            .patch_script
            .lock()
            .unwrap()
            .push_back(Err("HTTP 503".to_string()));

        let err = board
            .update_status(&backend, 2, OrderStatus::Ready)
            .await
            .expect_err("update should fail");
        assert!(err.contains("HTTP 503"));

        // Rolled back to the status held before the optimistic write
        let order = board.orders().into_iter().find(|o| o.id == 2).unwrap();
        assert_eq!(order.order.status, OrderStatus::Preparing);
    }

    #[tokio::test]
    async fn test_update_status_unknown_order_is_an_error() {
        let board = Dashboard::new();
        let backend = FakeBackend::new();
        assert!(board
            .update_status(&backend, 99, OrderStatus::Ready)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_completing_removes_from_board_even_on_failure() {
        let board = board_with_all_statuses();
        let backend = FakeBackend::new();
        backend
            .patch_script
            .lock()
            .unwrap()
            .push_back(Err("HTTP 500".to_string()));

        let result = board.update_status(&backend, 3, OrderStatus::Completed).await;
        assert!(result.is_err());
        assert!(board.orders().iter().all(|o| o.id != 3));
    }

    #[tokio::test]
    async fn test_complete_order_prefers_delete() {
        let board = board_with_all_statuses();
        let backend = FakeBackend::new();

        let path = board.complete_order(&backend, 3).await.expect("complete");
        assert_eq!(path, CompletionPath::Deleted);
        assert_eq!(backend.deleted.lock().unwrap().as_slice(), &[3]);
        assert!(board.orders().iter().all(|o| o.id != 3));
    }

    #[tokio::test]
    async fn test_complete_order_falls_back_to_status_update() {
        let board = board_with_all_statuses();
        let backend = FakeBackend::new();
        backend
            .delete_script
            .lock()
            .unwrap()
            .push_back(Err("HTTP 405".to_string()));

        let path = board.complete_order(&backend, 3).await.expect("complete");
        assert_eq!(path, CompletionPath::MarkedCompleted);
        assert_eq!(
            backend.patched.lock().unwrap().as_slice(),
            &[(3, OrderStatus::Completed)]
        );
        assert!(board.orders().iter().all(|o| o.id != 3));
    }

    #[tokio::test]
    async fn test_complete_order_removes_locally_when_both_paths_fail() {
        let board = board_with_all_statuses();
        let backend = FakeBackend::new();
        backend
            .delete_script
            .lock()
            .unwrap()
            .push_back(Err("HTTP 405".to_string()));
        backend
            .patch_script
            .lock()
            .unwrap()
            .push_back(Err("HTTP 503".to_string()));

        assert!(board.complete_order(&backend, 3).await.is_err());
        assert!(board.orders().iter().all(|o| o.id != 3));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_board() {
        let board = board_with_all_statuses();
        let backend = FakeBackend::new();
        *backend.orders.lock().unwrap() = Err("Cannot reach the backend".to_string());

        board.refresh(&backend).await;
        assert_eq!(board.orders().len(), 5);
    }

    #[tokio::test]
    async fn test_dashboard_poll_populates_board() {
        let registry = PollerRegistry::new();
        let board = Arc::new(Dashboard::new());
        let backend = Arc::new(FakeBackend::new());
        *backend.orders.lock().unwrap() =
            Ok(vec![sample_record(1, "Kiosk-01", OrderStatus::Received)]);

        start_dashboard_poll(&registry, board.clone(), backend, Duration::from_millis(10));
        sleep(Duration::from_millis(40)).await;
        assert_eq!(board.orders().len(), 1);

        stop_dashboard_poll(&registry);
        assert!(!registry.is_active("dashboard"));
    }

    #[test]
    fn test_is_overdue_threshold() {
        let now = Utc::now();
        let nine_min_ago = (now - ChronoDuration::minutes(9)).to_rfc3339();
        let three_min_ago = (now - ChronoDuration::minutes(3)).to_rfc3339();

        assert!(is_overdue(&nine_min_ago, now));
        assert!(!is_overdue(&three_min_ago, now));
        assert!(!is_overdue("not a timestamp", now));
    }
}
