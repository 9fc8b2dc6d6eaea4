//! Order submission and the offline outbox.
//!
//! `place_order` tries the backend once; a failed submission lands in the
//! persisted outbox and waits for an explicit `sync_outbox` call — there is
//! no inline retry and no background drain. The outbox is an append-only
//! table drained sequentially in FIFO order with per-entry acknowledgment:
//! each successful submit deletes exactly its own row, so a crash mid-sync
//! keeps every unacknowledged entry. Also owns the bounded previous-orders
//! history the kiosk shows the customer.

use chrono::Utc;
use rusqlite::params;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::KioskBackend;
use crate::cart::{self, Cart};
use crate::config;
use crate::db::{self, DbState};
use crate::models::{OrderPayload, OrderRecord, OutboxEntry};

const PREVIOUS_ORDERS_SLOT: &str = "previous_orders";

/// Most-recent placed orders kept for customer reference.
const HISTORY_LIMIT: usize = 10;

const SYNC_CATEGORY: &str = "sync";
const KEY_LAST_SYNC_AT: &str = "last_sync_at";

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// Result of a single submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// The backend accepted the order and assigned this id.
    Placed { id: i64 },
    /// Submission failed; the order is queued locally for a manual sync.
    QueuedOffline { temp_id: i64, pending: i64 },
}

/// Result of one outbox drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub attempted: usize,
    pub synced: usize,
    pub remaining: usize,
}

impl SyncReport {
    /// The pass only counts as a success when the outbox fully drained.
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Submit an order to the backend. Any failure — network unreachable or
/// backend rejection alike — queues the payload in the outbox and reports
/// `QueuedOffline`; the caller's cart is left untouched so the customer can
/// resubmit. Returns `Err` only for local persistence failures.
pub async fn place_order<B: KioskBackend>(
    db: &DbState,
    backend: &B,
    payload: &OrderPayload,
) -> Result<PlaceOutcome, String> {
    match backend.create_order(payload).await {
        Ok(id) => {
            stamp_last_sync(db);
            info!(order_id = id, "order placed");
            Ok(PlaceOutcome::Placed { id })
        }
        Err(error) => {
            warn!(error = %error, "order submission failed, queueing to outbox");
            let temp_id = enqueue_outbox(db, payload, &error)?;
            let pending = outbox_count(db)?;
            Ok(PlaceOutcome::QueuedOffline { temp_id, pending })
        }
    }
}

/// Checkout the cart: snapshot it into a payload and submit. On acceptance
/// the order joins the previous-orders history and the cart (in-memory and
/// persisted) is cleared; on a queued-offline outcome the cart stays as-is.
pub async fn checkout<B: KioskBackend>(
    db: &DbState,
    backend: &B,
    cart: &mut Cart,
    station: &str,
) -> Result<PlaceOutcome, String> {
    if cart.is_empty() {
        return Err("Cart is empty".to_string());
    }

    let payload = cart::build_order_payload(cart, station);
    let outcome = place_order(db, backend, &payload).await?;

    if let PlaceOutcome::Placed { id } = outcome {
        record_previous_order(db, &OrderRecord { id, order: payload })?;
        cart.clear();
        cart.save(db)?;
    }

    Ok(outcome)
}

fn enqueue_outbox(db: &DbState, payload: &OrderPayload, error: &str) -> Result<i64, String> {
    let temp_id = Utc::now().timestamp_millis();
    let json = serde_json::to_string(payload).map_err(|e| format!("serialize order: {e}"))?;
    let now = Utc::now().to_rfc3339();

    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO outbox (temp_id, payload, created_at, last_error)
         VALUES (?1, ?2, ?3, ?4)",
        params![temp_id, json, now, error],
    )
    .map_err(|e| format!("enqueue outbox: {e}"))?;
    Ok(temp_id)
}

// ---------------------------------------------------------------------------
// Outbox drain
// ---------------------------------------------------------------------------

/// Retry every queued order, sequentially and in original order — the
/// backend has no idempotency key, so concurrent submits could duplicate or
/// reorder. Each success acknowledges (deletes) exactly its own row before
/// the next entry is attempted; failures keep their row with the error
/// recorded. An empty outbox succeeds trivially with zero network calls.
pub async fn sync_outbox<B: KioskBackend>(
    db: &DbState,
    backend: &B,
) -> Result<SyncReport, String> {
    // Collect the pass under the lock, then release it before any await.
    let rows: Vec<(i64, i64, String)> = {
        let conn = db.conn.lock().map_err(|e| e.to_string())?;
        let mut stmt = conn
            .prepare("SELECT id, temp_id, payload FROM outbox ORDER BY id ASC")
            .map_err(|e| format!("prepare outbox query: {e}"))?;
        let result: Vec<_> = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| format!("query outbox: {e}"))?
            .filter_map(|r| r.ok())
            .collect();
        result
    }; // lock released here

    if rows.is_empty() {
        return Ok(SyncReport {
            attempted: 0,
            synced: 0,
            remaining: 0,
        });
    }

    let mut synced = 0usize;
    let mut remaining = 0usize;

    for (row_id, temp_id, payload_json) in rows {
        let payload: OrderPayload = match serde_json::from_str(&payload_json) {
            Ok(p) => p,
            Err(e) => {
                // Entry stays queued rather than being dropped; an operator
                // can inspect last_error.
                warn!(temp_id, "outbox entry has unreadable payload: {e}");
                record_outbox_error(db, row_id, &format!("unreadable payload: {e}"))?;
                remaining += 1;
                continue;
            }
        };

        match backend.create_order(&payload).await {
            Ok(order_id) => {
                let conn = db.conn.lock().map_err(|e| e.to_string())?;
                conn.execute("DELETE FROM outbox WHERE id = ?1", params![row_id])
                    .map_err(|e| format!("acknowledge outbox entry: {e}"))?;
                info!(temp_id, order_id, "outbox entry synced");
                synced += 1;
            }
            Err(error) => {
                warn!(temp_id, error = %error, "outbox entry still failing");
                record_outbox_error(db, row_id, &error)?;
                remaining += 1;
            }
        }
    }

    if synced > 0 {
        stamp_last_sync(db);
    }

    Ok(SyncReport {
        attempted: synced + remaining,
        synced,
        remaining,
    })
}

fn record_outbox_error(db: &DbState, row_id: i64, error: &str) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "UPDATE outbox SET last_error = ?1 WHERE id = ?2",
        params![error, row_id],
    )
    .map_err(|e| format!("record outbox error: {e}"))?;
    Ok(())
}

/// Number of orders waiting in the outbox.
pub fn outbox_count(db: &DbState) -> Result<i64, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))
        .map_err(|e| format!("count outbox: {e}"))
}

/// Queued orders in FIFO order.
pub fn pending_outbox(db: &DbState) -> Result<Vec<OutboxEntry>, String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare("SELECT temp_id, payload, last_error FROM outbox ORDER BY id ASC")
        .map_err(|e| format!("prepare outbox query: {e}"))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .map_err(|e| format!("query outbox: {e}"))?;

    let mut entries = Vec::new();
    for row in rows {
        let (temp_id, payload_json, last_error) = match row {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed outbox row: {e}");
                continue;
            }
        };
        match serde_json::from_str::<OrderPayload>(&payload_json) {
            Ok(order) => entries.push(OutboxEntry {
                temp_id,
                order,
                last_error,
            }),
            Err(e) => warn!(temp_id, "skipping unreadable outbox payload: {e}"),
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Previous-orders history
// ---------------------------------------------------------------------------

/// Prepend a placed order to the history, keeping the newest
/// `HISTORY_LIMIT` entries.
pub fn record_previous_order(db: &DbState, record: &OrderRecord) -> Result<(), String> {
    let mut history = previous_orders(db);
    history.insert(0, record.clone());
    history.truncate(HISTORY_LIMIT);

    let v = serde_json::to_value(&history).map_err(|e| format!("serialize history: {e}"))?;
    db::write_slot(db, PREVIOUS_ORDERS_SLOT, &v)
}

/// The station's own placed orders, newest first. Independent of backend
/// state; not reconciled against it.
pub fn previous_orders(db: &DbState) -> Vec<OrderRecord> {
    match db::read_slot(db, PREVIOUS_ORDERS_SLOT) {
        Some(v) => match serde_json::from_value::<Vec<OrderRecord>>(v) {
            Ok(history) => history,
            Err(e) => {
                warn!("previous orders parse error, starting empty: {e}");
                Vec::new()
            }
        },
        None => Vec::new(),
    }
}

pub fn clear_previous_orders(db: &DbState) -> Result<(), String> {
    db::clear_slot(db, PREVIOUS_ORDERS_SLOT)
}

// ---------------------------------------------------------------------------
// Status for UI badges
// ---------------------------------------------------------------------------

fn stamp_last_sync(db: &DbState) {
    if let Err(e) = db::setting_set(db, SYNC_CATEGORY, KEY_LAST_SYNC_AT, &Utc::now().to_rfc3339())
    {
        warn!("failed to stamp last sync time: {e}");
    }
}

/// Outbox statistics for the kiosk's pending-orders badge.
pub fn sync_status(db: &DbState) -> Value {
    let pending = outbox_count(db).unwrap_or(0);
    let last_sync = db::setting_get(db, SYNC_CATEGORY, KEY_LAST_SYNC_AT);
    serde_json::json!({
        "pendingItems": pending,
        "lastSyncAt": last_sync,
        "isConfigured": config::is_configured(db),
    })
}

// ===========================================================================
// Tests
// ===========================================================================
