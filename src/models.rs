//! Wire types shared between the kiosk, the kitchen dashboard, and the
//! backend order store.
//!
//! Field names follow the backend's JSON contract (camelCase, with the
//! cart line's `_uid` discriminator), so these types serialize to exactly
//! what `POST /orders` and `GET /orders` carry.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

/// Lifecycle of an order as the kitchen advances it. Statuses only move
/// forward; `ready` and `completed` are terminal for the customer-facing
/// poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Received,
    Preparing,
    Ready,
    Completed,
}

impl OrderStatus {
    /// Statuses after which the customer-facing poller stops.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Ready | OrderStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Menu catalog
// ---------------------------------------------------------------------------

/// Optional add-on for a menu item. The price is a non-negative delta on
/// top of the item's unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

/// One entry of the menu catalog. Immutable within a session; the whole
/// catalog is replaced on a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Vec<Modifier>>,
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// One line of the cart: a menu item plus the chosen modifier set and
/// quantity. `uid` embeds the sorted modifier ids and a millisecond nonce,
/// so it identifies the (item, modifier-set) combination per addition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(rename = "_uid")]
    pub uid: String,
    /// Menu item id this line was built from.
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Unit price of the item, before modifiers.
    pub price: f64,
    pub qty: u32,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    /// (price + sum of modifier prices) * qty, kept current on every
    /// quantity change.
    pub total_price: f64,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Snapshot of the cart taken at checkout. Once the backend accepts it,
/// the backend owns the order and is authoritative for its status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub items: Vec<CartLine>,
    pub total: f64,
    pub status: OrderStatus,
    pub created_at: String,
    /// Origin label of the kiosk station that placed the order.
    pub table: String,
}

/// An order as the backend returns it: payload plus the server-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: i64,
    #[serde(flatten)]
    pub order: OrderPayload,
}

/// A locally queued order that failed remote submission. Persisted until a
/// later sync succeeds for this entry; never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    /// Locally generated identifier (enqueue time in unix milliseconds).
    #[serde(rename = "_tempId")]
    pub temp_id: i64,
    #[serde(flatten)]
    pub order: OrderPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line() -> CartLine {
        CartLine {
            uid: "3::1|4::1700000000000".to_string(),
            id: 3,
            name: "Veggie Burger".to_string(),
            image: Some("/images/burger.png".to_string()),
            price: 100.0,
            qty: 3,
            modifiers: vec![Modifier {
                id: 1,
                name: "Extra Cheese".to_string(),
                price: 20.0,
            }],
            total_price: 360.0,
        }
    }

    #[test]
    fn test_cart_line_wire_format() {
        let v = serde_json::to_value(sample_line()).expect("serialize cart line");
        assert_eq!(v["_uid"], "3::1|4::1700000000000");
        assert_eq!(v["totalPrice"], 360.0);
        assert_eq!(v["qty"], 3);
        assert_eq!(v["modifiers"][0]["price"], 20.0);
    }

    #[test]
    fn test_order_status_wire_values() {
        for (status, wire) in [
            (OrderStatus::Received, "\"received\""),
            (OrderStatus::Preparing, "\"preparing\""),
            (OrderStatus::Ready, "\"ready\""),
            (OrderStatus::Completed, "\"completed\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), wire);
        }
        assert!(OrderStatus::Ready.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Preparing.is_terminal());
    }

    #[test]
    fn test_status_ordering_is_monotonic() {
        assert!(OrderStatus::Received < OrderStatus::Preparing);
        assert!(OrderStatus::Preparing < OrderStatus::Ready);
        assert!(OrderStatus::Ready < OrderStatus::Completed);
    }

    #[test]
    fn test_order_record_flattens_payload() {
        let raw = serde_json::json!({
            "id": 17,
            "items": [],
            "total": 0.0,
            "status": "received",
            "createdAt": "2026-08-06T10:00:00Z",
            "table": "Kiosk-01"
        });
        let rec: OrderRecord = serde_json::from_value(raw).expect("parse order record");
        assert_eq!(rec.id, 17);
        assert_eq!(rec.order.status, OrderStatus::Received);
        assert_eq!(rec.order.table, "Kiosk-01");

        let back = serde_json::to_value(&rec).expect("serialize order record");
        assert_eq!(back["id"], 17);
        assert_eq!(back["createdAt"], "2026-08-06T10:00:00Z");
    }
}
