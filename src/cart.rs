//! Cart aggregate.
//!
//! An ordered list of cart lines plus the derived total. Line identity is
//! the `_uid`: menu item id, sorted selected modifier ids, and a millisecond
//! nonce taken at creation. Adding the same configuration under the same
//! uid merges quantities; under a fresh nonce it stays a separate line.
//! The cart snapshot persists wholesale to a local state slot so it
//! survives a reload.

use chrono::Utc;
use tracing::warn;

use crate::db::{self, DbState};
use crate::models::{CartLine, MenuItem, Modifier, OrderPayload, OrderStatus};

const CART_SLOT: &str = "cart";

// ---------------------------------------------------------------------------
// Line construction
// ---------------------------------------------------------------------------

/// Line identity: `{item id}::{sorted modifier ids joined by '|'}::{nonce}`.
pub fn line_uid(item_id: i64, modifier_ids: &[i64], nonce_ms: i64) -> String {
    let mut ids = modifier_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join("|");
    format!("{item_id}::{joined}::{nonce_ms}")
}

/// (unit price + sum of modifier prices) * qty.
pub fn line_total(unit_price: f64, modifiers: &[Modifier], qty: u32) -> f64 {
    let modifier_cost: f64 = modifiers.iter().map(|m| m.price).sum();
    (unit_price + modifier_cost) * f64::from(qty)
}

/// Build a cart line from a menu item and the chosen modifier ids.
/// Quantity is clamped to at least 1; unknown modifier ids are ignored.
pub fn build_line(
    item: &MenuItem,
    selected_modifier_ids: &[i64],
    qty: u32,
    nonce_ms: i64,
) -> CartLine {
    let qty = qty.max(1);
    let selected: Vec<Modifier> = item
        .modifiers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|m| selected_modifier_ids.contains(&m.id))
        .cloned()
        .collect();

    CartLine {
        uid: line_uid(item.id, selected_modifier_ids, nonce_ms),
        id: item.id,
        name: item.name.clone(),
        image: item.image.clone(),
        price: item.price,
        qty,
        total_price: line_total(item.price, &selected, qty),
        modifiers: selected,
    }
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a line. An existing line with the same uid absorbs the quantity
    /// (line total recomputed); otherwise the line is appended.
    pub fn add_line(&mut self, line: CartLine) {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.uid == line.uid) {
            existing.qty += line.qty;
            existing.total_price = line_total(existing.price, &existing.modifiers, existing.qty);
            return;
        }
        self.lines.push(line);
    }

    /// Set a line's quantity, clamped to at least 1. Unknown uid is a no-op;
    /// the cart length never changes here.
    pub fn update_qty(&mut self, uid: &str, qty: u32) {
        let qty = qty.max(1);
        if let Some(line) = self.lines.iter_mut().find(|l| l.uid == uid) {
            line.qty = qty;
            line.total_price = line_total(line.price, &line.modifiers, qty);
        }
    }

    /// Remove the line with this uid, leaving all others in order.
    pub fn remove_line(&mut self, uid: &str) {
        self.lines.retain(|l| l.uid != uid);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Cart total, recomputed from each line's components.
    pub fn total(&self) -> f64 {
        self.lines
            .iter()
            .map(|l| line_total(l.price, &l.modifiers, l.qty))
            .sum()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load the persisted cart snapshot. Corruption reads as an empty cart.
    pub fn load(db: &DbState) -> Self {
        match db::read_slot(db, CART_SLOT) {
            Some(v) => match serde_json::from_value::<Vec<CartLine>>(v) {
                Ok(lines) => Self { lines },
                Err(e) => {
                    warn!("persisted cart parse error, starting empty: {e}");
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// Persist the cart snapshot wholesale.
    pub fn save(&self, db: &DbState) -> Result<(), String> {
        let v = serde_json::to_value(&self.lines).map_err(|e| format!("serialize cart: {e}"))?;
        db::write_slot(db, CART_SLOT, &v)
    }
}

/// Snapshot the cart into an order payload for submission.
pub fn build_order_payload(cart: &Cart, station: &str) -> OrderPayload {
    OrderPayload {
        items: cart.lines.clone(),
        total: cart.total(),
        status: OrderStatus::Received,
        created_at: Utc::now().to_rfc3339(),
        table: station.to_string(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db_state;
    use crate::test_support::sample_menu;

    fn burger_line(nonce: i64, qty: u32) -> CartLine {
        let menu = sample_menu();
        build_line(&menu[0], &[1], qty, nonce)
    }

    #[test]
    fn test_line_uid_sorts_modifier_ids() {
        assert_eq!(line_uid(3, &[4, 1], 99), "3::1|4::99");
        assert_eq!(line_uid(3, &[1, 4], 99), "3::1|4::99");
        assert_eq!(line_uid(3, &[], 99), "3::::99");
    }

    #[test]
    fn test_distinct_nonces_append_identical_uid_merges() {
        let mut cart = Cart::new();
        cart.add_line(burger_line(1, 1));
        cart.add_line(burger_line(2, 1));
        cart.add_line(burger_line(3, 1));
        assert_eq!(cart.len(), 3);

        // Same uid -> quantities merge instead of appending
        cart.add_line(burger_line(1, 2));
        assert_eq!(cart.len(), 3);
        assert_eq!(cart.lines()[0].qty, 3);
        assert_eq!(cart.lines()[0].total_price, (100.0 + 20.0) * 3.0);
    }

    #[test]
    fn test_update_qty_clamps_and_keeps_length() {
        let mut cart = Cart::new();
        cart.add_line(burger_line(1, 2));
        cart.update_qty("1::1::1", 0);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].qty, 1);

        cart.update_qty("1::1::1", 5);
        assert_eq!(cart.lines()[0].qty, 5);
        assert_eq!(cart.len(), 1);

        // Unknown uid is a no-op
        cart.update_qty("9::::9", 7);
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_remove_line_is_order_preserving() {
        let mut cart = Cart::new();
        cart.add_line(burger_line(1, 1));
        cart.add_line(burger_line(2, 1));
        cart.add_line(burger_line(3, 1));

        cart.remove_line("1::1::2");
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.lines()[0].uid, "1::1::1");
        assert_eq!(cart.lines()[1].uid, "1::1::3");
    }

    #[test]
    fn test_line_total_price_100_modifier_20_qty_3_is_360() {
        let line = burger_line(1, 3);
        assert_eq!(line.total_price, 360.0);

        let mut cart = Cart::new();
        cart.add_line(line);
        assert_eq!(cart.total(), 360.0);
    }

    #[test]
    fn test_build_line_clamps_qty_and_ignores_unknown_modifiers() {
        let menu = sample_menu();
        let line = build_line(&menu[0], &[1, 99], 0, 7);
        assert_eq!(line.qty, 1);
        assert_eq!(line.modifiers.len(), 1);
        assert_eq!(line.modifiers[0].id, 1);
    }

    #[test]
    fn test_cart_persistence_roundtrip() {
        let db = test_db_state();
        let mut cart = Cart::new();
        cart.add_line(burger_line(1, 2));
        cart.save(&db).expect("save cart");

        let loaded = Cart::load(&db);
        assert_eq!(loaded, cart);

        cart.clear();
        cart.save(&db).expect("save cleared cart");
        assert!(Cart::load(&db).is_empty());
    }

    #[test]
    fn test_order_payload_snapshots_cart() {
        let mut cart = Cart::new();
        cart.add_line(burger_line(1, 3));
        let payload = build_order_payload(&cart, "Kiosk-01");
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.total, 360.0);
        assert_eq!(payload.status, OrderStatus::Received);
        assert_eq!(payload.table, "Kiosk-01");
    }
}
