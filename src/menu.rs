//! Menu catalog cache.
//!
//! The catalog is fetched once per session. A successful fetch replaces the
//! in-memory catalog wholesale and persists a copy as the last-known-good
//! fallback; a failed fetch falls back to that copy, and an empty catalog is
//! the worst case — never an error.

use tracing::{error, info, warn};

use crate::api::KioskBackend;
use crate::db::{self, DbState};
use crate::models::MenuItem;

const MENU_SLOT: &str = "menu";

/// Fetch the catalog from the backend, caching it locally on success and
/// falling back to the cached copy on failure. One-shot: no periodic
/// refresh.
pub async fn load_catalog<B: KioskBackend>(db: &DbState, backend: &B) -> Vec<MenuItem> {
    match backend.fetch_menu().await {
        Ok(items) => {
            match serde_json::to_value(&items) {
                Ok(v) => {
                    if let Err(e) = db::write_slot(db, MENU_SLOT, &v) {
                        warn!("menu cache write failed: {e}");
                    }
                }
                Err(e) => warn!("menu cache serialize failed: {e}"),
            }
            info!(items = items.len(), "menu catalog refreshed from backend");
            items
        }
        Err(error) => {
            warn!(error = %error, "menu fetch failed, falling back to cached copy");
            cached_menu(db)
        }
    }
}

/// Read the last-known-good catalog copy. Empty on miss or corruption.
pub fn cached_menu(db: &DbState) -> Vec<MenuItem> {
    match db::read_slot(db, MENU_SLOT) {
        Some(v) => match serde_json::from_value::<Vec<MenuItem>>(v) {
            Ok(items) => items,
            Err(e) => {
                error!("cached menu parse error: {e}");
                Vec::new()
            }
        },
        None => Vec::new(),
    }
}

/// Distinct categories in first-appearance order.
pub fn categories(items: &[MenuItem]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.category.as_str()) {
            out.push(item.category.clone());
        }
    }
    out
}

/// Items belonging to one category, input order preserved.
pub fn items_in_category<'a>(items: &'a [MenuItem], category: &str) -> Vec<&'a MenuItem> {
    items.iter().filter(|i| i.category == category).collect()
}

// ===========================================================================
// Tests
// ===========================================================================
