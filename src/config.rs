//! Station configuration.
//!
//! A kiosk station is identified by a fixed origin label (used to scope
//! "my orders" views on the dashboard) and talks to one backend URL. Both
//! live in the `local_settings` table.

use tracing::info;

use crate::api;
use crate::db::{self, DbState};

const CATEGORY: &str = "station";
const KEY_BACKEND_URL: &str = "backend_url";
const KEY_STATION_ID: &str = "station_id";

/// Origin label used when no station id has been configured.
pub const DEFAULT_STATION_ID: &str = "Kiosk-01";

/// Backend base URL, if configured.
pub fn backend_url(db: &DbState) -> Option<String> {
    db::setting_get(db, CATEGORY, KEY_BACKEND_URL)
}

/// Store the backend base URL (normalized).
pub fn set_backend_url(db: &DbState, url: &str) -> Result<(), String> {
    let normalized = api::normalize_backend_url(url);
    if normalized.is_empty() {
        return Err("Backend URL must not be empty".to_string());
    }
    db::setting_set(db, CATEGORY, KEY_BACKEND_URL, &normalized)?;
    info!(backend_url = %normalized, "backend URL updated");
    Ok(())
}

/// Origin label of this station. Falls back to [`DEFAULT_STATION_ID`].
pub fn station_id(db: &DbState) -> String {
    db::setting_get(db, CATEGORY, KEY_STATION_ID)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STATION_ID.to_string())
}

/// Store the station origin label.
pub fn set_station_id(db: &DbState, id: &str) -> Result<(), String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err("Station id must not be empty".to_string());
    }
    db::setting_set(db, CATEGORY, KEY_STATION_ID, trimmed)?;
    info!(station_id = %trimmed, "station id updated");
    Ok(())
}

/// The station is considered configured once it knows its backend URL.
pub fn is_configured(db: &DbState) -> bool {
    backend_url(db).is_some()
}

// ===========================================================================
// Tests
// ===========================================================================
