//! Ordering kiosk engine.
//!
//! Headless core for a restaurant self-service kiosk and its companion
//! kitchen dashboard: menu catalog caching with a last-known-good fallback,
//! a persisted cart, offline-tolerant order submission backed by a local
//! outbox that drains on explicit sync, customer-facing order-status
//! polling, and the kitchen order board with optimistic staff updates.
//!
//! Everything that must survive a reload lives in a local SQLite database
//! ([`db`]); the backend order/menu store is reached over its REST API
//! through the [`api::KioskBackend`] seam. The engine never dies on backend
//! unavailability — features degrade (cached menu, queued orders, stale
//! board) instead.

use std::path::Path;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod cart;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod menu;
pub mod models;
pub mod poll;
pub mod sync;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{HttpBackend, KioskBackend};
pub use cart::Cart;
pub use db::DbState;
pub use models::{
    CartLine, MenuItem, Modifier, OrderPayload, OrderRecord, OrderStatus, OutboxEntry,
};
pub use poll::PollerRegistry;

/// Initialize structured logging (console + daily rolling file).
///
/// Call once at process start; a second call panics because the global
/// subscriber is already set.
pub fn init_logging(log_dir: &Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,orderkiosk=debug"));

    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "kiosk");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the process — dropping it
    // flushes and stops the background log writer.
    std::mem::forget(guard);

    info!("orderkiosk v{} logging initialized", env!("CARGO_PKG_VERSION"));
}
