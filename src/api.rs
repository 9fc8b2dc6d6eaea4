//! Backend order-store API client.
//!
//! The backend owns all real state (menu, orders) behind a REST contract
//! with JSON bodies and numeric ids. [`KioskBackend`] abstracts the calls
//! the engine makes so the submission and polling logic can be exercised
//! against a scripted double; [`HttpBackend`] is the reqwest implementation.

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config;
use crate::db::DbState;
use crate::models::{MenuItem, OrderPayload, OrderRecord, OrderStatus};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - strip surrounding whitespace and trailing slashes
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_backend_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the backend at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid backend URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        404 => "Backend endpoint not found".to_string(),
        s if s >= 500 => format!("Backend server error (HTTP {s})"),
        s => format!("Unexpected response from backend (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// The REST calls the kiosk engine makes against the backend order store.
///
/// All submission, polling, and dashboard code is generic over this trait;
/// tests drive it with an in-memory double that scripts failures.
pub trait KioskBackend: Send + Sync {
    /// `GET /menu` — the full menu catalog.
    fn fetch_menu(&self) -> impl Future<Output = Result<Vec<MenuItem>, String>> + Send;

    /// `POST /orders` — create an order; returns the backend-assigned id.
    fn create_order(&self, payload: &OrderPayload)
        -> impl Future<Output = Result<i64, String>> + Send;

    /// `GET /orders?_sort=createdAt&_order=desc` — the active order list.
    fn list_orders(&self) -> impl Future<Output = Result<Vec<OrderRecord>, String>> + Send;

    /// `GET /orders/{id}` — one order with its current status.
    fn get_order(&self, id: i64) -> impl Future<Output = Result<OrderRecord, String>> + Send;

    /// `PATCH /orders/{id}` with `{"status": ...}`.
    fn update_order_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> impl Future<Output = Result<(), String>> + Send;

    /// `DELETE /orders/{id}` — the primary "mark completed" path.
    fn delete_order(&self, id: i64) -> impl Future<Output = Result<(), String>> + Send;

    /// Lightweight connectivity probe. Failure is an answer, not an error.
    fn ping(&self) -> impl Future<Output = bool> + Send;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// reqwest-backed [`KioskBackend`] speaking to the configured base URL.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;
        Ok(Self {
            base_url: normalize_backend_url(base_url),
            client,
        })
    }

    /// Build a client from the station configuration.
    pub fn from_config(db: &DbState) -> Result<Self, String> {
        let url = config::backend_url(db)
            .ok_or("Station not configured: missing backend URL")?;
        Self::new(&url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request against the backend. `path` includes the leading
    /// slash, e.g. `/orders/3`. Returns the JSON body, or `Value::Null`
    /// for empty responses.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, String> {
        let full_url = format!("{}{}", self.base_url, path);

        let mut req = self
            .client
            .request(method, &full_url)
            .header("Content-Type", "application/json");
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();

        if !status.is_success() {
            // Preserve any error detail the backend sent for diagnostics.
            let body_text = resp.text().await.unwrap_or_default();
            let detail = if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
                json.get("error")
                    .or_else(|| json.get("message"))
                    .and_then(Value::as_str)
                    .map(|s| format!("{s} (HTTP {})", status.as_u16()))
                    .unwrap_or_else(|| format!("{} (HTTP {})", status_error(status), status.as_u16()))
            } else if !body_text.trim().is_empty() {
                format!(
                    "{} (HTTP {}): {}",
                    status_error(status),
                    status.as_u16(),
                    body_text.trim()
                )
            } else {
                format!("{} (HTTP {})", status_error(status), status.as_u16())
            };
            return Err(detail);
        }

        let body_text = resp.text().await.unwrap_or_default();
        if body_text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text).map_err(|e| format!("Invalid JSON from backend: {e}"))
    }
}

/// Pull a numeric id out of a create/read response, tolerating backends
/// that return it as a string.
fn extract_order_id(resp: &Value) -> Option<i64> {
    let id = resp.get("id")?;
    id.as_i64()
        .or_else(|| id.as_str().and_then(|s| s.trim().parse().ok()))
}

impl KioskBackend for HttpBackend {
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, String> {
        let raw = self.request(Method::GET, "/menu", None).await?;
        let rows = match raw {
            Value::Array(rows) => rows,
            other => return Err(format!("Menu response is not an array: {other}")),
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<MenuItem>(row) {
                Ok(item) => items.push(item),
                Err(e) => warn!("skipping malformed menu item: {e}"),
            }
        }
        Ok(items)
    }

    async fn create_order(&self, payload: &OrderPayload) -> Result<i64, String> {
        let body = serde_json::to_value(payload)
            .map_err(|e| format!("serialize order payload: {e}"))?;
        let resp = self.request(Method::POST, "/orders", Some(&body)).await?;
        extract_order_id(&resp).ok_or_else(|| "Order create response missing id".to_string())
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>, String> {
        let raw = self
            .request(Method::GET, "/orders?_sort=createdAt&_order=desc", None)
            .await?;
        let rows = match raw {
            Value::Array(rows) => rows,
            other => return Err(format!("Order list response is not an array: {other}")),
        };

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<OrderRecord>(row) {
                Ok(order) => orders.push(order),
                Err(e) => warn!("skipping malformed order row: {e}"),
            }
        }
        Ok(orders)
    }

    async fn get_order(&self, id: i64) -> Result<OrderRecord, String> {
        let resp = self
            .request(Method::GET, &format!("/orders/{id}"), None)
            .await?;
        serde_json::from_value(resp).map_err(|e| format!("parse order {id}: {e}"))
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<(), String> {
        let body = serde_json::json!({ "status": status });
        self.request(Method::PATCH, &format!("/orders/{id}"), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_order(&self, id: i64) -> Result<(), String> {
        self.request(Method::DELETE, &format!("/orders/{id}"), None)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        let client = match Client::builder().timeout(PROBE_TIMEOUT).build() {
            Ok(c) => c,
            Err(_) => return false,
        };
        let url = format!("{}/menu", self.base_url);
        match client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "connectivity probe failed");
                false
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
