//! Scripted in-memory backend double shared by the module tests.
//!
//! Each call pops the next scripted result for its endpoint; an empty
//! script defaults to success so tests only spell out the failures they
//! care about.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::api::KioskBackend;
use crate::models::{MenuItem, Modifier, OrderPayload, OrderRecord, OrderStatus};

pub(crate) struct FakeBackend {
    pub menu: Mutex<Result<Vec<MenuItem>, String>>,
    /// Per-call results for `create_order`; empty means `Ok(1)`.
    pub create_script: Mutex<VecDeque<Result<i64, String>>>,
    pub created: Mutex<Vec<OrderPayload>>,
    pub create_calls: AtomicUsize,
    pub orders: Mutex<Result<Vec<OrderRecord>, String>>,
    /// Per-call statuses for `get_order`; the final entry repeats forever.
    pub status_script: Mutex<VecDeque<Result<OrderStatus, String>>>,
    /// Per-call results for `update_order_status`; empty means `Ok(())`.
    pub patch_script: Mutex<VecDeque<Result<(), String>>>,
    pub patched: Mutex<Vec<(i64, OrderStatus)>>,
    /// Per-call results for `delete_order`; empty means `Ok(())`.
    pub delete_script: Mutex<VecDeque<Result<(), String>>>,
    pub deleted: Mutex<Vec<i64>>,
    pub online: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            menu: Mutex::new(Ok(Vec::new())),
            create_script: Mutex::new(VecDeque::new()),
            created: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            orders: Mutex::new(Ok(Vec::new())),
            status_script: Mutex::new(VecDeque::new()),
            patch_script: Mutex::new(VecDeque::new()),
            patched: Mutex::new(Vec::new()),
            delete_script: Mutex::new(VecDeque::new()),
            deleted: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
        }
    }

    pub fn script_create(&self, result: Result<i64, String>) {
        self.create_script.lock().unwrap().push_back(result);
    }

    pub fn script_status(&self, result: Result<OrderStatus, String>) {
        self.status_script.lock().unwrap().push_back(result);
    }
}

impl KioskBackend for FakeBackend {
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, String> {
        self.menu.lock().unwrap().clone()
    }

    async fn create_order(&self, payload: &OrderPayload) -> Result<i64, String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .create_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(1));
        if result.is_ok() {
            self.created.lock().unwrap().push(payload.clone());
        }
        result
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>, String> {
        self.orders.lock().unwrap().clone()
    }

    async fn get_order(&self, id: i64) -> Result<OrderRecord, String> {
        let mut script = self.status_script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(status)) => Ok(OrderRecord {
                id,
                order: sample_payload_with_status("Kiosk-01", status),
            }),
            Some(Err(e)) => Err(e),
            None => Err("no scripted status".to_string()),
        }
    }

    async fn update_order_status(&self, id: i64, status: OrderStatus) -> Result<(), String> {
        let result = self
            .patch_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.patched.lock().unwrap().push((id, status));
        }
        result
    }

    async fn delete_order(&self, id: i64) -> Result<(), String> {
        let result = self
            .delete_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.deleted.lock().unwrap().push(id);
        }
        result
    }

    async fn ping(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub(crate) fn sample_menu() -> Vec<MenuItem> {
    vec![
        MenuItem {
            id: 1,
            name: "Classic Burger".to_string(),
            category: "Burgers".to_string(),
            price: 100.0,
            image: Some("/images/burger.png".to_string()),
            modifiers: Some(vec![
                Modifier {
                    id: 1,
                    name: "Extra Cheese".to_string(),
                    price: 20.0,
                },
                Modifier {
                    id: 2,
                    name: "Bacon".to_string(),
                    price: 35.0,
                },
            ]),
        },
        MenuItem {
            id: 2,
            name: "Margherita".to_string(),
            category: "Pizza".to_string(),
            price: 250.0,
            image: None,
            modifiers: None,
        },
        MenuItem {
            id: 3,
            name: "Cola".to_string(),
            category: "Drinks".to_string(),
            price: 40.0,
            image: None,
            modifiers: None,
        },
    ]
}

pub(crate) fn sample_payload(table: &str) -> OrderPayload {
    sample_payload_with_status(table, OrderStatus::Received)
}

pub(crate) fn sample_payload_with_status(table: &str, status: OrderStatus) -> OrderPayload {
    OrderPayload {
        items: Vec::new(),
        total: 0.0,
        status,
        created_at: "2026-08-06T10:00:00+00:00".to_string(),
        table: table.to_string(),
    }
}

pub(crate) fn sample_record(id: i64, table: &str, status: OrderStatus) -> OrderRecord {
    OrderRecord {
        id,
        order: sample_payload_with_status(table, status),
    }
}
