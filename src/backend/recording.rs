//! In-process [`CartBackend`] used by the worker and handle tests.
//!
//! It keeps a tiny server-side cart so fetches reflect earlier mirror calls,
//! records every call, and can be told to fail or to hold fetches until the
//! test releases them.

use crate::backend::{CartBackend, CartSnapshot, MirrorAck};
use crate::cart::item::{CartItem, ProductId};
use crate::errors::BackendError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Fetch,
    Add(String, u32),
    Remove(String),
    Update(String, u32),
    Clear,
    Checkout { success: Url, cancel: Url },
}

pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    server: Mutex<Vec<CartItem>>,
    cart_id: String,
    pub fail_mirrors: AtomicBool,
    pub fail_fetches: AtomicBool,
    pub fail_checkout: AtomicBool,
    /// When set, each fetch waits for one permit.
    fetch_gate: Option<Arc<Semaphore>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// A backend whose fetches block until the returned semaphore hands out permits.
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Arc::new(Self::build(Some(gate.clone()))), gate)
    }

    fn build(fetch_gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            server: Mutex::new(Vec::new()),
            cart_id: "srv-cart".to_string(),
            fail_mirrors: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
            fail_checkout: AtomicBool::new(false),
            fetch_gate,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn server_items(&self) -> Vec<CartItem> {
        self.server.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn ack(&self) -> Result<MirrorAck, BackendError> {
        if self.fail_mirrors.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(MirrorAck {
            cart_id: Some(self.cart_id.clone()),
        })
    }
}

#[async_trait]
impl CartBackend for RecordingBackend {
    async fn fetch_cart(&self) -> Result<CartSnapshot, BackendError> {
        self.record(Call::Fetch);
        if let Some(gate) = &self.fetch_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(BackendError::MalformedResponse("not json".into()));
        }
        Ok(CartSnapshot {
            cart_id: Some(self.cart_id.clone()),
            items: Some(self.server_items()),
        })
    }

    async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<MirrorAck, BackendError> {
        self.record(Call::Add(product_id.to_string(), quantity));
        let ack = self.ack()?;
        let mut server = self.server.lock().unwrap();
        match server.iter_mut().find(|i| i.id == product_id.as_str()) {
            Some(item) => item.quantity += quantity,
            None => server.push(CartItem::new(product_id.as_str(), "Server Item", 10.0, quantity)),
        }
        Ok(ack)
    }

    async fn remove_item(&self, product_id: &ProductId) -> Result<MirrorAck, BackendError> {
        self.record(Call::Remove(product_id.to_string()));
        let ack = self.ack()?;
        self.server.lock().unwrap().retain(|i| i.id != product_id.as_str());
        Ok(ack)
    }

    async fn update_item(&self, product_id: &ProductId, quantity: u32) -> Result<MirrorAck, BackendError> {
        self.record(Call::Update(product_id.to_string(), quantity));
        let ack = self.ack()?;
        if let Some(item) = self.server.lock().unwrap().iter_mut().find(|i| i.id == product_id.as_str()) {
            item.quantity = quantity;
        }
        Ok(ack)
    }

    async fn clear(&self) -> Result<MirrorAck, BackendError> {
        self.record(Call::Clear);
        let ack = self.ack()?;
        self.server.lock().unwrap().clear();
        Ok(ack)
    }

    async fn create_checkout_session(&self, success_url: &Url, cancel_url: &Url) -> Result<Url, BackendError> {
        self.record(Call::Checkout {
            success: success_url.clone(),
            cancel: cancel_url.clone(),
        });
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 400,
                body: "Cart is empty".into(),
            });
        }
        Ok(Url::parse("https://checkout.stripe.com/c/pay/cs_test_123")?)
    }
}
