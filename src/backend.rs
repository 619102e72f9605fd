//! The commerce backend the cart mirrors itself to.
//!
//! [`CartBackend`] is the seam between the cart engine and the network. The
//! engine only ever talks to a `dyn CartBackend`; [`HttpCartBackend`] is the
//! production implementation speaking the storefront's JSON API over reqwest.

mod client;
#[cfg(test)]
pub(crate) mod recording;
pub(crate) mod wire;

pub use client::HttpCartBackend;

use crate::cart::item::{CartItem, ProductId};
use crate::errors::BackendError;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// What a full cart fetch returned.
///
/// `items` is `None` when the backend answered without an item list; the
/// local items are then left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartSnapshot {
    pub cart_id: Option<String>,
    pub items: Option<Vec<CartItem>>,
}

/// Acknowledgement of a mirror call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorAck {
    pub cart_id: Option<String>,
}

#[async_trait]
pub trait CartBackend: Send + Sync {
    /// `GET cart/current/`
    async fn fetch_cart(&self) -> Result<CartSnapshot, BackendError>;

    /// `POST cart/add_item/`
    async fn add_item(&self, product_id: &ProductId, quantity: u32) -> Result<MirrorAck, BackendError>;

    /// `POST cart/remove_item/`
    async fn remove_item(&self, product_id: &ProductId) -> Result<MirrorAck, BackendError>;

    /// `POST cart/update_item/`
    async fn update_item(&self, product_id: &ProductId, quantity: u32) -> Result<MirrorAck, BackendError>;

    /// `POST cart/clear/`
    async fn clear(&self) -> Result<MirrorAck, BackendError>;

    /// `POST cart/create_checkout_session/`, returns the payment page URL.
    async fn create_checkout_session(&self, success_url: &Url, cancel_url: &Url) -> Result<Url, BackendError>;
}

pub type CartBackendHandle = Arc<dyn CartBackend>;
