//! JSON shapes exchanged with the commerce backend.

use crate::cart::item::CartItem;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct AddItemRequest<'a> {
    pub product_id: &'a str,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct RemoveItemRequest<'a> {
    pub product_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateItemRequest<'a> {
    pub product_id: &'a str,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutRequest<'a> {
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckoutResponse {
    #[serde(default)]
    pub checkout_url: Option<String>,
}

/// Any mirror response. Only the cart id is of interest.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MirrorResponse {
    #[serde(default)]
    pub cart_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CartResponse {
    #[serde(default)]
    pub cart_id: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<BackendItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackendItem {
    pub product: BackendProduct,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackendProduct {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "decimal")]
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<BackendItem> for CartItem {
    fn from(item: BackendItem) -> Self {
        let BackendProduct { id, name, price, image } = item.product;
        let mut out = CartItem::new(id, name, price, item.quantity);
        out.image = image.filter(|s| !s.is_empty());
        out
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match StringOrNumber::deserialize(d)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

// Prices come over the wire as decimal strings ("250.00")
fn decimal<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match StringOrNumber::deserialize(d)? {
        StringOrNumber::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("price out of range")),
    }
}
