use crate::errors::CartError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Which 3D model the presentation layer shows next to a line item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Grip,
    Throttle,
    Bundle,
}

/// One line of the cart. `id` is the identity key; it is unique per cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_type: Option<ModelType>,
}

impl CartItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64, quantity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
            image: None,
            variant: None,
            model_type: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = Some(model_type);
        self
    }

    /// `price * quantity` for this line.
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// A product identifier in the numeric form the backend accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Reduces a local item id to the backend's numeric product id.
    ///
    /// Purely numeric ids pass through. Composite ids such as
    /// `"1-blackCherry"` are cut down to their leading digit run. Ids with no
    /// leading digits cannot be sent to the backend.
    pub fn normalize(local_id: &str) -> Result<Self, CartError> {
        if !local_id.is_empty() && local_id.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(Self(local_id.to_string()));
        }

        let prefix_len = local_id.bytes().take_while(u8::is_ascii_digit).count();
        if prefix_len == 0 {
            log::error!("[cart] could not extract numeric product id from {local_id:?}");
            return Err(CartError::InvalidProductId(local_id.to_string()));
        }

        log::warn!("[cart] converting non-numeric product id {local_id:?} to {:?}", &local_id[..prefix_len]);
        Ok(Self(local_id[..prefix_len].to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
