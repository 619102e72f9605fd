use crate::cart::item::CartItem;
use serde::{Deserialize, Serialize};

/// Everything the cart knows about itself.
///
/// Totals are derived on demand from `items`; nothing here can drift out of
/// sync with the line items. Field names follow the persisted client format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartState {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default)]
    pub cart_id: Option<String>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Merges `item` into the cart: an existing id has its quantity increased,
    /// a new id is appended. Items with a zero quantity or a price that is
    /// negative or not a number are ignored.
    ///
    /// Returns `false` when nothing changed.
    pub fn add_item(&mut self, item: CartItem) -> bool {
        if item.quantity == 0 || item.price.is_nan() || item.price < 0.0 {
            return false;
        }

        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
        true
    }

    /// Returns `false` when `id` was not in the cart.
    pub fn remove_item(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Sets the quantity of `id` directly. A zero quantity removes the line.
    ///
    /// Returns `false` when `id` was not in the cart.
    pub fn set_quantity(&mut self, id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_item(id);
        }
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn replace_items(&mut self, items: Vec<CartItem>) {
        self.items = items;
    }

    pub fn open(&mut self) {
        self.is_open = true;
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn toggle(&mut self) {
        self.is_open = !self.is_open;
    }

    /// Sum of all quantities.
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of `price * quantity` over all lines.
    pub fn total_price(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }
}
