//! Shopping cart engine for a storefront.
//!
//! The cart keeps its line items locally, mirrors every change to a commerce
//! backend over HTTP and reconciles with a full fetch afterwards. State is
//! persisted through a cookie jar whose storage can be swapped between
//! memory, a JSON file and SQLite.
//!
//! ```rust,no_run
//! use storefront_cart::cart::{self, CartItem};
//! use storefront_cart::config::CartConfig;
//! use storefront_cart::cookies::DefaultCookieJar;
//!
//! # async fn run() -> Result<(), storefront_cart::errors::CartError> {
//! let config = CartConfig::default();
//! let (cart, _worker) = cart::start(&config, DefaultCookieJar::new().into())?;
//!
//! cart.add_item(CartItem::new("1", "Raptor Grip", 250.0, 1)).await?;
//! let checkout_url = cart.checkout().await?;
//! # Ok(()) }
//! ```

pub mod backend;
pub mod cart;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod events;
pub mod net;
pub mod persistence;

pub use cart::{CartHandle, CartItem, CartState};
pub use config::CartConfig;
pub use errors::{BackendError, CartError};
pub use events::CartEvent;
