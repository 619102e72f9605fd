//! The cart engine: data model, store, worker and handle.

pub mod handle;
pub mod intent;
pub mod item;
pub mod state;
pub mod store;
pub mod worker;

pub use handle::CartHandle;
pub use intent::{MirrorOp, SyncIntent, SyncOutcome};
pub use item::{CartItem, ModelType, ProductId};
pub use state::CartState;
pub use store::CartStore;
pub use worker::CartWorker;

use crate::backend::HttpCartBackend;
use crate::config::CartConfig;
use crate::cookies::CookieJarHandle;
use crate::errors::CartError;
use crate::persistence::CartPersistence;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Starts a cart against the HTTP backend described by `config`.
///
/// The jar holds both the cart's own cookies and whatever the backend sets.
/// Must be called from within a tokio runtime.
pub fn start(config: &CartConfig, jar: CookieJarHandle) -> Result<(CartHandle, JoinHandle<()>), CartError> {
    let backend = HttpCartBackend::new(config, jar.clone())?;
    let persistence = CartPersistence::new(jar, config);
    Ok(CartWorker::spawn(config, persistence, Arc::new(backend)))
}
