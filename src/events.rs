//! Cart events and commands.
//!
//! - [`CartEvent`]: broadcast by the worker to every subscriber. The
//!   presentation layer re-renders on `StateChanged` and follows
//!   `CheckoutRedirect`.
//! - [`CartCommand`]: sent by a [`CartHandle`](crate::cart::CartHandle) to the
//!   worker; commands that return something carry a `oneshot` reply.

use crate::cart::item::CartItem;
use crate::cart::intent::MirrorOp;
use crate::cart::state::CartState;
use crate::errors::CartError;
use std::fmt::Display;
use tokio::sync::oneshot;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    /// Items changed; carries the fresh aggregates for badge rendering.
    StateChanged { total_items: u64, total_price: f64 },
    CartOpened,
    CartClosed,
    /// A fetch was applied.
    Synced { cart_id: Option<String> },
    /// A fetch failed; local state was kept or restored from the snapshot.
    SyncFailed { reason: String },
    /// A mirror call failed. Local state is not rolled back.
    MirrorFailed { op: MirrorOp, reason: String },
    /// A fetch result arrived after a newer change and was discarded.
    StaleSyncDropped { seq: u64 },
    CheckoutRedirect { url: Url },
    /// User-facing message of a failed checkout.
    CheckoutFailed { message: String },
}

impl Display for CartEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartEvent::StateChanged { total_items, total_price } => {
                write!(f, "StateChanged({total_items} items, {total_price:.2})")
            }
            CartEvent::CartOpened => write!(f, "CartOpened"),
            CartEvent::CartClosed => write!(f, "CartClosed"),
            CartEvent::Synced { cart_id } => write!(f, "Synced({})", cart_id.as_deref().unwrap_or("-")),
            CartEvent::SyncFailed { reason } => write!(f, "SyncFailed({reason})"),
            CartEvent::MirrorFailed { op, reason } => write!(f, "MirrorFailed({op}: {reason})"),
            CartEvent::StaleSyncDropped { seq } => write!(f, "StaleSyncDropped({seq})"),
            CartEvent::CheckoutRedirect { url } => write!(f, "CheckoutRedirect({url})"),
            CartEvent::CheckoutFailed { message } => write!(f, "CheckoutFailed({message})"),
        }
    }
}

/// Commands accepted by the cart worker.
#[derive(Debug)]
pub enum CartCommand {
    AddItem { item: CartItem },
    RemoveItem { id: String },
    UpdateQuantity { id: String, quantity: i64 },
    Clear,
    Open,
    Close,
    Toggle,
    /// Re-fetch the cart from the backend.
    Sync,
    /// Record a backend cart id obtained out of band.
    SetCartId { cart_id: String },
    Snapshot { reply: oneshot::Sender<CartState> },
    Checkout { reply: oneshot::Sender<Result<Url, CartError>> },
    Shutdown { reply: oneshot::Sender<()> },
}
