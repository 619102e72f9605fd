use crate::cart::item::CartItem;
use crate::cart::state::CartState;
use crate::errors::CartError;
use crate::events::{CartCommand, CartEvent};
use tokio::sync::{broadcast, mpsc, oneshot};
use url::Url;

/// Cloneable front door to a running [`CartWorker`](crate::cart::CartWorker).
///
/// Mutating calls return as soon as the worker has the command; they never
/// wait for the backend. Observe [`CartEvent`]s through [`subscribe`](Self::subscribe)
/// to learn about the outcome.
#[derive(Clone)]
pub struct CartHandle {
    cmd_tx: mpsc::Sender<CartCommand>,
    event_tx: broadcast::Sender<CartEvent>,
}

impl std::fmt::Debug for CartHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartHandle")
            .field("cmd_tx", &self.cmd_tx)
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

impl CartHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<CartCommand>, event_tx: broadcast::Sender<CartEvent>) -> Self {
        Self { cmd_tx, event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, cmd: CartCommand) -> Result<(), CartError> {
        self.cmd_tx.send(cmd).await.map_err(|_| CartError::WorkerGone)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> CartCommand) -> Result<T, CartError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| CartError::WorkerGone)
    }

    pub async fn add_item(&self, item: CartItem) -> Result<(), CartError> {
        self.send(CartCommand::AddItem { item }).await
    }

    pub async fn remove_item(&self, id: impl Into<String>) -> Result<(), CartError> {
        self.send(CartCommand::RemoveItem { id: id.into() }).await
    }

    /// Sets the quantity of a line. Values below one remove it.
    pub async fn update_quantity(&self, id: impl Into<String>, quantity: i64) -> Result<(), CartError> {
        self.send(CartCommand::UpdateQuantity { id: id.into(), quantity }).await
    }

    pub async fn clear(&self) -> Result<(), CartError> {
        self.send(CartCommand::Clear).await
    }

    pub async fn open(&self) -> Result<(), CartError> {
        self.send(CartCommand::Open).await
    }

    pub async fn close(&self) -> Result<(), CartError> {
        self.send(CartCommand::Close).await
    }

    pub async fn toggle(&self) -> Result<(), CartError> {
        self.send(CartCommand::Toggle).await
    }

    /// Re-fetches the cart from the backend. A no-op when the backend is disabled.
    pub async fn sync(&self) -> Result<(), CartError> {
        self.send(CartCommand::Sync).await
    }

    pub async fn set_cart_id(&self, cart_id: impl Into<String>) -> Result<(), CartError> {
        self.send(CartCommand::SetCartId { cart_id: cart_id.into() }).await
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> Result<CartState, CartError> {
        self.request(|reply| CartCommand::Snapshot { reply }).await
    }

    pub async fn total_items(&self) -> Result<u64, CartError> {
        Ok(self.snapshot().await?.total_items())
    }

    pub async fn total_price(&self) -> Result<f64, CartError> {
        Ok(self.snapshot().await?.total_price())
    }

    /// Creates a checkout session and returns the payment page to redirect to.
    ///
    /// The error's `Display` is meant to be shown to the shopper.
    pub async fn checkout(&self) -> Result<Url, CartError> {
        self.request(|reply| CartCommand::Checkout { reply }).await?
    }

    /// Stops the worker and waits until it has exited its loop.
    pub async fn shutdown(&self) -> Result<(), CartError> {
        self.request(|reply| CartCommand::Shutdown { reply }).await
    }
}
