//! The cart worker task.
//!
//! A [`CartWorker`] owns the [`CartStore`] and is the single place where cart
//! state changes. It receives [`CartCommand`]s from any number of
//! [`CartHandle`]s, applies them to the store, and spawns one task per
//! [`SyncIntent`] the store hands back. Finished tasks report over an
//! internal channel and are folded back into the store in arrival order.
//!
//! Subscribers get a [`CartEvent`] for every observable change.

use crate::backend::{CartBackend, CartBackendHandle};
use crate::cart::handle::CartHandle;
use crate::cart::intent::{MirrorOp, SyncIntent, SyncOutcome};
use crate::cart::state::CartState;
use crate::cart::store::CartStore;
use crate::config::CartConfig;
use crate::errors::{BackendError, CartError};
use crate::events::{CartCommand, CartEvent};
use crate::persistence::CartPersistence;
use std::ops::ControlFlow;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Capacity of the event broadcast channel. Slow subscribers lag, they never
/// block the worker.
const EVENT_CAPACITY: usize = 256;

/// Work finished by a spawned task.
enum Completion {
    Sync(SyncOutcome),
    Checkout {
        result: Result<Url, BackendError>,
        reply: oneshot::Sender<Result<Url, CartError>>,
    },
}

pub struct CartWorker {
    store: CartStore,
    backend: CartBackendHandle,
    success_url: Url,
    cancel_url: Url,
    cmd_rx: mpsc::Receiver<CartCommand>,
    event_tx: broadcast::Sender<CartEvent>,
    done_tx: mpsc::UnboundedSender<Completion>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    /// Cancels in-flight backend tasks when the worker stops.
    cancel: CancellationToken,
}

impl CartWorker {
    /// Creates the worker and the first handle to it. The worker stops once
    /// every handle is gone, so it keeps no sender of its own.
    pub fn new(config: &CartConfig, persistence: CartPersistence, backend: CartBackendHandle) -> (Self, CartHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let handle = CartHandle::new(cmd_tx, event_tx.clone());
        let worker = Self {
            store: CartStore::new(config, persistence),
            backend,
            success_url: config.checkout_success_url(),
            cancel_url: config.checkout_cancel_url(),
            cmd_rx,
            event_tx,
            done_tx,
            done_rx,
            cancel: CancellationToken::new(),
        };
        (worker, handle)
    }

    /// Creates the worker and spawns it on the current tokio runtime.
    pub fn spawn(
        config: &CartConfig,
        persistence: CartPersistence,
        backend: CartBackendHandle,
    ) -> (CartHandle, JoinHandle<()>) {
        let (worker, handle) = Self::new(config, persistence, backend);
        let join_handle = tokio::spawn(worker.run());
        (handle, join_handle)
    }

    pub fn state(&self) -> &CartState {
        self.store.state()
    }

    /// Main loop. Runs until [`CartHandle::shutdown`] or until every handle
    /// is dropped.
    pub async fn run(mut self) {
        log::info!("[cart] worker started with {} item(s)", self.store.state().items.len());

        if let Some(intent) = self.store.begin_sync() {
            self.dispatch(intent);
        }

        let mut shutdown_reply = None;
        loop {
            tokio::select! {
                Some(done) = self.done_rx.recv() => self.handle_completion(done),

                msg = self.cmd_rx.recv() => {
                    let Some(cmd) = msg else {
                        log::debug!("[cart] all handles dropped");
                        break;
                    };
                    if let ControlFlow::Break(reply) = self.handle_command(cmd) {
                        shutdown_reply = Some(reply);
                        break;
                    }
                }
            }
        }

        self.cancel.cancel();
        log::info!("[cart] worker stopped");

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn handle_command(&mut self, cmd: CartCommand) -> ControlFlow<oneshot::Sender<()>> {
        let before = self.store.state().clone();

        let intents = match cmd {
            CartCommand::AddItem { item } => self.store.add_item(item),
            CartCommand::RemoveItem { id } => self.store.remove_item(&id),
            CartCommand::UpdateQuantity { id, quantity } => self.store.update_item_quantity(&id, quantity),
            CartCommand::Clear => self.store.clear_cart(),
            CartCommand::Open => {
                self.store.open_cart();
                Vec::new()
            }
            CartCommand::Close => {
                self.store.close_cart();
                Vec::new()
            }
            CartCommand::Toggle => {
                self.store.toggle_cart();
                Vec::new()
            }
            CartCommand::Sync => self.store.begin_sync().into_iter().collect(),
            CartCommand::SetCartId { cart_id } => {
                self.store.set_cart_id(cart_id);
                Vec::new()
            }
            CartCommand::Snapshot { reply } => {
                let _ = reply.send(self.store.state().clone());
                Vec::new()
            }
            CartCommand::Checkout { reply } => {
                self.start_checkout(reply);
                Vec::new()
            }
            CartCommand::Shutdown { reply } => return ControlFlow::Break(reply),
        };

        self.publish_changes(&before);
        for intent in intents {
            self.dispatch(intent);
        }
        ControlFlow::Continue(())
    }

    fn handle_completion(&mut self, done: Completion) {
        let before = self.store.state().clone();

        match done {
            Completion::Sync(outcome) => {
                let report = match &outcome {
                    SyncOutcome::Mirrored { op, result: Err(e) } => Some(CartEvent::MirrorFailed {
                        op: *op,
                        reason: e.to_string(),
                    }),
                    SyncOutcome::Fetched { seq, .. } if !self.store.is_current(*seq) => {
                        Some(CartEvent::StaleSyncDropped { seq: *seq })
                    }
                    SyncOutcome::Fetched { result: Err(e), .. } => Some(CartEvent::SyncFailed {
                        reason: e.to_string(),
                    }),
                    SyncOutcome::Fetched { result: Ok(_), .. } => None,
                    SyncOutcome::Mirrored { .. } => None,
                };
                let synced = report.is_none() && matches!(outcome, SyncOutcome::Fetched { .. });

                let follow_up = self.store.apply_outcome(outcome);

                if let Some(event) = report {
                    self.emit(event);
                }
                self.publish_changes(&before);
                if synced {
                    let cart_id = self.store.state().cart_id.clone();
                    log::info!("[cart] synced with backend, {} item(s)", self.store.state().items.len());
                    self.emit(CartEvent::Synced { cart_id });
                }

                for intent in follow_up {
                    self.dispatch(intent);
                }
            }
            Completion::Checkout { result, reply } => {
                self.store.finish_checkout(result.is_ok());

                let result = match result {
                    Ok(url) => {
                        self.emit(CartEvent::CheckoutRedirect { url: url.clone() });
                        Ok(url)
                    }
                    Err(e) => {
                        log::error!("[cart] checkout error ({}): {e}", e.kind());
                        let err = CartError::Checkout(e);
                        self.emit(CartEvent::CheckoutFailed { message: err.to_string() });
                        Err(err)
                    }
                };
                self.publish_changes(&before);
                let _ = reply.send(result);
            }
        }
    }

    fn start_checkout(&mut self, reply: oneshot::Sender<Result<Url, CartError>>) {
        if let Err(e) = self.store.begin_checkout() {
            log::warn!("[cart] checkout refused: {e}");
            self.emit(CartEvent::CheckoutFailed { message: e.to_string() });
            let _ = reply.send(Err(e));
            return;
        }

        let backend = self.backend.clone();
        let done_tx = self.done_tx.clone();
        let cancel = self.cancel.clone();
        let (success, cancel_url) = (self.success_url.clone(), self.cancel_url.clone());

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                r = backend.create_checkout_session(&success, &cancel_url) => r,
            };
            let _ = done_tx.send(Completion::Checkout { result, reply });
        });
    }

    /// Fire-and-forget: the result comes back through `done_rx`.
    fn dispatch(&self, intent: SyncIntent) {
        log::debug!("[cart] dispatching {intent:?}");

        let backend = self.backend.clone();
        let done_tx = self.done_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                outcome = perform(backend.as_ref(), intent) => outcome,
            };
            let _ = done_tx.send(Completion::Sync(outcome));
        });
    }

    fn publish_changes(&self, before: &CartState) {
        let state = self.store.state();

        if state.items != before.items {
            self.emit(CartEvent::StateChanged {
                total_items: state.total_items(),
                total_price: state.total_price(),
            });
        }
        if state.is_open != before.is_open {
            self.emit(if state.is_open { CartEvent::CartOpened } else { CartEvent::CartClosed });
        }
    }

    fn emit(&self, event: CartEvent) {
        log::trace!("[cart] event {event}");
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

async fn perform(backend: &dyn CartBackend, intent: SyncIntent) -> SyncOutcome {
    match intent {
        SyncIntent::AddItem { product_id, quantity } => SyncOutcome::Mirrored {
            op: MirrorOp::AddItem,
            result: backend.add_item(&product_id, quantity).await,
        },
        SyncIntent::RemoveItem { product_id } => SyncOutcome::Mirrored {
            op: MirrorOp::RemoveItem,
            result: backend.remove_item(&product_id).await,
        },
        SyncIntent::UpdateItem { product_id, quantity } => SyncOutcome::Mirrored {
            op: MirrorOp::UpdateItem,
            result: backend.update_item(&product_id, quantity).await,
        },
        SyncIntent::Clear => SyncOutcome::Mirrored {
            op: MirrorOp::Clear,
            result: backend.clear().await,
        },
        SyncIntent::Fetch { seq } => SyncOutcome::Fetched {
            seq,
            result: backend.fetch_cart().await,
        },
    }
}
