//! The cart store.
//!
//! [`CartStore`] owns the [`CartState`] and is the only thing allowed to
//! change it. Every mutation is applied to local state first, mirrored into
//! the snapshot cookie, and then answered with the [`SyncIntent`]s the owner
//! must dispatch to the backend. Backend results come back through
//! [`CartStore::apply_outcome`].
//!
//! # Stale fetches
//!
//! The store keeps a monotonic `generation`. Every local item mutation and
//! every issued fetch bumps it, and a fetch is tagged with the generation it
//! was issued at. A fetch result is only applied when its tag still equals
//! the current generation; anything older was superseded by a newer local
//! change or a newer fetch and is dropped.

use crate::cart::intent::{SyncIntent, SyncOutcome};
use crate::cart::item::{CartItem, ProductId};
use crate::cart::state::CartState;
use crate::config::CartConfig;
use crate::errors::CartError;
use crate::persistence::CartPersistence;

pub struct CartStore {
    state: CartState,
    persistence: CartPersistence,
    backend_enabled: bool,
    open_on_add: bool,
    generation: u64,
    /// Seq of the newest fetch still awaiting its answer. Older fetches can
    /// hang forever without holding the loading flag.
    awaited_fetch: Option<u64>,
    checkout_in_flight: bool,
}

impl CartStore {
    /// Creates a store hydrated from the snapshot cookie, if there is one.
    pub fn new(config: &CartConfig, persistence: CartPersistence) -> Self {
        let state = match persistence.read_snapshot() {
            Some(state) => {
                log::debug!("[cart] rehydrated {} item(s) from snapshot", state.items.len());
                state
            }
            None => CartState::new(),
        };

        Self {
            state,
            persistence,
            backend_enabled: config.backend_enabled,
            open_on_add: config.open_on_add,
            generation: 0,
            awaited_fetch: None,
            checkout_in_flight: false,
        }
    }

    pub fn state(&self) -> &CartState {
        &self.state
    }

    pub fn persistence(&self) -> &CartPersistence {
        &self.persistence
    }

    /// `true` when a fetch tagged `seq` would still be applied.
    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.generation
    }

    pub fn total_items(&self) -> u64 {
        self.state.total_items()
    }

    pub fn total_price(&self) -> f64 {
        self.state.total_price()
    }

    pub fn add_item(&mut self, item: CartItem) -> Vec<SyncIntent> {
        let (id, quantity) = (item.id.clone(), item.quantity);
        if !self.state.add_item(item) {
            log::debug!("[cart] ignoring add of {id:?}: zero quantity or invalid price");
            return Vec::new();
        }

        self.generation += 1;
        if self.open_on_add {
            self.state.open();
        }
        self.persist();

        self.mirror_intent(&id, |product_id| SyncIntent::AddItem { product_id, quantity })
    }

    /// Removes `id`. The backend is told even when the id is unknown locally.
    pub fn remove_item(&mut self, id: &str) -> Vec<SyncIntent> {
        if self.state.remove_item(id) {
            self.generation += 1;
            self.persist();
        } else {
            log::debug!("[cart] remove of unknown item {id:?}");
        }

        self.mirror_intent(id, |product_id| SyncIntent::RemoveItem { product_id })
    }

    /// Sets the quantity of `id`. Anything below one removes the line.
    pub fn update_item_quantity(&mut self, id: &str, quantity: i64) -> Vec<SyncIntent> {
        if quantity < 1 {
            return self.remove_item(id);
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if self.state.set_quantity(id, quantity) {
            self.generation += 1;
            self.persist();
        }

        self.mirror_intent(id, |product_id| SyncIntent::UpdateItem { product_id, quantity })
    }

    pub fn clear_cart(&mut self) -> Vec<SyncIntent> {
        self.state.clear();
        self.generation += 1;
        self.persist();

        if self.backend_enabled {
            vec![SyncIntent::Clear]
        } else {
            Vec::new()
        }
    }

    pub fn open_cart(&mut self) {
        self.state.open();
        self.persist();
    }

    pub fn close_cart(&mut self) {
        self.state.close();
        self.persist();
    }

    pub fn toggle_cart(&mut self) {
        self.state.toggle();
        self.persist();
    }

    /// Records the backend cart id in state and in its own cookie.
    pub fn set_cart_id(&mut self, cart_id: impl Into<String>) {
        let cart_id = cart_id.into();
        self.persistence.write_cart_id(&cart_id);
        self.state.cart_id = Some(cart_id);
        self.persist();
    }

    /// Starts a full re-fetch. Returns `None` when the backend is disabled.
    pub fn begin_sync(&mut self) -> Option<SyncIntent> {
        if !self.backend_enabled {
            return None;
        }

        if self.state.cart_id.is_none() {
            if let Some(cart_id) = self.persistence.read_cart_id() {
                log::debug!("[cart] adopting cart id {cart_id} from cookie");
                self.state.cart_id = Some(cart_id);
            }
        }

        Some(self.issue_fetch())
    }

    /// Folds a backend result into the state and returns follow-up intents.
    pub fn apply_outcome(&mut self, outcome: SyncOutcome) -> Vec<SyncIntent> {
        match outcome {
            SyncOutcome::Mirrored { op, result: Ok(ack) } => {
                log::debug!("[cart] {op} mirrored");
                if let Some(cart_id) = ack.cart_id {
                    if self.state.cart_id.is_none() {
                        self.set_cart_id(cart_id);
                    }
                }
                self.begin_sync().into_iter().collect()
            }
            SyncOutcome::Mirrored { op, result: Err(e) } => {
                log::warn!("[cart] error syncing {op} with backend ({}): {e}", e.kind());
                Vec::new()
            }
            SyncOutcome::Fetched { seq, result } => {
                if self.awaited_fetch == Some(seq) {
                    self.awaited_fetch = None;
                }

                if !self.is_current(seq) {
                    log::debug!("[cart] dropping stale fetch {seq}, generation is {}", self.generation);
                } else {
                    match result {
                        Ok(snapshot) => {
                            if let Some(cart_id) = snapshot.cart_id {
                                self.persistence.write_cart_id(&cart_id);
                                self.state.cart_id = Some(cart_id);
                            }
                            if let Some(items) = snapshot.items {
                                self.state
                                    .replace_items(items.into_iter().filter(|i| i.quantity > 0).collect());
                            }
                        }
                        Err(e) => {
                            log::warn!("[cart] error syncing cart with backend ({}): {e}", e.kind());
                            if let Some(saved) = self.persistence.read_snapshot() {
                                self.state.replace_items(saved.items);
                            }
                        }
                    }
                }

                self.refresh_loading();
                self.persist();
                Vec::new()
            }
        }
    }

    /// Checks that a checkout may start and marks the cart as loading.
    /// Only one checkout runs at a time.
    pub fn begin_checkout(&mut self) -> Result<(), CartError> {
        if !self.backend_enabled {
            return Err(CartError::BackendDisabled);
        }
        if self.checkout_in_flight {
            return Err(CartError::CheckoutInProgress);
        }
        if self.state.items.is_empty() {
            return Err(CartError::EmptyCart);
        }

        self.checkout_in_flight = true;
        self.refresh_loading();
        Ok(())
    }

    /// Ends a checkout started with [`begin_checkout`](Self::begin_checkout).
    /// The cart closes when the shopper is about to be redirected.
    pub fn finish_checkout(&mut self, redirecting: bool) {
        self.checkout_in_flight = false;
        if redirecting {
            self.state.close();
        }
        self.refresh_loading();
        self.persist();
    }

    fn issue_fetch(&mut self) -> SyncIntent {
        self.generation += 1;
        self.awaited_fetch = Some(self.generation);
        self.refresh_loading();
        SyncIntent::Fetch { seq: self.generation }
    }

    fn refresh_loading(&mut self) {
        self.state.is_loading = self.awaited_fetch.is_some() || self.checkout_in_flight;
    }

    fn mirror_intent(&self, id: &str, make: impl FnOnce(ProductId) -> SyncIntent) -> Vec<SyncIntent> {
        if !self.backend_enabled {
            return Vec::new();
        }
        // an invalid id keeps the local change, only the backend call is skipped
        match ProductId::normalize(id) {
            Ok(product_id) => vec![make(product_id)],
            Err(_) => Vec::new(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.write_snapshot(&self.state) {
            log::error!("[cart] cannot persist cart snapshot: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CartSnapshot, MirrorAck};
    use crate::cart::intent::MirrorOp;
    use crate::cookies::DefaultCookieJar;
    use crate::errors::BackendError;

    fn store_with(config: CartConfig) -> CartStore {
        let persistence = CartPersistence::new(DefaultCookieJar::new().into(), &config);
        CartStore::new(&config, persistence)
    }

    fn enabled() -> CartStore {
        store_with(CartConfig::default())
    }

    fn disabled() -> CartStore {
        store_with(CartConfig::builder().backend_enabled(false).build().unwrap())
    }

    fn pid(s: &str) -> ProductId {
        ProductId::normalize(s).unwrap()
    }

    fn grip(quantity: u32) -> CartItem {
        CartItem::new("1", "Raptor Grip", 250.0, quantity)
    }

    fn fetched(seq: u64, items: Vec<CartItem>) -> SyncOutcome {
        SyncOutcome::Fetched {
            seq,
            result: Ok(CartSnapshot {
                cart_id: Some("srv".into()),
                items: Some(items),
            }),
        }
    }

    #[test]
    fn add_merges_and_emits_intents() {
        let mut store = enabled();

        assert_eq!(
            store.add_item(grip(1)),
            vec![SyncIntent::AddItem { product_id: pid("1"), quantity: 1 }]
        );
        store.add_item(grip(2));
        assert_eq!(store.total_items(), 3);
        assert_eq!(store.total_price(), 750.0);
        assert!(store.state().is_open);
    }

    #[test]
    fn open_on_add_can_be_disabled() {
        let mut store = store_with(CartConfig::builder().open_on_add(false).build().unwrap());
        store.add_item(grip(1));
        assert!(!store.state().is_open);
    }

    #[test]
    fn composite_ids_are_normalized_for_the_backend() {
        let mut store = enabled();
        let intents = store.add_item(CartItem::new("1-blackCherry", "Grip", 250.0, 1));

        assert_eq!(intents, vec![SyncIntent::AddItem { product_id: pid("1"), quantity: 1 }]);
        assert_eq!(store.state().items[0].id, "1-blackCherry");
    }

    #[test]
    fn invalid_id_keeps_the_local_change_without_a_backend_call() {
        let mut store = enabled();
        let intents = store.add_item(CartItem::new("abc", "Thing", 5.0, 1));

        assert!(intents.is_empty());
        assert_eq!(store.total_items(), 1);
    }

    #[test]
    fn zero_quantity_update_routes_to_remove() {
        let mut store = enabled();
        store.add_item(grip(3));

        let intents = store.update_item_quantity("1", 0);
        assert_eq!(intents, vec![SyncIntent::RemoveItem { product_id: pid("1") }]);
        assert!(store.state().items.is_empty());

        store.add_item(grip(1));
        assert_eq!(
            store.update_item_quantity("1", -4),
            vec![SyncIntent::RemoveItem { product_id: pid("1") }]
        );
    }

    #[test]
    fn update_sets_quantity() {
        let mut store = enabled();
        store.add_item(grip(1));

        assert_eq!(
            store.update_item_quantity("1", 5),
            vec![SyncIntent::UpdateItem { product_id: pid("1"), quantity: 5 }]
        );
        assert_eq!(store.total_items(), 5);
    }

    #[test]
    fn removing_an_unknown_item_still_tells_the_backend() {
        let mut store = enabled();
        store.add_item(grip(1));
        let before = store.state().clone();

        let intents = store.remove_item("7");
        assert_eq!(intents, vec![SyncIntent::RemoveItem { product_id: pid("7") }]);
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn clear_empties_and_emits_clear() {
        let mut store = enabled();
        store.add_item(grip(2));
        assert_eq!(store.clear_cart(), vec![SyncIntent::Clear]);
        assert_eq!(store.total_items(), 0);
    }

    #[test]
    fn disabled_backend_is_local_only() {
        let mut store = disabled();

        assert!(store.add_item(grip(1)).is_empty());
        assert!(store.update_item_quantity("1", 4).is_empty());
        assert!(store.remove_item("1").is_empty());
        assert!(store.clear_cart().is_empty());
        assert!(store.begin_sync().is_none());
        assert!(!store.state().is_loading);
    }

    #[test]
    fn fetch_replaces_items_and_records_cart_id() {
        let mut store = enabled();
        store.add_item(grip(1));

        let Some(SyncIntent::Fetch { seq }) = store.begin_sync() else {
            panic!("expected a fetch");
        };
        assert!(store.state().is_loading);

        store.apply_outcome(fetched(seq, vec![CartItem::new("2", "Throttle", 300.0, 2)]));

        let state = store.state();
        assert!(!state.is_loading);
        assert_eq!(state.cart_id.as_deref(), Some("srv"));
        assert_eq!(state.items, vec![CartItem::new("2", "Throttle", 300.0, 2)]);
        assert_eq!(store.persistence().read_cart_id().as_deref(), Some("srv"));
    }

    #[test]
    fn stale_fetch_is_dropped() {
        let mut store = enabled();
        let Some(SyncIntent::Fetch { seq }) = store.begin_sync() else {
            panic!("expected a fetch");
        };

        // local change lands while the fetch is in flight
        store.add_item(grip(1));
        assert!(!store.is_current(seq));

        store.apply_outcome(fetched(seq, Vec::new()));
        assert_eq!(store.total_items(), 1);
        assert!(store.state().cart_id.is_none());
        assert!(!store.state().is_loading);
    }

    #[test]
    fn only_the_newest_of_overlapping_fetches_applies() {
        let mut store = enabled();
        let Some(SyncIntent::Fetch { seq: first }) = store.begin_sync() else { panic!() };
        let Some(SyncIntent::Fetch { seq: second }) = store.begin_sync() else { panic!() };

        store.apply_outcome(fetched(second, vec![grip(4)]));
        assert!(!store.state().is_loading);
        store.apply_outcome(fetched(first, vec![grip(9)]));

        assert_eq!(store.total_items(), 4);
        assert!(!store.state().is_loading);
    }

    #[test]
    fn a_hung_older_fetch_does_not_hold_the_loading_flag() {
        let mut store = enabled();
        // the first fetch never answers
        let Some(SyncIntent::Fetch { .. }) = store.begin_sync() else { panic!() };
        let Some(SyncIntent::Fetch { seq }) = store.begin_sync() else { panic!() };
        assert!(store.state().is_loading);

        store.apply_outcome(fetched(seq, vec![grip(1)]));
        assert!(!store.state().is_loading);

        // a later sync loads again and clears on its own answer
        let Some(SyncIntent::Fetch { seq }) = store.begin_sync() else { panic!() };
        assert!(store.state().is_loading);
        store.apply_outcome(SyncOutcome::Fetched {
            seq,
            result: Err(BackendError::MalformedResponse("html".into())),
        });
        assert!(!store.state().is_loading);
    }

    #[test]
    fn loading_stays_set_until_the_last_fetch_answers() {
        let mut store = enabled();
        let Some(SyncIntent::Fetch { seq: first }) = store.begin_sync() else { panic!() };
        let Some(SyncIntent::Fetch { seq: second }) = store.begin_sync() else { panic!() };

        store.apply_outcome(fetched(first, Vec::new()));
        assert!(store.state().is_loading);
        store.apply_outcome(fetched(second, Vec::new()));
        assert!(!store.state().is_loading);
    }

    #[test]
    fn failed_fetch_falls_back_to_the_snapshot() {
        let mut store = enabled();
        store.add_item(grip(2));
        let Some(SyncIntent::Fetch { seq }) = store.begin_sync() else { panic!() };

        store.apply_outcome(SyncOutcome::Fetched {
            seq,
            result: Err(BackendError::MalformedResponse("html".into())),
        });

        assert_eq!(store.total_items(), 2);
        assert!(!store.state().is_loading);
    }

    #[test]
    fn mirror_success_records_cart_id_and_refetches() {
        let mut store = enabled();
        store.add_item(grip(1));

        let follow_up = store.apply_outcome(SyncOutcome::Mirrored {
            op: MirrorOp::AddItem,
            result: Ok(MirrorAck { cart_id: Some("new".into()) }),
        });

        assert!(matches!(follow_up.as_slice(), [SyncIntent::Fetch { .. }]));
        assert_eq!(store.state().cart_id.as_deref(), Some("new"));

        // an existing id is not overwritten by a mirror response
        store.apply_outcome(SyncOutcome::Mirrored {
            op: MirrorOp::AddItem,
            result: Ok(MirrorAck { cart_id: Some("other".into()) }),
        });
        assert_eq!(store.state().cart_id.as_deref(), Some("new"));
    }

    #[test]
    fn mirror_failure_does_not_roll_back() {
        let mut store = enabled();
        store.add_item(grip(1));

        let follow_up = store.apply_outcome(SyncOutcome::Mirrored {
            op: MirrorOp::AddItem,
            result: Err(BackendError::Status { status: 500, body: String::new() }),
        });

        assert!(follow_up.is_empty());
        assert_eq!(store.total_items(), 1);
    }

    #[test]
    fn begin_sync_adopts_the_cart_id_cookie() {
        let mut store = enabled();
        store.persistence().write_cart_id("from-cookie");

        store.begin_sync();
        assert_eq!(store.state().cart_id.as_deref(), Some("from-cookie"));
    }

    #[test]
    fn state_is_rehydrated_from_the_snapshot() {
        let config = CartConfig::default();
        let jar: crate::cookies::CookieJarHandle = DefaultCookieJar::new().into();

        let mut first = CartStore::new(&config, CartPersistence::new(jar.clone(), &config));
        first.add_item(grip(2));
        first.begin_sync();

        let second = CartStore::new(&config, CartPersistence::new(jar, &config));
        assert_eq!(second.total_items(), 2);
        assert!(second.state().is_open);
        assert!(!second.state().is_loading);
    }

    #[test]
    fn checkout_preconditions() {
        assert!(matches!(disabled().begin_checkout(), Err(CartError::BackendDisabled)));
        assert!(matches!(enabled().begin_checkout(), Err(CartError::EmptyCart)));

        let mut store = enabled();
        store.add_item(grip(1));
        store.begin_checkout().unwrap();
        assert!(store.state().is_loading);

        store.finish_checkout(true);
        assert!(!store.state().is_loading);
        assert!(!store.state().is_open);
    }

    #[test]
    fn a_second_checkout_is_refused_while_one_runs() {
        let mut store = enabled();
        store.add_item(grip(1));

        store.begin_checkout().unwrap();
        assert!(matches!(store.begin_checkout(), Err(CartError::CheckoutInProgress)));
        assert!(store.state().is_loading);

        store.finish_checkout(false);
        assert!(!store.state().is_loading);
        assert!(store.state().is_open);
        store.begin_checkout().unwrap();
    }

    #[test]
    fn rejected_prices_add_nothing_and_skip_the_backend() {
        let mut store = enabled();
        assert!(store.add_item(CartItem::new("1", "Grip", -250.0, 1)).is_empty());
        assert!(store.state().items.is_empty());
        assert!(!store.state().is_open);
    }
}
