use crate::backend::{CartSnapshot, MirrorAck};
use crate::cart::item::ProductId;
use crate::errors::BackendError;
use std::fmt::Display;

/// A backend call the store wants performed.
///
/// Intents are produced by [`CartStore`](crate::cart::store::CartStore) after
/// the local state already changed. Whoever owns the store dispatches them
/// and hands the result back as a [`SyncOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIntent {
    AddItem { product_id: ProductId, quantity: u32 },
    RemoveItem { product_id: ProductId },
    UpdateItem { product_id: ProductId, quantity: u32 },
    Clear,
    /// Full re-fetch. `seq` is the store generation at the time of issue.
    Fetch { seq: u64 },
}

/// Which mirror call an outcome belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MirrorOp {
    AddItem,
    RemoveItem,
    UpdateItem,
    Clear,
}

impl Display for MirrorOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MirrorOp::AddItem => "add_item",
            MirrorOp::RemoveItem => "remove_item",
            MirrorOp::UpdateItem => "update_item",
            MirrorOp::Clear => "clear",
        };
        f.write_str(s)
    }
}

/// The result of a dispatched [`SyncIntent`].
#[derive(Debug)]
pub enum SyncOutcome {
    Mirrored {
        op: MirrorOp,
        result: Result<MirrorAck, BackendError>,
    },
    Fetched {
        seq: u64,
        result: Result<CartSnapshot, BackendError>,
    },
}
