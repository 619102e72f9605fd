//! Cookie store infrastructure.
//!
//! A **cookie store** provisions and persists per-profile cookie jars.
//! The cart only ever holds a [`CookieJarHandle`]; a store is used at
//! startup to mint that jar and afterwards receives snapshots from it.
//!
//! Backends:
//! - [`InMemoryCookieStore`]: nothing survives the process (tests, private sessions).
//! - [`JsonCookieStore`]: one JSON file for all profiles.
//! - [`SqliteCookieStore`]: SQLite via an `r2d2` pool (feature `sqlite_cookie_store`).
//!
//! ## Example
//! ```rust,no_run
//! use storefront_cart::cookies::{CookieStore, JsonCookieStore, ProfileId};
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = JsonCookieStore::new("cookies.json".into())?;
//! let jar = store.jar_for(ProfileId::new()).expect("json store always provisions");
//! # Ok(()) }
//! ```
mod in_memory;
mod json;
#[cfg(feature = "sqlite_cookie_store")]
mod sqlite;

use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::{CookieJarHandle, ProfileId};

pub use in_memory::InMemoryCookieStore;
pub use json::JsonCookieStore;
#[cfg(feature = "sqlite_cookie_store")]
pub use sqlite::SqliteCookieStore;

/// A cookie **store** mints per-profile cookie **jars** and persists them.
///
/// Implementations must be `Send + Sync` and safe for concurrent use. All
/// methods are best-effort and must not panic; I/O failures are logged.
pub trait CookieStore: Send + Sync {
    /// Returns (or creates and returns) the jar handle for `profile`.
    ///
    /// Should return the *same logical jar* for a profile across calls.
    fn jar_for(&self, profile: ProfileId) -> Option<CookieJarHandle>;

    /// Persists the cookie state for `profile` from a provided snapshot.
    fn persist_profile_from_snapshot(&self, profile: ProfileId, snapshot: &DefaultCookieJar);

    /// Removes all persisted cookie data for `profile`. Idempotent.
    fn remove_profile(&self, profile: ProfileId);

    /// Persists all known jars to durable storage.
    fn persist_all(&self);
}
