//! Cookie core types.
//!
//! This module defines the shared handles used throughout the crate, the
//! serializable [`Cookie`] record and the [`CookieOptions`] used when the
//! cart writes its own cookies.
//!
//! # Concurrency model
//! - [`CookieJarHandle`] wraps `Arc<RwLock<dyn CookieJar + Send + Sync>>`.
//!   Callers take a **read lock** for queries and a **write lock** for
//!   mutations. A poisoned lock is recovered rather than propagated: a jar
//!   holds no invariants that a panicking writer could break halfway.
//! - [`CookieStoreHandle`] is `Arc<dyn CookieStore + Send + Sync>`. Stores
//!   manage their own internal synchronization.
//!
//! ```rust
//! use storefront_cart::cookies::{Cookie, CookieOptions};
//! use time::OffsetDateTime;
//!
//! let now = OffsetDateTime::now_utc();
//! let c = Cookie::with_options("cart_id", "abc123", &CookieOptions::default(), now);
//! assert_eq!(c.path.as_deref(), Some("/"));
//! assert!(c.secure);
//! assert!(!c.is_expired(now));
//! ```

use crate::cookies::store::CookieStore;
use crate::cookies::CookieJar;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Identifies one cookie jar inside a [`CookieStore`] (a browser profile).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(Uuid);

impl ProfileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProfileId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shared, lockable handle to a type-erased [`CookieJar`].
///
/// ### Example
/// ```rust
/// use storefront_cart::cookies::{CookieJarHandle, DefaultCookieJar};
///
/// let jar: CookieJarHandle = DefaultCookieJar::new().into();
/// let other = jar.clone();
/// jar.write().clear();
/// assert!(CookieJarHandle::ptr_eq(&jar, &other));
/// ```
#[derive(Clone)]
pub struct CookieJarHandle(Arc<RwLock<dyn CookieJar + Send + Sync>>);

impl CookieJarHandle {
    pub fn new<J: CookieJar + Send + Sync + 'static>(jar: J) -> Self {
        Self(Arc::new(RwLock::new(jar)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, dyn CookieJar + Send + Sync + 'static> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, dyn CookieJar + Send + Sync + 'static> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` when both handles point at the same jar.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl std::fmt::Debug for CookieJarHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJarHandle").finish_non_exhaustive()
    }
}

/// A handle to a cookie store.
///
/// Typical use is at startup to mint the jar for a profile.
pub type CookieStoreHandle = Arc<dyn CookieStore + Send + Sync>;

/// Attributes the cart applies to the cookies it writes itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieOptions {
    /// Lifetime of the cookie from the moment it is written.
    pub max_age: time::Duration,
    /// Path scoping; the cart always uses the site root.
    pub path: String,
    /// Send only over HTTPS.
    pub secure: bool,
    /// SameSite policy. `"None"` allows cross-site use.
    pub same_site: String,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            max_age: time::Duration::days(crate::config::DEFAULT_COOKIE_DAYS),
            path: "/".to_string(),
            secure: true,
            same_site: "None".to_string(),
        }
    }
}

/// A cookie as stored/serialized by the jar.
///
/// This structure captures the essential attributes of an HTTP cookie and
/// is suitable for persistence (JSON, SQLite) via `serde`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    pub value: String,

    /// Path scoping (e.g., `"/"`).
    pub path: Option<String>,

    /// Domain scoping (host-only if `None`).
    pub domain: Option<String>,

    /// If `true`, cookie is sent only over HTTPS.
    pub secure: bool,

    /// Expiration timestamp in RFC 3339. Session cookies have `None`.
    pub expires: Option<String>,

    /// SameSite policy (`"Strict"`, `"Lax"`, or `"None"`).
    pub same_site: Option<String>,

    /// If `true`, cookie is hidden from client-side scripts.
    pub http_only: bool,
}

impl Cookie {
    /// Creates a session cookie with no attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            secure: false,
            expires: None,
            same_site: None,
            http_only: false,
        }
    }

    /// Creates a cookie carrying `options`, expiring `options.max_age` after `now`.
    pub fn with_options(
        name: impl Into<String>,
        value: impl Into<String>,
        options: &CookieOptions,
        now: OffsetDateTime,
    ) -> Self {
        let mut cookie = Self::new(name, value);
        cookie.path = Some(options.path.clone());
        cookie.secure = options.secure;
        cookie.same_site = Some(options.same_site.clone());
        cookie.set_expires_at(now + options.max_age);
        cookie
    }

    pub fn set_expires_at(&mut self, at: OffsetDateTime) {
        self.expires = at.format(&Rfc3339).ok();
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires
            .as_deref()
            .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
    }

    /// Session cookies and cookies with an unreadable expiry never expire.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }
}
