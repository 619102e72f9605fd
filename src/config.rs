//! Cart configuration.
//!
//! `CartConfig` controls where the commerce backend lives, whether it is
//! used at all, and how the cart is persisted in cookies. It provides
//! sensible defaults via [`Default`] and a fluent [`CartConfig::builder()`]
//! for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use storefront_cart::config::CartConfig;
//! let cfg = CartConfig::default();
//! assert!(cfg.backend_enabled);
//! assert_eq!(cfg.state_cookie_name, "freedom-puff-cart");
//! ```
//!
//! ## Static deployment (no backend)
//! ```rust
//! use storefront_cart::config::CartConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = CartConfig::builder()
//!     .site_url("https://shop.example.com/")
//!     .backend_enabled(false)
//!     .build()?;
//! assert!(!cfg.backend_enabled);
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `api_base`: Base URL of the cart API. Always ends with `/` so endpoint
//!   paths join beneath it (default: `http://localhost:8000/api/`).
//! - `site_url`: Storefront origin; cookies are scoped to it and checkout
//!   return URLs are derived from it (default: `http://localhost:3000/`).
//! - `backend_enabled`: When `false` every operation is local-only.
//! - `state_cookie_name` / `cart_id_cookie_name` / `csrf_cookie_name`: cookie names.
//! - `cookie_max_age`: Lifetime of the persistence cookies (default: 30 days).
//! - `open_on_add`: Open the cart after an item is added (default: `true`).
//! - `request_timeout`: Optional per-request timeout (default: none).
//! - `channel_capacity`: Capacity of the worker command channel.
//! - `user_agent`: Optional UA string for backend requests.

use std::fmt;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000/";
pub const DEFAULT_STATE_COOKIE: &str = "freedom-puff-cart";
pub const DEFAULT_CART_ID_COOKIE: &str = "cart_id";
pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
pub const DEFAULT_COOKIE_DAYS: i64 = 30;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct CartConfig {
    pub api_base: Url,
    pub site_url: Url,
    pub backend_enabled: bool,
    pub state_cookie_name: String,
    pub cart_id_cookie_name: String,
    pub csrf_cookie_name: String,
    pub cookie_max_age: time::Duration,
    pub open_on_add: bool,
    pub request_timeout: Option<std::time::Duration>,
    pub channel_capacity: usize,
    pub user_agent: Option<String>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default api base is a valid URL"),
            site_url: Url::parse(DEFAULT_SITE_URL).expect("default site url is a valid URL"),
            backend_enabled: true,
            state_cookie_name: DEFAULT_STATE_COOKIE.to_string(),
            cart_id_cookie_name: DEFAULT_CART_ID_COOKIE.to_string(),
            csrf_cookie_name: DEFAULT_CSRF_COOKIE.to_string(),
            cookie_max_age: time::Duration::days(DEFAULT_COOKIE_DAYS),
            open_on_add: true,
            request_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            user_agent: None,
        }
    }
}

impl CartConfig {
    pub fn builder() -> CartConfigBuilder {
        CartConfigBuilder::default()
    }

    /// URL the payment provider sends the shopper to after paying.
    pub fn checkout_success_url(&self) -> Url {
        let mut url = self.site_url.clone();
        url.set_path("/checkout-success");
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// URL the payment provider sends the shopper to after cancelling.
    pub fn checkout_cancel_url(&self) -> Url {
        let mut url = self.site_url.clone();
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

/// Builder for [`CartConfig`].
///
/// URLs are kept as raw strings until [`build`](Self::build) so that parse
/// failures are reported together with the other validation errors.
#[derive(Debug, Clone, Default)]
pub struct CartConfigBuilder {
    inner: CartConfig,
    api_base: Option<String>,
    site_url: Option<String>,
}

impl CartConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut CartConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn api_base<S: Into<String>>(mut self, url: S) -> Self {
        self.api_base = Some(url.into());
        self
    }
    pub fn site_url<S: Into<String>>(mut self, url: S) -> Self {
        self.site_url = Some(url.into());
        self
    }
    pub fn backend_enabled(self, on: bool) -> Self { self.map(|c| c.backend_enabled = on) }
    pub fn state_cookie_name<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.state_cookie_name = name.into()) }
    pub fn cart_id_cookie_name<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.cart_id_cookie_name = name.into()) }
    pub fn csrf_cookie_name<S: Into<String>>(self, name: S) -> Self { self.map(|c| c.csrf_cookie_name = name.into()) }
    pub fn cookie_max_age(self, age: time::Duration) -> Self { self.map(|c| c.cookie_max_age = age) }
    pub fn open_on_add(self, on: bool) -> Self { self.map(|c| c.open_on_add = on) }
    pub fn request_timeout(self, timeout: std::time::Duration) -> Self { self.map(|c| c.request_timeout = Some(timeout)) }
    pub fn channel_capacity(self, n: usize) -> Self { self.map(|c| c.channel_capacity = n) }
    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = Some(ua.into())) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut CartConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(mut self) -> Result<CartConfig, ConfigError> {
        if let Some(raw) = self.api_base.take() {
            self.inner.api_base = parse_base(&raw).ok_or(ConfigError::InvalidApiBase(raw))?;
        }
        if let Some(raw) = self.site_url.take() {
            self.inner.site_url = parse_base(&raw).ok_or(ConfigError::InvalidSiteUrl(raw))?;
        }
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

/// Parses an absolute http(s) URL and makes sure its path ends in `/`.
fn parse_base(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw).ok()?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Some(url)
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidApiBase(String),
    InvalidSiteUrl(String),
    EmptyCookieName,
    NonPositiveCookieAge,
    ZeroChannelCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidApiBase(s) =>
                write!(f, "api_base {s:?} is not an absolute http(s) URL"),
            ConfigError::InvalidSiteUrl(s) =>
                write!(f, "site_url {s:?} is not an absolute http(s) URL"),
            ConfigError::EmptyCookieName =>
                write!(f, "cookie names must not be empty"),
            ConfigError::NonPositiveCookieAge =>
                write!(f, "cookie_max_age must be positive"),
            ConfigError::ZeroChannelCapacity =>
                write!(f, "channel_capacity must be at least 1"),
        }
    }
}
impl std::error::Error for ConfigError {}

fn validate(c: &CartConfig) -> Result<(), ConfigError> {
    let names = [&c.state_cookie_name, &c.cart_id_cookie_name, &c.csrf_cookie_name];
    if names.iter().any(|n| n.trim().is_empty()) {
        return Err(ConfigError::EmptyCookieName);
    }
    if !c.cookie_max_age.is_positive() {
        return Err(ConfigError::NonPositiveCookieAge);
    }
    if c.channel_capacity == 0 {
        return Err(ConfigError::ZeroChannelCapacity);
    }
    Ok(())
}
