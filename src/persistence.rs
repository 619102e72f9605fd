//! Cart persistence on top of a [`CookieJar`](crate::cookies::CookieJar).
//!
//! The cart keeps two cookies on the storefront origin:
//!
//! - the state snapshot (`freedom-puff-cart` by default), holding the whole
//!   [`CartState`] wrapped in a small versioned envelope, JSON encoded and
//!   then form-urlencoded so it is safe inside a `Cookie` header;
//! - the backend cart id (`cart_id` by default), kept apart so the backend
//!   can read it without understanding the snapshot.
//!
//! Both are written with the configured [`CookieOptions`]: a 30 day expiry,
//! `Path=/`, `Secure` and `SameSite=None`.

use crate::cart::state::CartState;
use crate::config::CartConfig;
use crate::cookies::{Cookie, CookieJarHandle, CookieOptions};
use crate::errors::CartError;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::form_urlencoded;
use url::Url;

/// Snapshot format version. Bumped when the persisted shape changes.
const SNAPSHOT_VERSION: u32 = 0;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    state: CartState,
    #[serde(default)]
    version: u32,
}

/// Reads and writes the cart's cookies for one storefront origin.
#[derive(Debug, Clone)]
pub struct CartPersistence {
    jar: CookieJarHandle,
    site: Url,
    state_cookie: String,
    cart_id_cookie: String,
    csrf_cookie: String,
    options: CookieOptions,
}

impl CartPersistence {
    pub fn new(jar: CookieJarHandle, config: &CartConfig) -> Self {
        Self {
            jar,
            site: config.site_url.clone(),
            state_cookie: config.state_cookie_name.clone(),
            cart_id_cookie: config.cart_id_cookie_name.clone(),
            csrf_cookie: config.csrf_cookie_name.clone(),
            options: CookieOptions {
                max_age: config.cookie_max_age,
                ..CookieOptions::default()
            },
        }
    }

    pub fn jar(&self) -> &CookieJarHandle {
        &self.jar
    }

    /// Serializes `state` into the snapshot cookie.
    pub fn write_snapshot(&self, state: &CartState) -> Result<(), CartError> {
        let envelope = SnapshotEnvelope {
            state: state.clone(),
            version: SNAPSHOT_VERSION,
        };
        let json = serde_json::to_string(&envelope).map_err(|e| CartError::Persistence(e.to_string()))?;
        let value: String = form_urlencoded::byte_serialize(json.as_bytes()).collect();

        self.set(&self.state_cookie, value);
        Ok(())
    }

    /// Restores the last written snapshot.
    ///
    /// A missing, expired or undecodable cookie reads as `None`. The loading
    /// flag is never restored: no request survives a reload.
    pub fn read_snapshot(&self) -> Option<CartState> {
        let raw = self.jar.read().get_cookie(&self.site, &self.state_cookie)?.value;

        let json = decode_component(&raw);
        let envelope: SnapshotEnvelope = match serde_json::from_str(&json) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("[cart] ignoring unreadable cart snapshot: {e}");
                return None;
            }
        };

        if envelope.version != SNAPSHOT_VERSION {
            log::debug!("[cart] snapshot version {} differs from {SNAPSHOT_VERSION}", envelope.version);
        }

        let mut state = envelope.state;
        state.is_loading = false;
        Some(state)
    }

    pub fn remove_snapshot(&self) {
        self.jar.write().remove_cookie(&self.site, &self.state_cookie);
    }

    pub fn write_cart_id(&self, cart_id: &str) {
        self.set(&self.cart_id_cookie, cart_id.to_string());
    }

    pub fn read_cart_id(&self) -> Option<String> {
        self.jar
            .read()
            .get_cookie(&self.site, &self.cart_id_cookie)
            .map(|c| c.value)
            .filter(|v| !v.is_empty())
    }

    pub fn remove_cart_id(&self) {
        self.jar.write().remove_cookie(&self.site, &self.cart_id_cookie);
    }

    /// The CSRF token the backend handed out, if any.
    ///
    /// The backend may set it on its own origin, so the API origin is checked
    /// when the storefront origin has none.
    pub fn read_csrf_token(&self, api_base: &Url) -> Option<String> {
        let jar = self.jar.read();
        jar.get_cookie(&self.site, &self.csrf_cookie)
            .or_else(|| jar.get_cookie(api_base, &self.csrf_cookie))
            .map(|c| c.value)
    }

    fn set(&self, name: &str, value: String) {
        let cookie = Cookie::with_options(name, value, &self.options, OffsetDateTime::now_utc());
        self.jar.write().set_cookie(&self.site, cookie);
    }
}

fn decode_component(raw: &str) -> String {
    // parse() splits on '&' and '='; the encoded snapshot contains neither
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}
