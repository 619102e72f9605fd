//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** holds every cookie of one profile. The backend client
//! hands it request/response metadata so the commerce session survives
//! between calls, and the cart's persistence adapter reads and writes its
//! own cookies through it.
//!
//! ## Notes & limitations
//! - `Set-Cookie` parsing handles `Expires`, `Max-Age`, `Path`, `Domain`,
//!   `Secure`, `HttpOnly` and `SameSite`. Priorities and size limits are not
//!   implemented.
//! - Cookies are bucketed by **origin** (`url.origin().ascii_serialization()`).
//! - Expired cookies are kept until overwritten but never returned.
//! - The jar is **not** internally synchronized; use it via a
//!   [`CookieJarHandle`](crate::cookies::CookieJarHandle).
use crate::cookies::Cookie;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use url::Url;

/// A cookie jar keeps the cookies for one profile.
///
/// ### Type erasure
/// `as_any` / `as_any_mut` enable downcasting when callers need the
/// concrete implementation (snapshotting for persistence).
pub trait CookieJar: Send + Sync {
    /// Returns a type-erased reference to the jar.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable type-erased reference to the jar.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Stores cookies found in response `headers` for the given `url`.
    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap);

    /// Returns the `Cookie` request header value to send for `url`, if any.
    fn get_request_cookies(&self, url: &Url) -> Option<String>;

    /// Inserts or replaces (by name) a cookie for the origin of `url`.
    fn set_cookie(&mut self, url: &Url, cookie: Cookie);

    /// Returns the live (unexpired) cookie named `name` for the origin of `url`.
    fn get_cookie(&self, url: &Url, name: &str) -> Option<Cookie>;

    /// Removes all cookies from the jar.
    fn clear(&mut self);

    /// Retrieves all live cookies grouped by origin, formatted as `"name=value"` pairs.
    fn get_all_cookies(&self) -> Vec<(Url, String)>;

    /// Removes a single cookie with `cookie_name` associated with `url`.
    fn remove_cookie(&mut self, url: &Url, cookie_name: &str);

    /// Removes all cookies associated with `url` (bucketed by its origin).
    fn remove_cookies_for_url(&mut self, url: &Url);
}

/// Default in-memory cookie jar.
///
/// ### Parsing behavior
/// - Accepts multiple `Set-Cookie` headers.
/// - `Max-Age` wins over `Expires`; a non-positive `Max-Age` deletes the cookie.
/// - `Expires` is read as an HTTP date and stored as RFC 3339.
/// - If `Path` is absent, a default path is derived from the request URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultCookieJar {
    /// Cookies bucketed by origin string.
    pub entries: HashMap<String, Vec<Cookie>>,
}

impl DefaultCookieJar {
    /// Creates an empty in-memory cookie jar.
    pub fn new() -> Self {
        DefaultCookieJar {
            entries: HashMap::new(),
        }
    }

    fn live<'a>(&'a self, origin: &str, now: OffsetDateTime) -> impl Iterator<Item = &'a Cookie> + 'a {
        self.entries
            .get(origin)
            .into_iter()
            .flatten()
            .filter(move |c| !c.is_expired(now))
    }
}

impl From<DefaultCookieJar> for crate::cookies::CookieJarHandle {
    fn from(jar: DefaultCookieJar) -> Self {
        crate::cookies::CookieJarHandle::new(jar)
    }
}

/// Parses a single `Set-Cookie` header value.
///
/// Returns the cookie and whether it asks for deletion (`Max-Age <= 0`).
fn parse_set_cookie(header: &str, default_path: &str, now: OffsetDateTime) -> Option<(Cookie, bool)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));
    let mut max_age: Option<i64> = None;

    for part in parts {
        let part = part.trim();
        if let Some((k, v)) = part.split_once('=') {
            let v = v.trim();
            match k.trim().to_ascii_lowercase().as_str() {
                "path" => cookie.path = Some(v.to_string()),
                "domain" => cookie.domain = Some(v.trim_start_matches('.').to_string()),
                "expires" => {
                    if let Some(at) = parse_http_date(v) {
                        cookie.set_expires_at(at);
                    }
                }
                "max-age" => max_age = v.parse::<i64>().ok(),
                "samesite" => {
                    cookie.same_site = Some(if v.eq_ignore_ascii_case("lax") {
                        "Lax".to_string()
                    } else if v.eq_ignore_ascii_case("strict") {
                        "Strict".to_string()
                    } else if v.eq_ignore_ascii_case("none") {
                        "None".to_string()
                    } else {
                        v.to_string()
                    });
                }
                _ => {}
            }
        } else if part.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if part.eq_ignore_ascii_case("httponly") {
            cookie.http_only = true;
        }
    }

    if cookie.path.is_none() {
        cookie.path = Some(default_path.to_string());
    }

    let mut delete = false;
    if let Some(secs) = max_age {
        if secs <= 0 {
            delete = true;
        } else {
            cookie.set_expires_at(now + time::Duration::seconds(secs));
        }
    } else if cookie.is_expired(now) {
        delete = true;
    }

    Some((cookie, delete))
}

/// Parses an IMF-fixdate such as `Wed, 18 Nov 2026 10:00:00 GMT`.
fn parse_http_date(s: &str) -> Option<OffsetDateTime> {
    let fmt = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    PrimitiveDateTime::parse(s.trim(), &fmt)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

impl CookieJar for DefaultCookieJar {
    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        let now = OffsetDateTime::now_utc();
        let origin = url.origin().ascii_serialization();
        let default_path = url.path().rsplit_once('/').map_or("/", |(a, _)| if a.is_empty() { "/" } else { a });

        let bucket = self.entries.entry(origin).or_default();

        for header in headers.get_all(http::header::SET_COOKIE) {
            let Ok(header_str) = header.to_str() else {
                continue;
            };
            let Some((cookie, delete)) = parse_set_cookie(header_str, default_path, now) else {
                log::debug!("[cookies] ignoring malformed Set-Cookie for {url}");
                continue;
            };

            if delete {
                bucket.retain(|c| c.name != cookie.name);
            } else if let Some(existing) = bucket.iter_mut().find(|c| c.name == cookie.name) {
                *existing = cookie;
            } else {
                bucket.push(cookie);
            }
        }
    }

    fn get_request_cookies(&self, url: &Url) -> Option<String> {
        let now = OffsetDateTime::now_utc();
        let origin = url.origin().ascii_serialization();
        let host = url.host_str().unwrap_or_default();
        let path = url.path();
        let is_https = url.scheme() == "https";

        let header = self
            .live(&origin, now)
            .filter(|cookie| match &cookie.domain {
                Some(domain) => host == domain || host.ends_with(&format!(".{}", domain)),
                None => true,
            })
            .filter(|cookie| match &cookie.path {
                Some(cookie_path) => path.starts_with(cookie_path.as_str()),
                None => true,
            })
            .filter(|cookie| !cookie.secure || is_https)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }

    fn set_cookie(&mut self, url: &Url, cookie: Cookie) {
        let origin = url.origin().ascii_serialization();
        let bucket = self.entries.entry(origin).or_default();
        if let Some(existing) = bucket.iter_mut().find(|c| c.name == cookie.name) {
            *existing = cookie;
        } else {
            bucket.push(cookie);
        }
    }

    fn get_cookie(&self, url: &Url, name: &str) -> Option<Cookie> {
        let origin = url.origin().ascii_serialization();
        self.live(&origin, OffsetDateTime::now_utc())
            .find(|c| c.name == name)
            .cloned()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn get_all_cookies(&self) -> Vec<(Url, String)> {
        let now = OffsetDateTime::now_utc();
        self.entries
            .keys()
            .filter_map(|origin| {
                Url::parse(origin).ok().map(|url| {
                    let str_ = self
                        .live(origin, now)
                        .map(|c| format!("{}={}", c.name, c.value))
                        .collect::<Vec<_>>()
                        .join("; ");
                    (url, str_)
                })
            })
            .collect()
    }

    fn remove_cookie(&mut self, url: &Url, cookie_name: &str) {
        let origin = url.origin().ascii_serialization();
        if let Some(cookies) = self.entries.get_mut(&origin) {
            cookies.retain(|c| c.name != cookie_name);
        }
    }

    fn remove_cookies_for_url(&mut self, url: &Url) {
        let origin = url.origin().ascii_serialization();
        self.entries.remove(&origin);
    }
}
