use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::{Cookie, CookieJar, CookieJarHandle, CookieStoreHandle, ProfileId};
use http::HeaderMap;
use url::Url;

/// A `CookieJar` decorator that persists changes after each mutation.
///
/// Reads go straight to the inner jar; every write is followed by a snapshot
/// handed to the backing [`CookieStore`](crate::cookies::CookieStore).
pub struct PersistentCookieJar {
    /// Profile this jar belongs to (used to address the store).
    profile: ProfileId,
    /// Inner cookie jar that holds the actual cookie state.
    pub inner: CookieJarHandle,
    /// Store responsible for persistence.
    store_handle: CookieStoreHandle,
}

impl PersistentCookieJar {
    pub fn new(profile: ProfileId, jar: CookieJarHandle, store_handle: CookieStoreHandle) -> Self {
        Self {
            profile,
            inner: jar,
            store_handle,
        }
    }

    /// Snapshots the inner jar and persists it to the backing store.
    ///
    /// Inner jars that are not a [`DefaultCookieJar`] cannot be snapshotted;
    /// that is logged and the write is skipped.
    fn persist(&self) {
        let snapshot = {
            let inner = self.inner.read();
            match inner.as_any().downcast_ref::<DefaultCookieJar>() {
                Some(jar) => jar.clone(),
                None => {
                    log::error!("[cookies] profile {}: inner jar is not snapshottable", self.profile);
                    return;
                }
            }
        };

        self.store_handle.persist_profile_from_snapshot(self.profile, &snapshot);
    }
}

impl CookieJar for PersistentCookieJar {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn store_response_cookies(&mut self, url: &Url, headers: &HeaderMap) {
        if !headers.contains_key(http::header::SET_COOKIE) {
            return;
        }
        self.inner.write().store_response_cookies(url, headers);
        self.persist();
    }

    fn get_request_cookies(&self, url: &Url) -> Option<String> {
        self.inner.read().get_request_cookies(url)
    }

    fn set_cookie(&mut self, url: &Url, cookie: Cookie) {
        self.inner.write().set_cookie(url, cookie);
        self.persist();
    }

    fn get_cookie(&self, url: &Url, name: &str) -> Option<Cookie> {
        self.inner.read().get_cookie(url, name)
    }

    fn clear(&mut self) {
        self.inner.write().clear();
        self.persist();
    }

    fn get_all_cookies(&self) -> Vec<(Url, String)> {
        self.inner.read().get_all_cookies()
    }

    fn remove_cookie(&mut self, url: &Url, cookie_name: &str) {
        self.inner.write().remove_cookie(url, cookie_name);
        self.persist();
    }

    fn remove_cookies_for_url(&mut self, url: &Url) {
        self.inner.write().remove_cookies_for_url(url);
        self.persist();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieStore;
    use std::sync::{Arc, Mutex};

    /// Records every snapshot it is asked to persist.
    #[derive(Default)]
    struct RecordingStore {
        snapshots: Mutex<Vec<(ProfileId, DefaultCookieJar)>>,
    }

    impl CookieStore for RecordingStore {
        fn jar_for(&self, _profile: ProfileId) -> Option<CookieJarHandle> {
            None
        }
        fn persist_profile_from_snapshot(&self, profile: ProfileId, snapshot: &DefaultCookieJar) {
            self.snapshots.lock().unwrap().push((profile, snapshot.clone()));
        }
        fn remove_profile(&self, _profile: ProfileId) {}
        fn persist_all(&self) {}
    }

    #[test]
    fn every_mutation_persists_a_snapshot() {
        let store = Arc::new(RecordingStore::default());
        let profile = ProfileId::new();
        let mut jar = PersistentCookieJar::new(profile, DefaultCookieJar::new().into(), store.clone());
        let site = Url::parse("https://shop.example.com/").unwrap();

        jar.set_cookie(&site, Cookie::new("a", "1"));
        jar.remove_cookie(&site, "a");
        jar.clear();

        let snapshots = store.snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots.iter().all(|(p, _)| *p == profile));
        assert_eq!(snapshots[0].1.get_cookie(&site, "a").unwrap().value, "1");
        assert!(snapshots[1].1.get_cookie(&site, "a").is_none());
    }

    #[test]
    fn reads_do_not_persist() {
        let store = Arc::new(RecordingStore::default());
        let jar = PersistentCookieJar::new(ProfileId::new(), DefaultCookieJar::new().into(), store.clone());
        let site = Url::parse("https://shop.example.com/").unwrap();

        let _ = jar.get_cookie(&site, "a");
        let _ = jar.get_request_cookies(&site);
        let _ = jar.get_all_cookies();

        assert!(store.snapshots.lock().unwrap().is_empty());
    }

    #[test]
    fn responses_without_set_cookie_skip_persistence() {
        let store = Arc::new(RecordingStore::default());
        let mut jar = PersistentCookieJar::new(ProfileId::new(), DefaultCookieJar::new().into(), store.clone());
        let api = Url::parse("https://api.example.com/").unwrap();

        jar.store_response_cookies(&api, &HeaderMap::new());
        assert!(store.snapshots.lock().unwrap().is_empty());
    }
}
