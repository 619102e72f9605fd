use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::store::CookieStore;
use crate::cookies::{CookieJarHandle, ProfileId};

#[derive(Default)]
pub struct InMemoryCookieStore {
    /// Cookie jars per profile
    jars: RwLock<HashMap<ProfileId, CookieJarHandle>>,
}

impl InMemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for InMemoryCookieStore {
    fn jar_for(&self, profile: ProfileId) -> Option<CookieJarHandle> {
        let mut jars = self.jars.write().unwrap_or_else(PoisonError::into_inner);
        let handle = jars
            .entry(profile)
            .or_insert_with(|| DefaultCookieJar::new().into())
            .clone();
        Some(handle)
    }

    fn persist_profile_from_snapshot(&self, _profile: ProfileId, _snapshot: &DefaultCookieJar) {}

    fn remove_profile(&self, profile: ProfileId) {
        self.jars.write().unwrap_or_else(PoisonError::into_inner).remove(&profile);
    }

    fn persist_all(&self) {}
}
