//! JSON-backed cookie store.
//!
//! `JsonCookieStore` persists **all profiles'** cookie jars in a single JSON
//! file. Jars it hands out are wrapped in [`PersistentCookieJar`], so every
//! mutation triggers a snapshot write back to this store.
//!
//! ### Design
//! - One file for all profiles (`CookieStoreFile { profiles: HashMap<ProfileId, DefaultCookieJar> }`).
//! - In-memory cache of minted jars for quick reuse.
//! - The store keeps a self handle (`store_self`) so persistent jars can call
//!   back into `persist_profile_from_snapshot`.
//!
//! ### I/O characteristics & caveats
//! - Each persist **reads then rewrites** the whole file. Prefer the SQLite
//!   store for anything beyond a handful of cookies.
//! - Writes go to a sibling temp file first and are renamed into place.
//! - I/O and decode errors are logged; an unreadable file is treated as empty.
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::persistent_cookie_jar::PersistentCookieJar;
use crate::cookies::store::CookieStore;
use crate::cookies::{CookieJarHandle, CookieStoreHandle, ProfileId};

/// On-disk representation of all profiles' cookie jars.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CookieStoreFile {
    profiles: HashMap<ProfileId, DefaultCookieJar>,
}

pub struct JsonCookieStore {
    /// Path to the JSON file where cookies are stored.
    path: PathBuf,

    /// Jars minted so far, per profile.
    jars: RwLock<HashMap<ProfileId, CookieJarHandle>>,

    /// Self handle, so `PersistentCookieJar` can call back into this store.
    store_self: RwLock<Option<CookieStoreHandle>>,
}

impl JsonCookieStore {
    /// Creates (or opens) a JSON cookie store at `path`.
    ///
    /// If the file does not exist, an empty structure is written to disk.
    pub fn new(path: PathBuf) -> anyhow::Result<Arc<Self>> {
        if !path.exists() {
            let empty = serde_json::to_vec(&CookieStoreFile::default())?;
            fs::write(&path, empty)
                .with_context(|| format!("cannot create cookie store file {}", path.display()))?;
        }

        let store = Arc::new(Self {
            path,
            jars: RwLock::new(HashMap::new()),
            store_self: RwLock::new(None),
        });

        *store.store_self.write().unwrap_or_else(PoisonError::into_inner) =
            Some(store.clone() as CookieStoreHandle);

        Ok(store)
    }

    fn load_file(&self) -> CookieStoreFile {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("[cookies] cannot read {}: {e}", self.path.display());
                return CookieStoreFile::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            log::warn!("[cookies] {} is not a valid cookie file: {e}", self.path.display());
            CookieStoreFile::default()
        })
    }

    fn save_file(&self, store_file: &CookieStoreFile) {
        if let Err(e) = self.try_save_file(store_file) {
            log::error!("[cookies] cannot write {}: {e:#}", self.path.display());
        }
    }

    fn try_save_file(&self, store_file: &CookieStoreFile) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(store_file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CookieStore for JsonCookieStore {
    fn jar_for(&self, profile: ProfileId) -> Option<CookieJarHandle> {
        {
            let jars = self.jars.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(jar) = jars.get(&profile) {
                return Some(jar.clone());
            }
        }

        let store = self
            .store_self
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;

        let mut file = self.load_file();
        let jar = file.profiles.remove(&profile).unwrap_or_default();
        let persistent = CookieJarHandle::new(PersistentCookieJar::new(profile, jar.into(), store));

        self.jars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile, persistent.clone());

        Some(persistent)
    }

    fn persist_profile_from_snapshot(&self, profile: ProfileId, snapshot: &DefaultCookieJar) {
        let mut store_file = self.load_file();
        store_file.profiles.insert(profile, snapshot.clone());
        self.save_file(&store_file);
    }

    fn remove_profile(&self, profile: ProfileId) {
        self.jars.write().unwrap_or_else(PoisonError::into_inner).remove(&profile);

        let mut file = self.load_file();
        file.profiles.remove(&profile);
        self.save_file(&file);
    }

    /// Snapshots every minted [`PersistentCookieJar`] whose inner jar is a
    /// [`DefaultCookieJar`] and writes them in one go.
    fn persist_all(&self) {
        let jars = self.jars.read().unwrap_or_else(PoisonError::into_inner);

        let mut file = self.load_file();
        for (profile, jar) in jars.iter() {
            let jar = jar.read();
            if let Some(persist) = jar.as_any().downcast_ref::<PersistentCookieJar>() {
                let inner = persist.inner.read();
                if let Some(default) = inner.as_any().downcast_ref::<DefaultCookieJar>() {
                    file.profiles.insert(*profile, default.clone());
                }
            }
        }

        self.save_file(&file);
    }
}
