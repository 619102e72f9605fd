//! SQLite-backed cookie store.
//!
//! `SqliteCookieStore` persists **all profiles'** cookie jars in one SQLite
//! database, one row per cookie. Jars are wrapped in a
//! [`PersistentCookieJar`], so every mutation rewrites that profile's rows.
//!
//! ## Design
//! - One table (`cookies`) for all profiles.
//! - Database access goes through an `r2d2` pool for multi-threaded use.
//! - Saving a profile is DELETE + INSERT inside one transaction.
//!
//! ## Example
//! ```rust,no_run
//! use storefront_cart::cookies::{CookieStore, ProfileId, SqliteCookieStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = SqliteCookieStore::new("cookies.sqlite".into())?;
//! let jar = store.jar_for(ProfileId::new());
//! # Ok(()) }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::params;
use r2d2_sqlite::SqliteConnectionManager;

use crate::cookies::cookie_jar::DefaultCookieJar;
use crate::cookies::persistent_cookie_jar::PersistentCookieJar;
use crate::cookies::store::CookieStore;
use crate::cookies::{Cookie, CookieJarHandle, CookieStoreHandle, ProfileId};

pub struct SqliteCookieStore {
    /// Connection pool for the SQLite database
    pool: Pool<SqliteConnectionManager>,
    /// Cookie jars per profile
    jars: RwLock<HashMap<ProfileId, CookieJarHandle>>,
    /// Self handle provided to persistent jars for callback persistence.
    store_self: RwLock<Option<CookieStoreHandle>>,
}

impl SqliteCookieStore {
    /// Opens (or creates) a SQLite database at `path` and ensures the schema exists.
    pub fn new(path: PathBuf) -> anyhow::Result<Arc<Self>> {
        let manager = SqliteConnectionManager::file(path).with_init(|c| {
            c.busy_timeout(std::time::Duration::from_millis(500))?;
            c.execute_batch(
                "CREATE TABLE IF NOT EXISTS cookies (
                    profile_id TEXT NOT NULL,
                    origin TEXT NOT NULL,
                    name TEXT NOT NULL,
                    value TEXT NOT NULL,
                    path TEXT,
                    domain TEXT,
                    secure INTEGER NOT NULL,
                    expires TEXT,
                    same_site TEXT,
                    http_only INTEGER NOT NULL,
                    PRIMARY KEY (profile_id, origin, name)
                );",
            )?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(std::time::Duration::from_secs(5))
            .build(manager)?;

        let store = Arc::new(Self {
            pool,
            jars: RwLock::new(HashMap::new()),
            store_self: RwLock::new(None),
        });

        *store.store_self.write().unwrap_or_else(PoisonError::into_inner) =
            Some(store.clone() as CookieStoreHandle);

        Ok(store)
    }

    fn conn(&self) -> anyhow::Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn load_profile(&self, profile: ProfileId) -> anyhow::Result<DefaultCookieJar> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT origin, name, value, path, domain, secure, expires, same_site, http_only
             FROM cookies WHERE profile_id = ?1",
        )?;

        let rows = stmt.query_map([profile.to_string()], |row| {
            let origin: String = row.get(0)?;
            let entry = Cookie {
                name: row.get(1)?,
                value: row.get(2)?,
                path: row.get(3)?,
                domain: row.get(4)?,
                secure: row.get::<_, i64>(5)? != 0,
                expires: row.get(6)?,
                same_site: row.get(7)?,
                http_only: row.get::<_, i64>(8)? != 0,
            };
            Ok((origin, entry))
        })?;

        let mut jar = DefaultCookieJar::new();
        for (origin, entry) in rows.flatten() {
            jar.entries.entry(origin).or_default().push(entry);
        }

        Ok(jar)
    }

    fn save_profile(&self, profile: ProfileId, jar: &DefaultCookieJar) -> anyhow::Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM cookies WHERE profile_id = ?1", [profile.to_string()])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO cookies (profile_id, origin, name, value, path, domain, secure, expires, same_site, http_only)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for (origin, cookies) in &jar.entries {
                for cookie in cookies {
                    stmt.execute(params![
                        profile.to_string(),
                        origin,
                        cookie.name,
                        cookie.value,
                        cookie.path,
                        cookie.domain,
                        cookie.secure as i64,
                        cookie.expires,
                        cookie.same_site,
                        cookie.http_only as i64
                    ])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn remove_profile_from_db(&self, profile: ProfileId) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM cookies WHERE profile_id = ?1", [profile.to_string()])?;
        Ok(())
    }
}

impl CookieStore for SqliteCookieStore {
    fn jar_for(&self, profile: ProfileId) -> Option<CookieJarHandle> {
        {
            let jars = self.jars.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(jar) = jars.get(&profile) {
                return Some(jar.clone());
            }
        }

        let jar = match self.load_profile(profile) {
            Ok(jar) => jar,
            Err(e) => {
                log::error!("[cookies] cannot load profile {profile}: {e:#}");
                return None;
            }
        };

        let store = self
            .store_self
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;

        let handle = CookieJarHandle::new(PersistentCookieJar::new(profile, jar.into(), store));
        self.jars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile, handle.clone());

        Some(handle)
    }

    fn persist_profile_from_snapshot(&self, profile: ProfileId, snapshot: &DefaultCookieJar) {
        if let Err(e) = self.save_profile(profile, snapshot) {
            log::error!("[cookies] cannot persist profile {profile}: {e:#}");
        }
    }

    fn remove_profile(&self, profile: ProfileId) {
        self.jars.write().unwrap_or_else(PoisonError::into_inner).remove(&profile);
        if let Err(e) = self.remove_profile_from_db(profile) {
            log::error!("[cookies] cannot remove profile {profile}: {e:#}");
        }
    }

    fn persist_all(&self) {
        let jars = self.jars.read().unwrap_or_else(PoisonError::into_inner);

        for (profile, jar_handle) in jars.iter() {
            let jar = jar_handle.read();
            if let Some(persist) = jar.as_any().downcast_ref::<PersistentCookieJar>() {
                let inner = persist.inner.read();
                if let Some(default) = inner.as_any().downcast_ref::<DefaultCookieJar>() {
                    self.persist_profile_from_snapshot(*profile, default);
                }
            }
        }
    }
}
