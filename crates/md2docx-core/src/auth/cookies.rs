//! Cookie-style key/value storage used as the credential medium.
//!
//! Every entry carries its own retention expiry plus the `secure` and
//! `SameSite` attributes it was written with. Expired entries read as absent
//! and are dropped the next time the jar is written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cookie jar file name in the storage directory
const COOKIE_FILE: &str = "cookies.json";

/// Default retention window for persisted entries, in days.
/// Independent of the session TTL used for validity checks.
pub const DEFAULT_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

/// Attributes applied to every entry of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieOptions {
    pub secure_only: bool,
    pub same_site: SameSite,
    pub ttl_days: i64,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            secure_only: true,
            same_site: SameSite::Lax,
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub secure: bool,
    pub same_site: SameSite,
}

impl StoredCookie {
    pub fn new(value: &str, options: &CookieOptions, now: DateTime<Utc>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: now + Duration::days(options.ttl_days),
            secure: options.secure_only,
            same_site: options.same_site,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A durable name/value medium with per-entry expiry.
///
/// Each call touches a single entry; there is no multi-entry transaction, so
/// callers that need all-or-nothing semantics must order their writes.
pub trait CookieStorage: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<String>>;
    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JarContents {
    #[serde(default)]
    cookies: BTreeMap<String, StoredCookie>,
}

impl JarContents {
    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.cookies.retain(|_, c| !c.is_expired(now));
    }

    fn get_live(&self, name: &str, now: DateTime<Utc>) -> Option<String> {
        self.cookies
            .get(name)
            .filter(|c| !c.is_expired(now))
            .map(|c| c.value.clone())
    }
}

/// Cookie jar persisted as JSON in the per-user data directory.
///
/// Every mutation rewrites the file through a temporary sibling and an atomic
/// rename, so a concurrent reader sees either the old or the new jar. The file
/// is created owner-only regardless of the entries' `secure` flag.
pub struct FileCookieJar {
    path: PathBuf,
}

impl FileCookieJar {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self {
            path: storage_dir.join(COOKIE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<JarContents> {
        if !self.path.exists() {
            return Ok(JarContents::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cookie jar: {}", self.path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse cookie jar")
    }

    /// Like `load`, but a jar that fails to parse is moved aside to
    /// `cookies.bad` and replaced by an empty one.
    fn load_or_reset(&self) -> Result<JarContents> {
        match self.load() {
            Ok(jar) => Ok(jar),
            Err(e) if e.downcast_ref::<serde_json::Error>().is_some() => {
                warn!(error = %e, "Unreadable cookie jar, renaming to .bad");
                let bad = self.path.with_extension("bad");
                if let Err(e) = std::fs::rename(&self.path, &bad) {
                    warn!(error = %e, "Failed to move unreadable cookie jar aside");
                }
                Ok(JarContents::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Write through an owner-only temporary sibling, then rename over the jar.
    fn persist(&self, jar: &JarContents) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        // A leftover temp file would keep its old mode
        let _ = std::fs::remove_file(&tmp);

        let file = {
            let mut opts = std::fs::OpenOptions::new();
            opts.create(true).truncate(true).write(true);

            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                opts.mode(0o600);
            }

            opts.open(&tmp)
                .with_context(|| format!("Failed to write cookie jar: {}", tmp.display()))?
        };
        serde_json::to_writer_pretty(&file, jar)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, &self.path).context("Failed to replace cookie jar")?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut JarContents)) -> Result<()> {
        let mut jar = self.load_or_reset()?;
        jar.purge_expired(Utc::now());
        f(&mut jar);
        self.persist(&jar)
    }
}

impl CookieStorage for FileCookieJar {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.load()?.get_live(name, Utc::now()))
    }

    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        debug!(name, secure = options.secure_only, "Setting cookie");
        let cookie = StoredCookie::new(value, options, Utc::now());
        self.update(|jar| {
            jar.cookies.insert(name.to_string(), cookie);
        })
    }

    fn remove(&self, name: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|jar| {
            jar.cookies.remove(name);
        })
    }
}

/// In-process jar for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<BTreeMap<String, StoredCookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry including attributes, ignoring expiry
    pub fn entry(&self, name: &str) -> Option<StoredCookie> {
        self.cookies.lock().ok()?.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.cookies.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StoredCookie>>> {
        self.cookies
            .lock()
            .map_err(|_| anyhow::anyhow!("Cookie jar lock poisoned"))
    }
}

impl CookieStorage for MemoryCookieJar {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let now = Utc::now();
        Ok(self
            .lock()?
            .get(name)
            .filter(|c| !c.is_expired(now))
            .map(|c| c.value.clone()))
    }

    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        let cookie = StoredCookie::new(value, options, Utc::now());
        self.lock()?.insert(name.to_string(), cookie);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
