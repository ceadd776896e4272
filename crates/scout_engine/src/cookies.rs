//! Best-effort access to browser session cookies.
//!
//! Each browser store is a probe that may fail for any reason (not
//! installed, locked, encrypted). Failures are logged and the next probe is
//! tried; running out of probes means "no cookies", never an error.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_info, engine_warn};
use rusqlite::{Connection, OpenFlags};
use tempfile::{NamedTempFile, TempDir};
use thiserror::Error;

#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub name: String,
    pub value: String,
    pub path: String,
    pub secure: bool,
    /// Unix seconds; 0 for session cookies.
    pub expires: i64,
}

// Values are credentials; keep them out of logs.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet {
    cookies: Vec<Cookie>,
}

impl CookieSet {
    pub fn new(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// `name=value; name2=value2`, suitable for a `Cookie` request header.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        Some(pairs.join("; "))
    }

    /// Netscape cookie-jar text: one tab-separated line per cookie.
    pub fn to_cookie_jar(&self) -> String {
        let mut out = String::from("# Netscape HTTP Cookie File\n");
        for cookie in &self.cookies {
            let include_subdomains = if cookie.domain.starts_with('.') {
                "TRUE"
            } else {
                "FALSE"
            };
            let secure = if cookie.secure { "TRUE" } else { "FALSE" };
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                cookie.domain,
                include_subdomains,
                cookie.path,
                secure,
                cookie.expires.max(0),
                cookie.name,
                cookie.value
            ));
        }
        out
    }

    /// Writes the jar to a temporary file that is deleted when the returned
    /// handle is dropped.
    pub fn write_cookie_jar(&self) -> io::Result<CookieJarFile> {
        let mut file = tempfile::Builder::new()
            .prefix("scout-cookies-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(self.to_cookie_jar().as_bytes())?;
        file.flush()?;
        Ok(CookieJarFile { file })
    }
}

/// Scoped cookie-jar file. Dropping it removes the file.
#[derive(Debug)]
pub struct CookieJarFile {
    file: NamedTempFile,
}

impl CookieJarFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug, Error)]
pub enum CookieStoreError {
    #[error("cookie store not found")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One place cookies may come from. Implementations block; call them off
/// the async executor.
pub trait CookieSource: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self, domain: &str) -> Result<CookieSet, CookieStoreError>;
}

/// Folds the sources left to right and returns the first non-empty set.
pub fn harvest_cookies(sources: &[Box<dyn CookieSource>], domain: &str) -> CookieSet {
    for source in sources {
        match source.load(domain) {
            Ok(set) if !set.is_empty() => {
                engine_info!("Loaded {} cookies for {} from {}", set.len(), domain, source.name());
                return set;
            }
            Ok(_) => engine_debug!("No cookies for {} in {}", domain, source.name()),
            Err(err) => engine_warn!("{} cookies error: {}", source.name(), err),
        }
    }
    engine_info!("Continuing without cookies for {}", domain);
    CookieSet::default()
}

/// Chromium-family cookie store. Only rows with a plaintext `value` are
/// used; OS-encrypted values are skipped.
#[derive(Debug, Clone)]
pub struct ChromiumCookieStore {
    name: String,
    db_paths: Vec<PathBuf>,
}

impl ChromiumCookieStore {
    pub fn chrome() -> Self {
        Self {
            name: "Chrome".to_string(),
            db_paths: default_chrome_paths(),
        }
    }

    pub fn with_database(name: impl Into<String>, db_path: PathBuf) -> Self {
        Self {
            name: name.into(),
            db_paths: vec![db_path],
        }
    }
}

impl CookieSource for ChromiumCookieStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, domain: &str) -> Result<CookieSet, CookieStoreError> {
        let db_path = self
            .db_paths
            .iter()
            .find(|path| path.is_file())
            .ok_or(CookieStoreError::NotFound)?;
        let snapshot = DatabaseSnapshot::copy_of(db_path)?;
        let conn = snapshot.open()?;
        let mut stmt = conn.prepare(
            "SELECT host_key, name, value, path, is_secure, expires_utc FROM cookies \
             WHERE lower(host_key) = ?1 OR lower(host_key) LIKE '%.' || ?1",
        )?;
        let rows = stmt.query_map([bare_domain(domain)], |row| {
            Ok(Cookie {
                domain: row.get(0)?,
                name: row.get(1)?,
                value: row.get(2)?,
                path: row.get(3)?,
                secure: row.get::<_, i64>(4)? != 0,
                expires: chrome_time_to_unix(row.get(5)?),
            })
        })?;

        let mut cookies = Vec::new();
        for row in rows {
            let cookie = row?;
            if !cookie.value.is_empty() {
                cookies.push(cookie);
            }
        }
        Ok(CookieSet::new(cookies))
    }
}

/// Firefox cookie store; searches every profile for `cookies.sqlite`.
#[derive(Debug, Clone)]
pub struct FirefoxCookieStore {
    profile_roots: Vec<PathBuf>,
}

impl FirefoxCookieStore {
    pub fn new() -> Self {
        Self {
            profile_roots: default_firefox_roots(),
        }
    }

    pub fn with_profile_root(root: PathBuf) -> Self {
        Self {
            profile_roots: vec![root],
        }
    }

    fn databases(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for root in &self.profile_roots {
            let Ok(entries) = fs::read_dir(root) else {
                continue;
            };
            for entry in entries.flatten() {
                let candidate = entry.path().join("cookies.sqlite");
                if candidate.is_file() {
                    found.push(candidate);
                }
            }
        }
        found.sort();
        found
    }
}

impl Default for FirefoxCookieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieSource for FirefoxCookieStore {
    fn name(&self) -> &str {
        "Firefox"
    }

    fn load(&self, domain: &str) -> Result<CookieSet, CookieStoreError> {
        let databases = self.databases();
        if databases.is_empty() {
            return Err(CookieStoreError::NotFound);
        }

        let mut cookies = Vec::new();
        for db_path in databases {
            let snapshot = DatabaseSnapshot::copy_of(&db_path)?;
            let conn = snapshot.open()?;
            let mut stmt = conn.prepare(
                "SELECT host, name, value, path, isSecure, expiry FROM moz_cookies \
                 WHERE lower(host) = ?1 OR lower(host) LIKE '%.' || ?1",
            )?;
            let rows = stmt.query_map([bare_domain(domain)], |row| {
                Ok(Cookie {
                    domain: row.get(0)?,
                    name: row.get(1)?,
                    value: row.get(2)?,
                    path: row.get(3)?,
                    secure: row.get::<_, i64>(4)? != 0,
                    expires: row.get(5)?,
                })
            })?;
            for row in rows {
                cookies.push(row?);
            }
        }
        Ok(CookieSet::new(cookies))
    }
}

/// Browsers keep their store locked while running, so read a private copy.
struct DatabaseSnapshot {
    _dir: TempDir,
    path: PathBuf,
}

impl DatabaseSnapshot {
    fn copy_of(source: &Path) -> Result<Self, CookieStoreError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("cookies.sqlite");
        fs::copy(source, &path)?;
        Ok(Self { _dir: dir, path })
    }

    fn open(&self) -> Result<Connection, CookieStoreError> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(conn)
    }
}

/// Host keys match the domain itself or any subdomain of it.
fn bare_domain(domain: &str) -> String {
    domain.trim_start_matches('.').to_ascii_lowercase()
}

// Chromium stores microseconds since 1601-01-01.
fn chrome_time_to_unix(value: i64) -> i64 {
    const EPOCH_DELTA_SECS: i64 = 11_644_473_600;
    if value <= 0 {
        return 0;
    }
    (value / 1_000_000 - EPOCH_DELTA_SECS).max(0)
}

fn default_chrome_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(target_os = "windows") {
        if let Some(local) = dirs::data_local_dir() {
            let base = local.join("Google").join("Chrome").join("User Data").join("Default");
            paths.push(base.join("Network").join("Cookies"));
            paths.push(base.join("Cookies"));
        }
    } else if cfg!(target_os = "macos") {
        if let Some(support) = dirs::data_dir() {
            paths.push(support.join("Google").join("Chrome").join("Default").join("Cookies"));
        }
    } else if let Some(config) = dirs::config_dir() {
        for browser in ["google-chrome", "chromium"] {
            paths.push(config.join(browser).join("Default").join("Cookies"));
        }
    }
    paths
}

fn default_firefox_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if cfg!(target_os = "windows") {
        if let Some(roaming) = dirs::data_dir() {
            roots.push(roaming.join("Mozilla").join("Firefox").join("Profiles"));
        }
    } else if cfg!(target_os = "macos") {
        if let Some(support) = dirs::data_dir() {
            roots.push(support.join("Firefox").join("Profiles"));
        }
    } else if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".mozilla").join("firefox"));
    }
    roots
}

/// Default probe order: Chrome, then Firefox.
pub fn default_cookie_sources() -> Vec<Box<dyn CookieSource>> {
    vec![
        Box::new(ChromiumCookieStore::chrome()),
        Box::new(FirefoxCookieStore::new()),
    ]
}
