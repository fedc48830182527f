//! Store connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default database name.
pub const DEFAULT_DATABASE: &str = "netguard_db";

/// Default host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default user.
pub const DEFAULT_USER: &str = "root";

/// Default busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// File extension of the database file.
pub const DATABASE_EXTENSION: &str = "sqlite3";

/// Where the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file on disk.
    File(PathBuf),
    /// A private in-memory database. Every connection gets its own, so a
    /// reconnect starts empty.
    Memory,
}

impl StoreLocation {
    /// Human-readable form for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            StoreLocation::File(path) => path.display().to_string(),
            StoreLocation::Memory => ":memory:".to_string(),
        }
    }
}

/// Store connection parameters.
///
/// The store is embedded, so `host` must name the local machine and `database`
/// names the file under `data_dir`. `user` is informational.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub data_dir: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            data_dir: PathBuf::from("."),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .field("data_dir", &self.data_dir)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl StoreConfig {
    /// Path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.database, DATABASE_EXTENSION))
    }

    /// Location used by the sink.
    pub fn location(&self) -> StoreLocation {
        StoreLocation::File(self.database_path())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Whether `host` refers to this machine.
    pub fn is_local_host(host: &str) -> bool {
        matches!(
            host.trim().to_ascii_lowercase().as_str(),
            "" | "localhost" | "127.0.0.1" | "::1"
        )
    }

    /// Whether `name` can be used as a database file stem.
    pub fn is_valid_database_name(name: &str) -> bool {
        let name = name.trim();
        !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(&['/', '\\'][..])
            && !name.contains('\0')
    }

    /// One-line summary for logs. Never includes the password.
    pub fn describe(&self) -> String {
        format!(
            "{}@{} db={} path={}",
            self.user,
            self.host,
            self.database,
            self.database_path().display()
        )
    }
}
