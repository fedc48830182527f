//! Store configuration resolution.
//!
//! Unusable settings never abort startup: each one is replaced by its default
//! and reported as a `ConfigError` for the caller to log.

use netguard_store::StoreConfig;
use thiserror::Error;

use crate::cli::StoreArgs;
use crate::logger::Logger;

/// A setting that could not be used and was replaced by its default.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database host '{0}' is not local; the embedded store uses 'localhost'")]
    RemoteHost(String),

    #[error("invalid database name '{0}'; using 'netguard_db'")]
    InvalidDatabaseName(String),

    #[error("busy timeout must be at least 1 ms; using {0} ms")]
    ZeroBusyTimeout(u64),
}

/// Build the store configuration from CLI and environment settings.
pub fn resolve(args: &StoreArgs) -> (StoreConfig, Vec<ConfigError>) {
    let defaults = StoreConfig::default();
    let mut errors = Vec::new();

    let host = if StoreConfig::is_local_host(&args.host) {
        args.host.trim().to_string()
    } else {
        errors.push(ConfigError::RemoteHost(args.host.clone()));
        defaults.host.clone()
    };

    let database = if StoreConfig::is_valid_database_name(&args.database) {
        args.database.trim().to_string()
    } else {
        errors.push(ConfigError::InvalidDatabaseName(args.database.clone()));
        defaults.database.clone()
    };

    let busy_timeout_ms = if args.busy_timeout_ms == 0 {
        errors.push(ConfigError::ZeroBusyTimeout(defaults.busy_timeout_ms));
        defaults.busy_timeout_ms
    } else {
        args.busy_timeout_ms
    };

    let config = StoreConfig {
        host,
        user: args.user.clone(),
        password: args.password.clone(),
        database,
        data_dir: args.data_dir.clone(),
        busy_timeout_ms,
    };
    (config, errors)
}

/// Resolve and log every fallback as a warning.
pub fn resolve_logged<L: Logger + ?Sized>(args: &StoreArgs, logger: &L) -> StoreConfig {
    let (config, errors) = resolve(args);
    for e in &errors {
        logger.warn(&format!("config: {}", e));
    }
    logger.debug(&format!("store: {}", config.describe()));
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{Level, MockLogger};
    use std::path::PathBuf;

    fn args() -> StoreArgs {
        StoreArgs {
            host: "localhost".to_string(),
            user: "root".to_string(),
            password: "hunter2".to_string(),
            database: "netguard_db".to_string(),
            data_dir: PathBuf::from("/var/lib/netguard"),
            busy_timeout_ms: 5000,
        }
    }

    #[test]
    fn test_resolve_defaults_clean() {
        let (config, errors) = resolve(&args());
        assert!(errors.is_empty());
        assert_eq!(config.host, "localhost");
        assert_eq!(config.password, "hunter2");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/netguard/netguard_db.sqlite3")
        );
    }

    #[test]
    fn test_remote_host_falls_back() {
        let (config, errors) = resolve(&StoreArgs {
            host: "db.example.com".to_string(),
            ..args()
        });
        assert_eq!(config.host, "localhost");
        assert_eq!(errors, vec![ConfigError::RemoteHost("db.example.com".to_string())]);
    }

    #[test]
    fn test_loopback_host_accepted() {
        let (config, errors) = resolve(&StoreArgs {
            host: " 127.0.0.1 ".to_string(),
            ..args()
        });
        assert!(errors.is_empty());
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_database_name_falls_back() {
        let (config, errors) = resolve(&StoreArgs {
            database: "../etc/passwd".to_string(),
            ..args()
        });
        assert_eq!(config.database, "netguard_db");
        assert_eq!(errors.len(), 1);

        let (config, errors) = resolve(&StoreArgs {
            database: "   ".to_string(),
            ..args()
        });
        assert_eq!(config.database, "netguard_db");
        assert!(matches!(errors[0], ConfigError::InvalidDatabaseName(_)));
    }

    #[test]
    fn test_zero_busy_timeout_falls_back() {
        let (config, errors) = resolve(&StoreArgs {
            busy_timeout_ms: 0,
            ..args()
        });
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(errors, vec![ConfigError::ZeroBusyTimeout(5000)]);
    }

    #[test]
    fn test_resolve_logged_warns_without_password() {
        let logger = MockLogger::new();
        let config = resolve_logged(
            &StoreArgs {
                host: "10.1.1.1".to_string(),
                ..args()
            },
            &logger,
        );
        assert_eq!(config.host, "localhost");
        assert_eq!(logger.messages_at_level(Level::Warn).len(), 1);
        assert!(logger.contains("10.1.1.1"));
        assert!(!logger.contains("hunter2"));
    }
}
