// Server configuration.
//
// Environment variables with defaults for local development. The process
// environment is authoritative; no `.env` file is read.

use std::{net::SocketAddr, time::Duration};

use crate::db::pool::PoolConfig;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Core server configuration.
///
/// Constructed via [`ServerConfig::from_env`] which reads environment
/// variables and falls back to development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Log filter directive (e.g. `info`, `folio_server=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Upper bound for every storage call.
    pub storage_timeout: Duration,
    /// Shared secret the gateway presents as a bearer token.
    pub gateway_token: Option<String>,
    pub pool: PoolConfig,
    /// Reject PostgreSQL URLs that do not require TLS.
    pub require_tls: bool,
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `FOLIO_HOST` | `0.0.0.0` |
    /// | `FOLIO_PORT` | `3000` |
    /// | `FOLIO_DATABASE_URL` | *(none: in-memory store)* |
    /// | `FOLIO_LOG_FILTER` | `info` |
    /// | `FOLIO_LOG_FORMAT` | `text` |
    /// | `FOLIO_STORAGE_TIMEOUT_SECS` | `8` |
    /// | `FOLIO_GATEWAY_TOKEN` | *(none: no bearer check)* |
    /// | `FOLIO_DB_MIN_CONNECTIONS` | `2` |
    /// | `FOLIO_DB_MAX_CONNECTIONS` | `20` |
    /// | `FOLIO_DB_ACQUIRE_TIMEOUT_SECS` | `10` |
    /// | `FOLIO_DB_REQUIRE_TLS` | `false` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    pub fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("FOLIO_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("FOLIO_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_PORT);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let database_url = env("FOLIO_DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
        let log_filter = env("FOLIO_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_format = match env("FOLIO_LOG_FORMAT").as_deref().map(str::trim) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let storage_timeout_secs = env("FOLIO_STORAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_STORAGE_TIMEOUT_SECS);

        let gateway_token = env("FOLIO_GATEWAY_TOKEN").ok().filter(|token| !token.is_empty());
        let require_tls = env("FOLIO_DB_REQUIRE_TLS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            listen_addr,
            database_url,
            log_filter,
            log_format,
            storage_timeout: Duration::from_secs(storage_timeout_secs),
            gateway_token,
            pool: PoolConfig::from_env_fn(&env),
            require_tls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from_map(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        move |key: &str| map.get(key).map(|v| v.to_string()).ok_or(std::env::VarError::NotPresent)
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let cfg = ServerConfig::from_env_fn(env_from_map(HashMap::new()));
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:3000");
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert_eq!(cfg.storage_timeout, Duration::from_secs(8));
        assert!(cfg.gateway_token.is_none());
        assert_eq!(cfg.pool.max_connections, 20);
        assert!(!cfg.require_tls);
    }

    #[test]
    fn custom_host_and_port() {
        let mut m = HashMap::new();
        m.insert("FOLIO_HOST", "127.0.0.1");
        m.insert("FOLIO_PORT", "8088");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:8088");
    }

    #[test]
    fn invalid_port_uses_default() {
        let mut m = HashMap::new();
        m.insert("FOLIO_PORT", "not_a_number");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.port(), 3000);
    }

    #[test]
    fn json_log_format_and_filter() {
        let mut m = HashMap::new();
        m.insert("FOLIO_LOG_FORMAT", "JSON");
        m.insert("FOLIO_LOG_FILTER", "folio_server=debug");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.log_filter, "folio_server=debug");
    }

    #[test]
    fn zero_storage_timeout_falls_back_to_default() {
        let mut m = HashMap::new();
        m.insert("FOLIO_STORAGE_TIMEOUT_SECS", "0");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.storage_timeout, Duration::from_secs(8));

        let mut m = HashMap::new();
        m.insert("FOLIO_STORAGE_TIMEOUT_SECS", "3");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.storage_timeout, Duration::from_secs(3));
    }

    #[test]
    fn database_and_gateway_settings() {
        let mut m = HashMap::new();
        m.insert("FOLIO_DATABASE_URL", "postgres://u:p@host/folio");
        m.insert("FOLIO_GATEWAY_TOKEN", "s3cret");
        m.insert("FOLIO_DB_REQUIRE_TLS", "true");
        m.insert("FOLIO_DB_MIN_CONNECTIONS", "1");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://u:p@host/folio"));
        assert_eq!(cfg.gateway_token.as_deref(), Some("s3cret"));
        assert!(cfg.require_tls);
        assert_eq!(cfg.pool.min_connections, 1);
    }

    #[test]
    fn blank_database_url_means_memory_store() {
        let mut m = HashMap::new();
        m.insert("FOLIO_DATABASE_URL", "  ");
        let cfg = ServerConfig::from_env_fn(env_from_map(m));
        assert!(cfg.database_url.is_none());
    }
}
