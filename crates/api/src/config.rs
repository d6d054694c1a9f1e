//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string; the in-memory store is used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `AUTH_TOKENS`: comma-separated `token:user_id:role` entries
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub auth_tokens: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            auth_tokens: non_empty("AUTH_TOKENS"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            auth_tokens: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 10);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:8080");
        assert!(config.auth_tokens.is_none());
    }

    #[test]
    fn test_values_are_read() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("AUTH_TOKENS", "t:1:admin"),
        ]);
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
        assert_eq!(config.database_max_connections, 4);
        assert_eq!(config.auth_tokens.as_deref(), Some("t:1:admin"));
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let config = from_pairs(&[("PORT", "http"), ("DATABASE_MAX_CONNECTIONS", "0")]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_max_connections, 10);
    }

    #[test]
    fn test_blank_database_url_is_unset() {
        let config = from_pairs(&[("DATABASE_URL", "  ")]);
        assert!(config.database_url.is_none());
    }
}
