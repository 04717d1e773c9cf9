//! Configuration for flaskbot
//!
//! All secrets and tunables are injected via environment variables at
//! runtime; the source code contains no secrets. See spec.md §6 for the
//! recognized set.

use anyhow::{bail, Context, Result};

/// Default session window (turns retained per session)
pub const DEFAULT_SESSION_WINDOW: usize = 3;

/// Default session TTL in minutes
pub const DEFAULT_SESSION_TTL_MIN: i64 = 60;

/// Default HTTP bind port
pub const DEFAULT_PORT: u16 = 8000;

/// Default path to the line-delimited catalog record file
pub const DEFAULT_CATALOG_PATH: &str = "data/catalog.jsonl";

/// Default outlet connection pool size
pub const DEFAULT_DB_POOL_SIZE: u32 = 10;

/// Default language-model rate-limit bucket (requests/minute)
pub const DEFAULT_LLM_RATE_LIMIT_PER_MINUTE: u32 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    /// Port to bind the HTTP server on
    pub port: u16,

    /// Credential for the language-model RPC
    pub llm_api_key: String,

    /// Base URL for the language-model provider (OpenAI-compatible)
    pub llm_base_url: String,

    /// Outlet store connection string (Postgres)
    pub sql_url: String,

    /// Outlet store service-role credential, required alongside `sql_url`
    /// per spec.md §6; applied as the Postgres connection's password so a
    /// managed endpoint's connection string can omit embedding it
    pub sql_key: String,

    /// Comma-separated CORS allow-list; empty means no cross-origin access
    pub cors_origins: Vec<String>,

    /// Session window W (max turns retained per session)
    pub session_window: usize,

    /// Session TTL in minutes before eviction
    pub session_ttl_min: i64,

    /// Path to the line-delimited catalog record file loaded at startup
    pub catalog_path: String,

    /// Known city/state tokens used by the planner to recognize a
    /// location mention (spec.md §4.5)
    pub known_locations: Vec<String>,

    /// Outlet store connection pool size
    pub db_pool_size: u32,

    /// Language-model rate-limit bucket, requests per minute
    pub llm_rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .context("Invalid PORT")?,

            llm_api_key: std::env::var("LLM_API_KEY").context("LLM_API_KEY is required")?,

            llm_base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),

            sql_url: std::env::var("SQL_URL").context("SQL_URL is required")?,

            sql_key: std::env::var("SQL_KEY").context("SQL_KEY is required")?,

            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            session_window: std::env::var("SESSION_WINDOW")
                .unwrap_or_else(|_| DEFAULT_SESSION_WINDOW.to_string())
                .parse()
                .context("Invalid SESSION_WINDOW")?,

            session_ttl_min: std::env::var("SESSION_TTL_MIN")
                .unwrap_or_else(|_| DEFAULT_SESSION_TTL_MIN.to_string())
                .parse()
                .context("Invalid SESSION_TTL_MIN")?,

            catalog_path: std::env::var("CATALOG_PATH")
                .unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string()),

            known_locations: std::env::var("KNOWN_LOCATIONS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            db_pool_size: std::env::var("DB_POOL_SIZE")
                .unwrap_or_else(|_| DEFAULT_DB_POOL_SIZE.to_string())
                .parse()
                .context("Invalid DB_POOL_SIZE")?,

            llm_rate_limit_per_minute: std::env::var("LLM_RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| DEFAULT_LLM_RATE_LIMIT_PER_MINUTE.to_string())
                .parse()
                .context("Invalid LLM_RATE_LIMIT_PER_MINUTE")?,
        })
    }

    /// Validate invariants that a naive env parse wouldn't catch
    pub fn validate(&self) -> Result<()> {
        if self.llm_api_key.trim().is_empty() {
            bail!("LLM_API_KEY must not be empty");
        }
        if self.sql_url.trim().is_empty() {
            bail!("SQL_URL must not be empty");
        }
        if self.db_pool_size == 0 {
            bail!("DB_POOL_SIZE must be at least 1");
        }
        if self.llm_rate_limit_per_minute == 0 {
            bail!("LLM_RATE_LIMIT_PER_MINUTE must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "PORT",
            "LLM_API_KEY",
            "LLM_BASE_URL",
            "SQL_URL",
            "SQL_KEY",
            "CORS_ORIGINS",
            "SESSION_WINDOW",
            "SESSION_TTL_MIN",
            "CATALOG_PATH",
            "KNOWN_LOCATIONS",
            "DB_POOL_SIZE",
            "LLM_RATE_LIMIT_PER_MINUTE",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults_applied() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("LLM_API_KEY", "test-key");
        std::env::set_var("SQL_URL", "postgres://localhost/outlets");
        std::env::set_var("SQL_KEY", "test-sql-key");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.session_window, DEFAULT_SESSION_WINDOW);
        assert_eq!(config.session_ttl_min, DEFAULT_SESSION_TTL_MIN);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.catalog_path, DEFAULT_CATALOG_PATH);
        assert!(config.known_locations.is_empty());
        assert_eq!(config.db_pool_size, DEFAULT_DB_POOL_SIZE);
        assert_eq!(config.llm_rate_limit_per_minute, DEFAULT_LLM_RATE_LIMIT_PER_MINUTE);
        clear_env();
    }

    #[test]
    fn test_missing_required_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_cors_origins_parsed() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("LLM_API_KEY", "test-key");
        std::env::set_var("SQL_URL", "postgres://localhost/outlets");
        std::env::set_var("SQL_KEY", "test-sql-key");
        std::env::set_var("CORS_ORIGINS", "https://a.example, https://b.example");

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        clear_env();
    }

    #[test]
    fn test_known_locations_parsed() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("LLM_API_KEY", "test-key");
        std::env::set_var("SQL_URL", "postgres://localhost/outlets");
        std::env::set_var("SQL_KEY", "test-sql-key");
        std::env::set_var("KNOWN_LOCATIONS", "Selangor, Kuala Lumpur, Penang");

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.known_locations,
            vec!["Selangor", "Kuala Lumpur", "Penang"]
        );
        clear_env();
    }

    #[test]
    fn test_zero_rate_limit_fails_validation() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("LLM_API_KEY", "test-key");
        std::env::set_var("SQL_URL", "postgres://localhost/outlets");
        std::env::set_var("SQL_KEY", "test-sql-key");
        std::env::set_var("LLM_RATE_LIMIT_PER_MINUTE", "0");

        let config = Config::from_env().unwrap();
        assert!(config.validate().is_err());
        clear_env();
    }
}
