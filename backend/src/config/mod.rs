//! Application configuration management

use std::env;

use anyhow::{Context, Result};

use crate::query::PageLimits;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (for generating URLs)
    pub host: Option<String>,

    /// Server port
    pub port: u16,

    /// SQLite database URL, `sqlite://` prefixed
    pub database_url: String,

    pub database_max_connections: u32,

    /// Base URL that stored files are served from
    pub storage_public_url: String,

    /// HS256 secret for bearer tokens. Without one every request is anonymous.
    pub jwt_secret: Option<String>,

    pub default_page_size: i64,

    pub max_page_size: i64,

    /// Insert the demo data set on startup
    pub seed_demo_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: 3001,
            database_url: "sqlite://./data/learnhub.db".to_string(),
            database_max_connections: 10,
            storage_public_url: "/storage".to_string(),
            jwt_secret: None,
            default_page_size: 10,
            max_page_size: 100,
            seed_demo_data: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        // Prefer DATABASE_PATH, fall back to DATABASE_URL
        let database_url = match env::var("DATABASE_PATH") {
            Ok(path) => format!("sqlite://{}", path.trim_start_matches("sqlite://")),
            Err(_) => env::var("DATABASE_URL").unwrap_or(defaults.database_url),
        };

        Ok(Self {
            host: env::var("HOST").ok(),

            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url,

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            storage_public_url: env::var("STORAGE_PUBLIC_URL")
                .unwrap_or(defaults.storage_public_url),

            jwt_secret: env::var("JWT_SECRET")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),

            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DEFAULT_PAGE_SIZE")?,

            max_page_size: env::var("MAX_PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("Invalid MAX_PAGE_SIZE")?,

            seed_demo_data: env::var("SEED_DEMO_DATA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_size: self.default_page_size.max(1),
            max_size: self.max_page_size.max(1),
        }
    }
}
