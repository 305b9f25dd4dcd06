//! Configuration module for the site backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key identifying the single admin (required in production)
    pub admin_psk: Option<String>,
    /// Path to SQLite database file backing the document store
    pub db_path: PathBuf,
    /// Directory where uploaded assets are written
    pub asset_dir: PathBuf,
    /// URL prefix under which uploaded assets are served
    pub asset_base_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Upper bound for every store and upload call
    pub store_timeout: Duration,
    /// Period of the documentation carousel auto-advance
    pub carousel_interval: Duration,
    /// Inline edit sessions untouched for this long are dropped
    pub edit_idle_timeout: Duration,
    /// Word limit for activity card descriptions
    pub excerpt_words: usize,
    /// Character limit for post card descriptions
    pub excerpt_chars: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let admin_psk = env::var("ORGSITE_ADMIN_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("ORGSITE_DB_PATH")
            .unwrap_or_else(|_| "./data/site.sqlite".to_string())
            .into();

        let asset_dir = env::var("ORGSITE_ASSET_DIR")
            .unwrap_or_else(|_| "./data/assets".to_string())
            .into();

        let asset_base_url = env::var("ORGSITE_ASSET_BASE_URL")
            .unwrap_or_else(|_| "/assets".to_string())
            .trim_end_matches('/')
            .to_string();

        let bind_addr = env::var("ORGSITE_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid ORGSITE_BIND_ADDR format");

        let log_level = env::var("ORGSITE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let store_timeout = parse_millis("ORGSITE_STORE_TIMEOUT_MS", 10_000);
        let carousel_interval = parse_millis("ORGSITE_CAROUSEL_INTERVAL_MS", 4_000);
        let edit_idle_timeout = parse_millis("ORGSITE_EDIT_IDLE_MS", 30 * 60 * 1000);
        let excerpt_words = parse_var("ORGSITE_EXCERPT_WORDS", 50);
        let excerpt_chars = parse_var("ORGSITE_EXCERPT_CHARS", 120);

        Self {
            admin_psk,
            db_path,
            asset_dir,
            asset_base_url,
            bind_addr,
            log_level,
            store_timeout,
            carousel_interval,
            edit_idle_timeout,
            excerpt_words,
            excerpt_chars,
        }
    }
}

/// Parse a numeric variable, panicking at startup on malformed input.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("Invalid {} value: {}", name, raw)),
        Err(_) => default,
    }
}

/// Parse a period in milliseconds. Zero is rejected along with malformed input.
fn parse_millis(name: &str, default_ms: u64) -> Duration {
    millis_from(name, env::var(name).ok().as_deref(), default_ms)
}

fn millis_from(name: &str, raw: Option<&str>, default_ms: u64) -> Duration {
    let ms = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .unwrap_or_else(|_| panic!("Invalid {} value: {}", name, raw)),
        None => default_ms,
    };
    if ms == 0 {
        panic!("{} must be greater than zero", name);
    }
    Duration::from_millis(ms)
}
