//! Configuration module for the school tracker.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WIKI_API_URL: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = "school-wiki-tracker/0.1";
pub const DEFAULT_REVISIONS_CUTOFF: &str = "2022-01-01T00:00:00Z";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Optional newline-separated list of school names to seed at startup
    pub seed_file: Option<PathBuf>,
    /// When the nightly sync runs
    pub schedule: SyncSchedule,
    /// Remote MediaWiki API settings
    pub wiki: WikiConfig,
}

/// Sync cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSchedule {
    /// Once a day at the given UTC hour
    Daily { hour: u32 },
    /// Every N seconds, for debugging
    Every(Duration),
}

/// Settings for the MediaWiki action API client.
#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    /// Oldest revision timestamp requested (`rvend`)
    pub revisions_cutoff: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_WIKI_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
            revisions_cutoff: DEFAULT_REVISIONS_CUTOFF.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("SCHOOLS_DB_PATH")
            .unwrap_or_else(|_| "./data/schools.sqlite".to_string())
            .into();

        let bind_addr = env::var("SCHOOLS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid SCHOOLS_BIND_ADDR format");

        let log_level = env::var("SCHOOLS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let seed_file = env::var("SCHOOLS_SEED_FILE").ok().map(PathBuf::from);

        let schedule = match env_parse::<u64>("SCHOOLS_SYNC_INTERVAL_SECS") {
            Some(secs) if secs > 0 => SyncSchedule::Every(Duration::from_secs(secs)),
            _ => SyncSchedule::Daily {
                hour: env_parse::<u32>("SCHOOLS_SYNC_HOUR")
                    .filter(|hour| *hour < 24)
                    .unwrap_or(1),
            },
        };

        let defaults = WikiConfig::default();
        let wiki = WikiConfig {
            api_url: env::var("WIKI_API_URL").unwrap_or(defaults.api_url),
            user_agent: env::var("WIKI_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout_ms: env_parse("WIKI_HTTP_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            revisions_cutoff: env::var("WIKI_REVISIONS_CUTOFF")
                .unwrap_or(defaults.revisions_cutoff),
        };

        Self {
            db_path,
            bind_addr,
            log_level,
            seed_file,
            schedule,
            wiki,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
