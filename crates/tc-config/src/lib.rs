//! # tc-config
//!
//! Runtime settings, read from the process environment (and an optional
//! `.env` file). Variable names match the earlier deployment so
//! existing compose files keep working.

use config::{Config, Environment, Map};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 7.0; SM-G892A Build/NRD90M; wv) \
AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/67.0.3396.87 Mobile Safari/537.36";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("invalid settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unreadable .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

fn dotenv_result<T>(result: Result<T, dotenvy::Error>) -> Result<(), SettingsError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Reads `.env` from the working directory (or a parent) into the process
/// environment. A missing file is not an error.
///
/// Call this before [`Settings::load`]. The result is returned rather than
/// logged, since the logger is configured from the settings.
pub fn load_dotenv() -> Result<(), SettingsError> {
    dotenv_result(dotenvy::dotenv())
}

pub fn load_dotenv_from(path: impl AsRef<Path>) -> Result<(), SettingsError> {
    dotenv_result(dotenvy::from_path(path))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Board (gallery) to archive. The crawler does not start without it.
    pub gallery_id: Option<String>,
    /// Seconds between crawl cycles.
    pub delay: u64,
    /// Post ids requested per discovery.
    pub recent_count: usize,
    /// Seconds between archiving a post and re-checking it.
    pub verify_delay: u64,
    pub database_url: String,
    pub bind_addr: String,
    pub public_dir: String,
    pub image_host: String,
    pub mobile_host: String,
    pub user_agent: String,
    pub debug: bool,
}

impl Settings {
    /// Loads the process environment (see [`load_dotenv`]).
    pub fn load() -> Result<Self, SettingsError> {
        Self::from_environment(None)
    }

    /// Builds settings from an explicit variable map instead of the process
    /// environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_environment(Some(map))
    }

    fn from_environment(source: Option<Map<String, String>>) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .set_default("delay", 5)?
            .set_default("recent_count", 10)?
            .set_default("verify_delay", 1800)?
            .set_default("database_url", "sqlite:./data/trash.db?mode=rwc")?
            .set_default("bind_addr", "0.0.0.0:8000")?
            .set_default("public_dir", "public")?
            .set_default("image_host", "images.dcinside.com")?
            .set_default("mobile_host", "m.dcinside.com")?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("debug", false)?
            .add_source(Environment::default().try_parsing(true).source(source))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// The configured board id, if present and not blank.
    pub fn board_id(&self) -> Option<&str> {
        self.gallery_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.delay)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_secs(self.verify_delay)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
