use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use snafu::{Location, ResultExt, Snafu};
use url::Url;

use crate::model::FileId;
use crate::service::autosave::AutosaveSettings;
use crate::service::backend::{BackendError, Credentials, HttpBackend, PollSettings};
use crate::service::cache::LocalCache;

const PREFIX: &str = "SPEAKON_";

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("could not read the `{PREFIX}*` environment variables: {source}"))]
    Load {
        source: envy::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Settings read from `SPEAKON_*` environment variables, `.env` included.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// the deck to rehearse
    pub file_id: FileId,
    pub page_count: u32,

    #[serde(default = "default_api_url")]
    pub api_url: Url,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_status_display_secs")]
    pub status_display_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: usize,
}

fn default_api_url() -> Url {
    Url::parse("http://localhost:8080/api").expect("the default api url is valid")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".speakon/scripts.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_status_display_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_max_attempts() -> usize {
    30
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        envy::prefixed(PREFIX).from_env().context(LoadSnafu)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(PREFIX).from_iter(vars).context(LoadSnafu)
    }

    pub fn autosave(&self) -> AutosaveSettings {
        AutosaveSettings::new(
            Duration::from_millis(self.debounce_ms),
            Duration::from_secs(self.status_display_secs),
        )
    }

    pub fn polling(&self) -> PollSettings {
        PollSettings::new(
            Duration::from_millis(self.poll_interval_ms),
            self.poll_max_attempts,
        )
    }

    pub fn credentials(&self) -> Arc<Credentials> {
        Arc::new(Credentials::new(
            self.access_token.clone(),
            self.refresh_token.clone(),
        ))
    }

    pub fn backend(&self) -> Result<HttpBackend, BackendError> {
        HttpBackend::new(&self.api_url, self.credentials())
    }

    pub async fn cache(&self) -> LocalCache {
        LocalCache::open(&self.cache_path).await
    }
}
