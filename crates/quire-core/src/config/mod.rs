//! Client configuration.
//!
//! Values come from a JSON file, then environment overrides. Only public
//! endpoints and keys belong here; session access tokens never do.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "QUIRE_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "QUIRE_SUPABASE_ANON_KEY";
pub const ENV_SYNC_INTERVAL_SECS: &str = "QUIRE_SYNC_INTERVAL_SECS";
pub const ENV_DB_PATH: &str = "QUIRE_DB_PATH";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QuireConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Connection details for the Supabase project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub anon_key: String,
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

impl Default for QuireConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            database_path: None,
        }
    }
}

impl QuireConfig {
    /// Load the config file at `path`, falling back to defaults if it does not exist
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))
    }

    /// Parse and validate a JSON payload
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| Error::Config(format!("invalid config JSON: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QUIRE_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the `QUIRE_*` variable names
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(ENV_SUPABASE_URL)) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_SYNC_INTERVAL_SECS)) {
            self.sync_interval_secs = raw.parse().map_err(|_| {
                Error::Config(format!("{ENV_SYNC_INTERVAL_SECS} must be a whole number of seconds"))
            })?;
        }
        if let Some(path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.database_path = Some(PathBuf::from(path));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync_interval_secs == 0 {
            return Err(Error::Config(
                "sync_interval_secs must be at least 1".to_string(),
            ));
        }
        self.remote().map(|_| ())
    }

    /// Remote connection details, if a remote is configured.
    ///
    /// URL and anon key must be set together.
    pub fn remote(&self) -> Result<Option<RemoteSettings>> {
        let url = normalize_text_option(self.supabase_url.clone());
        let anon_key = normalize_text_option(self.supabase_anon_key.clone());
        match (url, anon_key) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => {
                if !is_http_url(&url) {
                    return Err(Error::Config(
                        "supabase_url must include http:// or https://".to_string(),
                    ));
                }
                Ok(Some(RemoteSettings {
                    url: url.trim_end_matches('/').to_string(),
                    anon_key,
                }))
            }
            (Some(_), None) => Err(Error::Config(
                "supabase_anon_key is required when supabase_url is set".to_string(),
            )),
            (None, Some(_)) => Err(Error::Config(
                "supabase_url is required when supabase_anon_key is set".to_string(),
            )),
        }
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}
