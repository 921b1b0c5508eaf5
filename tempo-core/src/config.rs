use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::ClientError,
    model::Units,
    provider::ProviderId,
    retry::{DEFAULT_BACKOFF_BASE_MS, DEFAULT_RETRIES, RetryPolicy},
};

pub const DEFAULT_FORECAST_DAYS: u8 = 7;
pub const MAX_FORECAST_DAYS: u8 = 16;

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Request and retry settings shared by all providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub retries: u32,
    pub backoff_base_ms: u64,
    pub forecast_days: u8,
    pub language: Option<String>,
    pub units: Units,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            forecast_days: DEFAULT_FORECAST_DAYS,
            language: None,
            units: Units::Metric,
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "open-meteo" or "weatherstack".
    pub default_provider: Option<String>,

    /// Example TOML:
    /// [providers.weatherstack]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Example TOML:
    /// [client]
    /// retries = 3
    /// units = "metric"
    #[serde(default)]
    pub client: ClientSettings,
}

impl Config {
    /// The default provider; Open-Meteo when none was chosen, since it needs no key.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        match self.default_provider.as_deref() {
            Some(s) => ProviderId::try_from(s),
            None => Ok(ProviderId::OpenMeteo),
        }
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "tempo", "tempo")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key() || self.provider_api_key(provider_id).is_some()
    }

    /// Options for a client talking to `provider`, from the stored settings.
    pub fn client_options(&self, provider: ProviderId) -> ClientOptions {
        ClientOptions {
            provider,
            access_key: self.provider_api_key(provider).map(str::to_owned),
            retries: self.client.retries,
            backoff_base_ms: self.client.backoff_base_ms,
            forecast_days: self.client.forecast_days,
            language: self.client.language.clone(),
            units: self.client.units,
        }
    }
}

/// Everything a [`WeatherClient`](crate::WeatherClient) needs to know.
#[derive(Clone, PartialEq)]
pub struct ClientOptions {
    pub provider: ProviderId,
    /// Required by Weatherstack, ignored by Open-Meteo.
    pub access_key: Option<String>,
    /// Retries after the first attempt.
    pub retries: u32,
    pub backoff_base_ms: u64,
    pub forecast_days: u8,
    pub language: Option<String>,
    pub units: Units,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Config::default().client_options(ProviderId::OpenMeteo)
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("provider", &self.provider)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("retries", &self.retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("forecast_days", &self.forecast_days)
            .field("language", &self.language)
            .field("units", &self.units)
            .finish()
    }
}

impl ClientOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.backoff_base_ms)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if !(1..=MAX_FORECAST_DAYS).contains(&self.forecast_days) {
            return Err(ClientError::configuration(format!(
                "forecast_days must be between 1 and {MAX_FORECAST_DAYS}, got {}",
                self.forecast_days
            )));
        }
        Ok(())
    }
}
