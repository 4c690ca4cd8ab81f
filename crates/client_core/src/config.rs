use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

use crate::http::HistoryFallback;

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub database_url: String,
    pub stale_call_threshold_secs: u64,
    pub reaper_interval_secs: u64,
    pub voice_ready_interval_secs: u64,
    pub history_page_size: u32,
    pub history_fallback: HistoryFallback,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".into(),
            database_url: "sqlite://./data/callguard.db".into(),
            stale_call_threshold_secs: 600,
            reaper_interval_secs: 60,
            voice_ready_interval_secs: 30,
            history_page_size: 50,
            history_fallback: HistoryFallback::Empty,
        }
    }
}

impl ClientSettings {
    pub fn stale_call_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_call_threshold_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    pub fn voice_ready_interval(&self) -> Duration {
        Duration::from_secs(self.voice_ready_interval_secs.max(1))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid api base url '{}'", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api base url must be http or https, got '{}'", url.scheme());
        }
        if self.history_page_size == 0 {
            bail!("history_page_size must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_base_url: Option<String>,
    database_url: Option<String>,
    stale_call_threshold_secs: Option<u64>,
    reaper_interval_secs: Option<u64>,
    voice_ready_interval_secs: Option<u64>,
    history_page_size: Option<u32>,
    history_fallback: Option<HistoryFallback>,
}

/// Defaults, then `client.toml` in the working directory, then environment overrides.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        apply_file_config(&mut settings, file_cfg);
    }

    apply_env_overrides(&mut settings, env)?;
    settings.validate()?;
    Ok(settings)
}

fn apply_file_config(settings: &mut ClientSettings, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.stale_call_threshold_secs {
        settings.stale_call_threshold_secs = v;
    }
    if let Some(v) = file_cfg.reaper_interval_secs {
        settings.reaper_interval_secs = v;
    }
    if let Some(v) = file_cfg.voice_ready_interval_secs {
        settings.voice_ready_interval_secs = v;
    }
    if let Some(v) = file_cfg.history_page_size {
        settings.history_page_size = v;
    }
    if let Some(v) = file_cfg.history_fallback {
        settings.history_fallback = v;
    }
}

/// Later keys win, so `APP__*` overrides the shorter legacy names.
pub fn apply_env_overrides(
    settings: &mut ClientSettings,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    for key in ["CALLGUARD_API_URL", "APP__API_BASE_URL"] {
        if let Some(v) = env(key) {
            settings.api_base_url = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    if let Some(v) = env("APP__STALE_CALL_THRESHOLD_SECS") {
        settings.stale_call_threshold_secs = parse_env("APP__STALE_CALL_THRESHOLD_SECS", &v)?;
    }
    if let Some(v) = env("APP__REAPER_INTERVAL_SECS") {
        settings.reaper_interval_secs = parse_env("APP__REAPER_INTERVAL_SECS", &v)?;
    }
    if let Some(v) = env("APP__VOICE_READY_INTERVAL_SECS") {
        settings.voice_ready_interval_secs = parse_env("APP__VOICE_READY_INTERVAL_SECS", &v)?;
    }
    if let Some(v) = env("APP__HISTORY_PAGE_SIZE") {
        settings.history_page_size = parse_env("APP__HISTORY_PAGE_SIZE", &v)?;
    }
    if let Some(v) = env("APP__HISTORY_FALLBACK") {
        settings.history_fallback = v.parse().map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid value '{value}' for {key}: {err}"))
}

/// Accepts bare paths and `sqlite:` forms; `Storage::new` creates the parent directory.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return ClientSettings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
