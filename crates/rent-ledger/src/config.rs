use anyhow::{Context, Result};
use rent_ledger_core::store::rest::DEFAULT_TABLE;
use rent_ledger_core::{AnalyticsWindow, RestConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/rent-ledger/config.json";
pub const DEFAULT_DATA_FILE: &str = "~/.local/share/rent-ledger/bills.json";
pub const DEFAULT_LOG_FILE: &str = "~/.local/state/rent-ledger/rent-ledger.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Supabase / PostgREST table
    Rest,
    /// Local JSON file
    File,
    /// In-memory, lost on exit
    Memory,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Rest => "rest",
            BackendKind::File => "file",
            BackendKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub table: String,
    pub timeout_secs: u64,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: DEFAULT_TABLE.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    pub rest: RestSettings,
    pub data_file: String,
    pub analytics_window: AnalyticsWindow,
    pub log_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: None,
            rest: RestSettings::default(),
            data_file: DEFAULT_DATA_FILE.to_string(),
            analytics_window: AnalyticsWindow::default(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

pub fn config_path(explicit: Option<&str>) -> PathBuf {
    expand_path(explicit.unwrap_or(DEFAULT_CONFIG_PATH))
}

impl AppConfig {
    /// Reads the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Credentials from the environment win over the file.
    pub fn apply_env(&mut self, url: Option<String>, api_key: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.rest.url = Some(url);
        }
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.rest.api_key = Some(key);
        }
    }

    /// The configured backend, or REST when a URL is known and the local
    /// file otherwise.
    pub fn resolve_backend(&self) -> BackendKind {
        match self.backend {
            Some(kind) => kind,
            None if self.rest_config().is_some() => BackendKind::Rest,
            None => BackendKind::File,
        }
    }

    pub fn rest_config(&self) -> Option<RestConfig> {
        let url = self.rest.url.as_deref().filter(|u| !u.trim().is_empty())?;

        let mut config = RestConfig::new(url)
            .with_table(self.rest.table.clone())
            .with_timeout(Duration::from_secs(self.rest.timeout_secs.max(1)));
        if let Some(key) = &self.rest.api_key {
            config = config.with_api_key(key.clone());
        }
        Some(config)
    }

    pub fn data_file_path(&self) -> PathBuf {
        expand_path(&self.data_file)
    }

    pub fn log_file_path(&self) -> PathBuf {
        expand_path(&self.log_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("config.json")).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.resolve_backend(), BackendKind::File);
        assert_eq!(config.rest.table, "monthly_bills");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"rest": {"url": "https://abc.supabase.co"}, "analytics_window": "trailing"}"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.rest.timeout_secs, 10);
        assert_eq!(config.analytics_window, AnalyticsWindow::Trailing);
        assert_eq!(config.data_file, DEFAULT_DATA_FILE);
        assert_eq!(config.resolve_backend(), BackendKind::Rest);
        assert_eq!(
            config.rest_config().unwrap().endpoint(),
            "https://abc.supabase.co/rest/v1/monthly_bills"
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backend": "carrier-pigeon"}"#).unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig {
            backend: Some(BackendKind::Memory),
            ..AppConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config = AppConfig::default();
        config.rest.url = Some("https://old.supabase.co".to_string());

        config.apply_env(Some("https://new.supabase.co".to_string()), Some("key".to_string()));
        assert_eq!(config.rest.url.as_deref(), Some("https://new.supabase.co"));
        assert_eq!(config.rest.api_key.as_deref(), Some("key"));

        config.apply_env(Some("  ".to_string()), None);
        assert_eq!(config.rest.url.as_deref(), Some("https://new.supabase.co"));
    }

    #[test]
    fn test_explicit_backend_wins() {
        let mut config = AppConfig::default();
        config.rest.url = Some("https://abc.supabase.co".to_string());
        config.backend = Some(BackendKind::File);

        assert_eq!(config.resolve_backend(), BackendKind::File);
    }

    #[test]
    fn test_expand_path() {
        let expanded = expand_path("/tmp/bills.json");
        assert_eq!(expanded, PathBuf::from("/tmp/bills.json"));
        assert_eq!(config_path(Some("/etc/rent.json")), PathBuf::from("/etc/rent.json"));
    }
}
