//! Configuration infrastructure
//!
//! Settings live in a JSON file under the user config directory. The file is
//! layered over the compiled-in defaults through the `config` crate, so a file
//! written by an older build that lacks newer keys still loads.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Lookup portal and its element ids
    pub portal: PortalConfig,

    /// Timing of the retrieval loop
    pub retrieval: RetrievalConfig,

    /// WebDriver connection and browser options
    pub browser: BrowserConfig,

    /// Spreadsheet loading
    pub loader: LoaderConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Where the lookup form lives and how its controls are identified
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortalConfig {
    pub entry_url: String,
    pub key_input_id: String,
    pub submit_id: String,
    /// Control that appears once the document is ready for download
    pub download_control_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Interval between download-control probes
    pub poll_interval_ms: u64,

    /// How long to wait for the download control per key
    pub confirm_timeout_secs: u64,

    /// How long to wait for the key input after navigating
    pub page_ready_timeout_secs: u64,

    /// Pause between keys
    pub throttle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint used when no driver binary is configured
    pub webdriver_url: String,

    /// Optional chromedriver binary to spawn for each run
    pub driver_path: Option<PathBuf>,

    pub driver_port: u16,

    pub driver_startup_timeout_secs: u64,

    pub headless: bool,

    pub extra_args: Vec<String>,

    /// Download folder, relative to the executable's directory
    pub output_dir_name: String,

    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Treat the first row of the sheet as column titles
    pub has_header_row: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,

    /// Enable automatic log cleanup on startup
    pub auto_cleanup_logs: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            entry_url: defaults::ENTRY_URL.to_string(),
            key_input_id: defaults::KEY_INPUT_ID.to_string(),
            submit_id: defaults::SUBMIT_ID.to_string(),
            download_control_id: defaults::DOWNLOAD_CONTROL_ID.to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
            confirm_timeout_secs: defaults::CONFIRM_TIMEOUT_SECS,
            page_ready_timeout_secs: defaults::PAGE_READY_TIMEOUT_SECS,
            throttle_ms: defaults::THROTTLE_MS,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: defaults::WEBDRIVER_URL.to_string(),
            driver_path: None,
            driver_port: defaults::DRIVER_PORT,
            driver_startup_timeout_secs: defaults::DRIVER_STARTUP_TIMEOUT_SECS,
            headless: false,
            extra_args: Vec::new(),
            output_dir_name: defaults::OUTPUT_DIR_NAME.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { has_header_row: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: true,
        }
    }
}

impl RetrievalConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub const fn page_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.page_ready_timeout_secs)
    }

    pub const fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl AppConfig {
    /// Reject settings the retrieval loop cannot work with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.portal.entry_url)
            .with_context(|| format!("Invalid portal entry URL: {}", self.portal.entry_url))?;
        url::Url::parse(&self.browser.webdriver_url)
            .with_context(|| format!("Invalid WebDriver URL: {}", self.browser.webdriver_url))?;

        if self.retrieval.poll_interval_ms == 0 {
            bail!("retrieval.poll_interval_ms must be greater than 0");
        }
        if self.retrieval.confirm_timeout_secs == 0 || self.retrieval.page_ready_timeout_secs == 0 {
            bail!("retrieval timeouts must be greater than 0");
        }
        if self.browser.output_dir_name.trim().is_empty() {
            bail!("browser.output_dir_name must not be empty");
        }
        for id in [
            &self.portal.key_input_id,
            &self.portal.submit_id,
            &self.portal.download_control_id,
        ] {
            if id.trim().is_empty() {
                bail!("portal element ids must not be empty");
            }
        }
        Ok(())
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Create a manager for the default config location
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self::with_path(config_dir.join(defaults::CONFIG_FILE_NAME)))
    }

    pub const fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub async fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!("Configuration file not found, creating default: {:?}", self.config_path);
            let default_config = AppConfig::default();
            self.save_config(&default_config).await?;
            return Ok(default_config);
        }

        match Self::read_layered(&self.config_path).and_then(|config| {
            config.validate()?;
            Ok(config)
        }) {
            Ok(config) => {
                info!("Loaded configuration from: {:?}", self.config_path);
                Ok(config)
            }
            Err(parse_error) => {
                warn!("Configuration file unusable: {:#}", parse_error);
                warn!("Resetting to default configuration");

                let backup_path = self.config_path.with_extension("json.corrupted");
                if let Err(e) = fs::copy(&self.config_path, &backup_path).await {
                    warn!("Failed to create backup of corrupted config: {}", e);
                } else {
                    info!("Backed up corrupted config to: {:?}", backup_path);
                }

                let default_config = AppConfig::default();
                self.save_config(&default_config)
                    .await
                    .context("Failed to save default configuration")?;
                Ok(default_config)
            }
        }
    }

    /// Defaults first, then whatever keys the file provides
    fn read_layered(path: &Path) -> Result<AppConfig> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to build default configuration source")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .build()
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;

        settings
            .try_deserialize::<AppConfig>()
            .context("Failed to parse configuration file")
    }

    /// Save configuration to file
    pub async fn save_config(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, content)
            .await
            .context("Failed to write configuration file")?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "nfe-xml-fetcher";
    pub const CONFIG_FILE_NAME: &str = "nfe_xml_fetcher_config.json";

    // Portal
    pub const ENTRY_URL: &str = "https://www.fsist.com.br/";
    pub const KEY_INPUT_ID: &str = "chave";
    pub const SUBMIT_ID: &str = "butconsulta";
    pub const DOWNLOAD_CONTROL_ID: &str = "butComCertificado";

    // Retrieval loop
    pub const POLL_INTERVAL_MS: u64 = 250;
    pub const CONFIRM_TIMEOUT_SECS: u64 = 200;
    pub const PAGE_READY_TIMEOUT_SECS: u64 = 120;
    pub const THROTTLE_MS: u64 = 1000;

    // Browser
    pub const WEBDRIVER_URL: &str = "http://localhost:9515";
    pub const DRIVER_PORT: u16 = 9515;
    pub const DRIVER_STARTUP_TIMEOUT_SECS: u64 = 20;
    pub const OUTPUT_DIR_NAME: &str = "downloaded-xml";
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    // Logging
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_MAX_FILES: u32 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.retrieval.confirm_timeout(), Duration::from_secs(200));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

        let config = manager.load_config().await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(manager.config_path().exists());
    }

    #[tokio::test]
    async fn test_partial_file_layers_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "retrieval": { "throttle_ms": 5 }, "browser": { "headless": true } }"#).unwrap();

        let config = ConfigManager::with_path(path).load_config().await.unwrap();
        assert_eq!(config.retrieval.throttle_ms, 5);
        assert_eq!(config.retrieval.poll_interval_ms, defaults::POLL_INTERVAL_MS);
        assert!(config.browser.headless);
        assert_eq!(config.portal, PortalConfig::default());
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up_and_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = ConfigManager::with_path(path.clone()).load_config().await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.with_extension("json.corrupted").exists());
    }
}
