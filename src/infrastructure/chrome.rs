//! Chrome launcher
//!
//! Builds the Chrome capabilities (download folder, automation flags) and
//! opens a WebDriver session, spawning chromedriver first when a driver binary
//! is configured.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::domain::automation::{AutomationError, AutomationResult, BrowserLauncher, BrowserSession};
use crate::infrastructure::config::BrowserConfig;
use crate::infrastructure::paths::ensure_output_dir;
use crate::infrastructure::webdriver::WebDriverClient;
use crate::utils::{PollOutcome, poll_until};

const DRIVER_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Capabilities for a Chrome session that downloads into `download_dir`
pub fn chrome_capabilities(config: &BrowserConfig, download_dir: &Path) -> Value {
    let mut args = vec!["--disable-blink-features=AutomationControlled".to_string()];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.extend(config.extra_args.iter().cloned());

    json!({
        "alwaysMatch": {
            "browserName": "chrome",
            "goog:chromeOptions": {
                "args": args,
                "excludeSwitches": ["enable-automation"],
                "useAutomationExtension": false,
                "prefs": {
                    "download.default_directory": download_dir.to_string_lossy(),
                    "download.prompt_for_download": false,
                    "download.directory_upgrade": true,
                    "safebrowsing.enabled": true
                }
            }
        }
    })
}

/// Launches Chrome sessions through WebDriver
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserConfig,
    output_dir: PathBuf,
}

impl ChromeLauncher {
    pub const fn new(config: BrowserConfig, output_dir: PathBuf) -> Self {
        Self { config, output_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn spawn_driver(&self, driver_path: &Path) -> AutomationResult<Child> {
        info!(
            "Starting browser driver {} on port {}",
            driver_path.display(),
            self.config.driver_port
        );
        Command::new(driver_path)
            .arg(format!("--port={}", self.config.driver_port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AutomationError::Driver(format!("Failed to start {}: {e}", driver_path.display())))
    }

    async fn wait_until_ready(&self, client: &WebDriverClient) -> AutomationResult<()> {
        let timeout = Duration::from_secs(self.config.driver_startup_timeout_secs);
        let outcome = poll_until(DRIVER_POLL_INTERVAL, timeout, move || async move {
            client.is_ready().await.ok().filter(|ready| *ready)
        })
        .await;

        match outcome {
            PollOutcome::Found(_) => Ok(()),
            PollOutcome::TimedOut { .. } => Err(AutomationError::DriverNotReady {
                seconds: self.config.driver_startup_timeout_secs,
            }),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> AutomationResult<Box<dyn BrowserSession>> {
        let download_dir = ensure_output_dir(&self.output_dir).map_err(|e| AutomationError::Driver(format!("{e:#}")))?;
        let request_timeout = Duration::from_secs(self.config.request_timeout_secs);

        let (client, mut driver) = match &self.config.driver_path {
            Some(driver_path) => {
                let driver = self.spawn_driver(driver_path)?;
                let endpoint = format!("http://127.0.0.1:{}", self.config.driver_port);
                (WebDriverClient::new(&endpoint, request_timeout)?, Some(driver))
            }
            None => (WebDriverClient::new(&self.config.webdriver_url, request_timeout)?, None),
        };

        if driver.is_some() {
            if let Err(e) = self.wait_until_ready(&client).await {
                stop_driver(&mut driver).await;
                return Err(e);
            }
        }

        let capabilities = chrome_capabilities(&self.config, &download_dir);
        match client.new_session(capabilities).await {
            Ok(session) => {
                info!("Browser downloads go to {}", download_dir.display());
                Ok(Box::new(session.with_driver(driver)))
            }
            Err(e) => {
                stop_driver(&mut driver).await;
                Err(e)
            }
        }
    }
}

async fn stop_driver(driver: &mut Option<Child>) {
    if let Some(mut child) = driver.take() {
        if let Err(e) = child.kill().await {
            warn!("Failed to stop browser driver: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_point_downloads_at_output_dir() {
        let config = BrowserConfig::default();
        let caps = chrome_capabilities(&config, Path::new("/data/xml"));
        let options = &caps["alwaysMatch"]["goog:chromeOptions"];

        assert_eq!(caps["alwaysMatch"]["browserName"], "chrome");
        assert_eq!(options["prefs"]["download.default_directory"], "/data/xml");
        assert_eq!(options["prefs"]["download.prompt_for_download"], false);
        assert_eq!(options["excludeSwitches"], json!(["enable-automation"]));
        assert_eq!(options["useAutomationExtension"], false);
    }

    #[test]
    fn test_headless_and_extra_args() {
        let config = BrowserConfig {
            headless: true,
            extra_args: vec!["--window-size=1280,900".to_string()],
            ..BrowserConfig::default()
        };
        let caps = chrome_capabilities(&config, Path::new("/tmp"));
        let args: Vec<&str> = caps["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();

        assert_eq!(
            args,
            vec![
                "--disable-blink-features=AutomationControlled",
                "--headless=new",
                "--window-size=1280,900"
            ]
        );
    }

    #[tokio::test]
    async fn test_launch_fails_cleanly_without_driver() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = BrowserConfig {
            webdriver_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            ..BrowserConfig::default()
        };
        let launcher = ChromeLauncher::new(config, dir.path().join("xml"));

        assert!(launcher.launch().await.is_err());
        assert!(dir.path().join("xml").is_dir());
    }
}
