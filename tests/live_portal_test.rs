//! End-to-end run against a live chromedriver and the real portal.
//!
//! Needs Chrome, a chromedriver listening on the configured WebDriver URL and
//! network access. Set `NFE_LIVE_KEY` to a key the portal can serve, then run
//! `cargo test --test live_portal_test -- --ignored`.

use std::io::Write;
use std::time::Duration;

use nfe_xml_fetcher_lib::application::events::RunEvent;
use nfe_xml_fetcher_lib::application::key_loader::KeyLoader;
use nfe_xml_fetcher_lib::application::retrieval::{RetrievalPlan, execute_run};
use nfe_xml_fetcher_lib::infrastructure::chrome::ChromeLauncher;
use nfe_xml_fetcher_lib::infrastructure::config::AppConfig;
use nfe_xml_fetcher_lib::utils::poll_until;
use tempfile::{Builder, TempDir};
use tokio::sync::mpsc;

#[tokio::test]
#[ignore = "requires chromedriver, Chrome and network access"]
async fn downloads_xml_for_live_key() {
    let key = std::env::var("NFE_LIVE_KEY").expect("NFE_LIVE_KEY must hold a 44-character key");
    let mut sheet = Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(sheet, "chave\n{key}").unwrap();

    let keys = KeyLoader::default().load(sheet.path()).unwrap();
    assert_eq!(keys.len(), 1);

    let config = AppConfig::default();
    let output = TempDir::new().unwrap();
    let launcher = ChromeLauncher::new(config.browser.clone(), output.path().join("downloaded-xml"));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let summary = execute_run(&launcher, keys, &RetrievalPlan::from_config(&config), "live".into(), tx).await;

    while let Ok(event) = rx.try_recv() {
        if let RunEvent::Failed(reason) = event {
            panic!("run aborted: {reason}");
        }
    }
    assert_eq!(summary.downloaded, 1);

    let dir = launcher.output_dir().to_path_buf();
    let saved = poll_until(Duration::from_millis(500), Duration::from_secs(60), || {
        let dir = dir.clone();
        async move {
            std::fs::read_dir(&dir)
                .ok()?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .find(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xml")))
        }
    })
    .await;
    assert!(saved.is_found(), "no XML file appeared in {}", dir.display());
}
