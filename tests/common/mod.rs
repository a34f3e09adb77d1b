//! Scripted browser and recording display shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use nfe_xml_fetcher_lib::application::events::{Notice, NoticeLevel, UiSink};
use nfe_xml_fetcher_lib::application::state::AppState;
use nfe_xml_fetcher_lib::domain::automation::{
    AutomationError, AutomationResult, BrowserLauncher, BrowserSession, ElementRef,
};
use nfe_xml_fetcher_lib::domain::key::DocumentKey;
use nfe_xml_fetcher_lib::domain::status::{RunSummary, StatusUpdate};
use nfe_xml_fetcher_lib::infrastructure::config::AppConfig;

pub const KEY_A: &str = "35240112345678000190550010000012341000012345";
pub const KEY_B: &str = "35240198765432000110550010000098761000098765";
pub const KEY_C: &str = "35240155555555000155550010000055551000055555";

pub const INPUT_ID: &str = "chave";
pub const SUBMIT_ID: &str = "butconsulta";
pub const DOWNLOAD_ID: &str = "butComCertificado";

pub fn keys(raw: &[&str]) -> Vec<DocumentKey> {
    raw.iter().map(|k| DocumentKey::parse(k).unwrap()).collect()
}

/// Behaviour of the fake lookup portal
#[derive(Default)]
pub struct Portal {
    /// Keys whose download control never shows up
    pub never_ready: HashSet<String>,
    /// Zero-based navigation that fails with a driver error
    pub fail_navigation_at: Option<usize>,
    pub launch_fails: bool,

    pub launches: AtomicUsize,
    pub quits: AtomicUsize,
    pub navigations: AtomicUsize,
    pub downloads: Mutex<Vec<String>>,
    pub typed: Mutex<Option<String>>,
}

impl Portal {
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    fn typed(&self) -> String {
        self.typed.lock().unwrap().clone().unwrap_or_default()
    }
}

pub struct FakeLauncher(pub Arc<Portal>);

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> AutomationResult<Box<dyn BrowserSession>> {
        self.0.launches.fetch_add(1, Ordering::SeqCst);
        if self.0.launch_fails {
            return Err(AutomationError::SessionNotCreated("chrome not installed".into()));
        }
        Ok(Box::new(FakeSession(Arc::clone(&self.0))))
    }
}

struct FakeSession(Arc<Portal>);

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, _url: &str) -> AutomationResult<()> {
        let n = self.0.navigations.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_navigation_at == Some(n) {
            return Err(AutomationError::Driver("chrome not reachable".into()));
        }
        *self.0.typed.lock().unwrap() = None;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AutomationResult<Option<ElementRef>> {
        let present = match id {
            INPUT_ID | SUBMIT_ID => true,
            DOWNLOAD_ID => !self.0.never_ready.contains(&self.0.typed()),
            _ => false,
        };
        Ok(present.then(|| ElementRef(id.to_string())))
    }

    async fn clear(&self, _element: &ElementRef) -> AutomationResult<()> {
        Ok(())
    }

    async fn type_text(&self, _element: &ElementRef, text: &str) -> AutomationResult<()> {
        *self.0.typed.lock().unwrap() = Some(text.to_string());
        Ok(())
    }

    async fn click(&self, _element: &ElementRef) -> AutomationResult<()> {
        Ok(())
    }

    async fn is_displayed(&self, _element: &ElementRef) -> AutomationResult<bool> {
        Ok(true)
    }

    async fn is_enabled(&self, _element: &ElementRef) -> AutomationResult<bool> {
        Ok(true)
    }

    async fn scroll_into_view(&self, _element: &ElementRef) -> AutomationResult<()> {
        Ok(())
    }

    async fn force_click(&self, element: &ElementRef) -> AutomationResult<()> {
        assert_eq!(element.0, DOWNLOAD_ID);
        let typed = self.0.typed();
        self.0.downloads.lock().unwrap().push(typed);
        Ok(())
    }

    async fn quit(&self) -> AutomationResult<()> {
        self.0.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Display side that records everything it is shown
#[derive(Default)]
pub struct RecordingSink {
    pub notices: Mutex<Vec<Notice>>,
    pub statuses: Mutex<Vec<StatusUpdate>>,
    pub finished: Mutex<Vec<RunSummary>>,
    /// Run flag as seen when the finished event arrived
    pub running_at_finish: Mutex<Vec<bool>>,
    state: Mutex<Option<AppState>>,
}

impl RecordingSink {
    pub fn watching(state: &AppState) -> Self {
        let sink = Self::default();
        *sink.state.lock().unwrap() = Some(state.clone());
        sink
    }

    pub fn notices_of(&self, level: NoticeLevel) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.level == level)
            .cloned()
            .collect()
    }
}

impl UiSink for RecordingSink {
    fn status_changed(&self, update: &StatusUpdate) {
        self.statuses.lock().unwrap().push(update.clone());
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    fn run_finished(&self, summary: &RunSummary) {
        if let Some(state) = self.state.lock().unwrap().as_ref() {
            self.running_at_finish.lock().unwrap().push(state.is_running());
        }
        self.finished.lock().unwrap().push(summary.clone());
    }
}

pub fn app_state(portal: &Arc<Portal>) -> AppState {
    AppState::new(
        AppConfig::default(),
        Arc::new(FakeLauncher(Arc::clone(portal))),
        PathBuf::from("downloaded-xml"),
    )
}
