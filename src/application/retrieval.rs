//! Retrieval loop
//!
//! Drives one browser session through the portal's lookup form once per key,
//! strictly in order. Status changes and the final summary are reported as
//! [`RunEvent`]s; the loop itself never touches shared state.

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::application::events::RunEvent;
use crate::domain::automation::{AutomationError, AutomationResult, BrowserLauncher, BrowserSession};
use crate::domain::key::DocumentKey;
use crate::domain::status::{ItemStatus, RunSummary, StatusUpdate};
use crate::infrastructure::config::AppConfig;
use crate::utils::{PollOutcome, poll_until};

/// Row message for keys whose download control never became usable
pub const NOT_FOUND_MESSAGE: &str = "download control not found";

/// Portal coordinates and timings for one run, frozen at start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalPlan {
    pub entry_url: String,
    pub key_input_id: String,
    pub submit_id: String,
    pub download_control_id: String,
    pub poll_interval: Duration,
    pub page_ready_timeout: Duration,
    pub confirm_timeout: Duration,
    /// Pause between two keys
    pub throttle: Duration,
}

impl RetrievalPlan {
    pub fn from_config(config: &AppConfig) -> Self {
        let portal = &config.portal;
        let retrieval = &config.retrieval;
        Self {
            entry_url: portal.entry_url.clone(),
            key_input_id: portal.key_input_id.clone(),
            submit_id: portal.submit_id.clone(),
            download_control_id: portal.download_control_id.clone(),
            poll_interval: retrieval.poll_interval(),
            page_ready_timeout: retrieval.page_ready_timeout(),
            confirm_timeout: retrieval.confirm_timeout(),
            throttle: retrieval.throttle(),
        }
    }
}

/// Failures that abort the remaining keys of a run
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Could not start the browser: {0}")]
    Launch(#[source] AutomationError),

    #[error("Browser failure while processing key {key}: {source}")]
    Automation {
        row: usize,
        key: DocumentKey,
        #[source]
        source: AutomationError,
    },

    #[error("Element '{element_id}' did not appear within {seconds}s while processing key {key}")]
    PageNotReady {
        row: usize,
        key: DocumentKey,
        element_id: String,
        seconds: u64,
    },

    #[error("Control '{element_id}' is missing from the page while processing key {key}")]
    MissingControl {
        row: usize,
        key: DocumentKey,
        element_id: String,
    },
}

/// Run the whole loop for `keys` and return the final summary.
///
/// Every status change goes out on `events` as it happens. A failure other
/// than a download-control timeout stops the loop and is sent as
/// [`RunEvent::Failed`]. [`RunEvent::Finished`] is always the last event, and
/// the browser session is closed before it is sent.
pub async fn execute_run(
    launcher: &dyn BrowserLauncher,
    keys: Vec<DocumentKey>,
    plan: &RetrievalPlan,
    run_id: String,
    events: UnboundedSender<RunEvent>,
) -> RunSummary {
    let span = info_span!("retrieval_run", run_id = %run_id, keys = keys.len());

    async move {
        let mut summary = RunSummary::new(run_id, keys.len());
        info!("Starting retrieval of {} key(s) via {}", keys.len(), plan.entry_url);

        let result = match launcher.launch().await {
            Ok(session) => {
                let result = process_keys(session.as_ref(), &keys, plan, &events, &mut summary).await;
                if let Err(e) = session.quit().await {
                    warn!("Failed to close browser session: {}", e);
                }
                result
            }
            Err(e) => Err(RetrievalError::Launch(e)),
        };

        if let Err(e) = result {
            error!("Retrieval aborted: {}", e);
            summary.aborted = true;
            send(&events, RunEvent::Failed(e.to_string()));
        }

        summary.finished_at = Some(Utc::now());
        info!(
            "Retrieval finished: {} attempted, {} downloaded, {} not found{}",
            summary.attempted,
            summary.downloaded,
            summary.not_found,
            if summary.aborted { " (aborted)" } else { "" }
        );
        send(&events, RunEvent::Finished(summary.clone()));
        summary
    }
    .instrument(span)
    .await
}

async fn process_keys(
    session: &dyn BrowserSession,
    keys: &[DocumentKey],
    plan: &RetrievalPlan,
    events: &UnboundedSender<RunEvent>,
    summary: &mut RunSummary,
) -> Result<(), RetrievalError> {
    for (index, key) in keys.iter().enumerate() {
        send(events, status_event(index, key, ItemStatus::Processing, None));
        summary.attempted += 1;

        let status = process_key(session, plan, index, key).await?;
        summary.record(status);

        let message = (status == ItemStatus::NotFound).then(|| NOT_FOUND_MESSAGE.to_string());
        info!("Key {}/{} {}: {}", index + 1, keys.len(), key, status);
        send(events, status_event(index, key, status, message));

        if index + 1 < keys.len() {
            sleep(plan.throttle).await;
        }
    }
    Ok(())
}

/// Submit one key and try to trigger its download. `Ok` carries the terminal
/// status; `Err` means the run cannot continue.
async fn process_key(
    session: &dyn BrowserSession,
    plan: &RetrievalPlan,
    row: usize,
    key: &DocumentKey,
) -> Result<ItemStatus, RetrievalError> {
    let automation = |source: AutomationError| RetrievalError::Automation {
        row,
        key: key.clone(),
        source,
    };

    session.navigate(&plan.entry_url).await.map_err(automation)?;

    let input_id = plan.key_input_id.as_str();
    let input = match poll_until(plan.poll_interval, plan.page_ready_timeout, || async move {
        session.find_by_id(input_id).await.transpose()
    })
    .await
    {
        PollOutcome::Found(found) => found.map_err(automation)?,
        PollOutcome::TimedOut { .. } => {
            return Err(RetrievalError::PageNotReady {
                row,
                key: key.clone(),
                element_id: plan.key_input_id.clone(),
                seconds: plan.page_ready_timeout.as_secs(),
            });
        }
    };

    session.clear(&input).await.map_err(automation)?;
    session.type_text(&input, key.as_str()).await.map_err(automation)?;

    let submit = session
        .find_by_id(&plan.submit_id)
        .await
        .map_err(automation)?
        .ok_or_else(|| RetrievalError::MissingControl {
            row,
            key: key.clone(),
            element_id: plan.submit_id.clone(),
        })?;
    session.click(&submit).await.map_err(automation)?;

    let control_id = plan.download_control_id.as_str();
    let outcome = poll_until(plan.poll_interval, plan.confirm_timeout, || {
        activate_download_control(session, control_id)
    })
    .await;

    Ok(match outcome {
        PollOutcome::Found(()) => ItemStatus::Downloaded,
        PollOutcome::TimedOut { attempts, waited } => {
            debug!("Download control for {} not usable after {} probes in {:?}", key, attempts, waited);
            ItemStatus::NotFound
        }
    })
}

/// One probe of the download control. Errors count as "not ready yet".
async fn activate_download_control(session: &dyn BrowserSession, control_id: &str) -> Option<()> {
    match try_activate(session, control_id).await {
        Ok(true) => Some(()),
        Ok(false) => None,
        Err(e) => {
            debug!("Download control probe failed: {}", e);
            None
        }
    }
}

async fn try_activate(session: &dyn BrowserSession, control_id: &str) -> AutomationResult<bool> {
    let Some(control) = session.find_by_id(control_id).await? else {
        return Ok(false);
    };
    if !session.is_displayed(&control).await? || !session.is_enabled(&control).await? {
        return Ok(false);
    }
    session.scroll_into_view(&control).await?;
    session.force_click(&control).await?;
    Ok(true)
}

fn status_event(index: usize, key: &DocumentKey, status: ItemStatus, message: Option<String>) -> RunEvent {
    RunEvent::Status(StatusUpdate {
        index,
        key: key.clone(),
        status,
        message,
    })
}

fn send(events: &UnboundedSender<RunEvent>, event: RunEvent) {
    if events.send(event).is_err() {
        debug!("Run event dropped: receiver closed");
    }
}
