//! W3C WebDriver client
//!
//! Speaks the WebDriver wire protocol (JSON over HTTP) to chromedriver or any
//! compatible driver. Only the commands the retrieval loop needs are
//! implemented.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::automation::{AutomationError, AutomationResult, BrowserSession, ElementRef};

/// Key under which W3C drivers return element references
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const NO_SUCH_ELEMENT: &str = "no such element";
const STALE_ELEMENT: &str = "stale element reference";

const SCROLL_INTO_VIEW_SCRIPT: &str = "arguments[0].scrollIntoView(true);";
const FORCE_CLICK_SCRIPT: &str = "arguments[0].click();";

/// HTTP connection to a WebDriver endpoint
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: Client,
    base: Url,
}

impl WebDriverClient {
    pub fn new(endpoint: &str, request_timeout: Duration) -> AutomationResult<Self> {
        let mut base = Url::parse(endpoint)
            .map_err(|e| AutomationError::Driver(format!("Invalid WebDriver URL '{endpoint}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, base })
    }

    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> AutomationResult<Value> {
        let url = self
            .base
            .join(path)
            .map_err(|e| AutomationError::Driver(format!("Invalid WebDriver path '{path}': {e}")))?;

        debug!("WebDriver {} {}", method, url);
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        decode_response(status, &text)
    }

    /// Whether the driver reports itself ready for new sessions
    pub async fn is_ready(&self) -> AutomationResult<bool> {
        let value = self.send(Method::GET, "status", None).await?;
        Ok(value.get("ready").and_then(Value::as_bool).unwrap_or(false))
    }

    pub async fn new_session(&self, capabilities: Value) -> AutomationResult<WebDriverSession> {
        let value = self
            .send(Method::POST, "session", Some(json!({ "capabilities": capabilities })))
            .await
            .map_err(|e| match e {
                AutomationError::Protocol { error, message } => {
                    AutomationError::SessionNotCreated(format!("{error}: {message}"))
                }
                other => other,
            })?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AutomationError::InvalidResponse("missing sessionId".to_string()))?
            .to_string();

        info!("WebDriver session created: {}", session_id);
        Ok(WebDriverSession {
            client: self.clone(),
            session_id,
            driver: Mutex::new(None),
        })
    }
}

/// Unwrap the `{"value": ...}` envelope, turning protocol errors into
/// [`AutomationError::Protocol`].
pub fn decode_response(status: StatusCode, body: &str) -> AutomationResult<Value> {
    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| AutomationError::InvalidResponse(format!("HTTP {status}: {e}")))?;
    let value = envelope.get("value").cloned().unwrap_or(Value::Null);

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(AutomationError::Protocol {
            error: error.to_string(),
            message,
        });
    }

    if !status.is_success() {
        return Err(AutomationError::InvalidResponse(format!("HTTP {status} without error payload")));
    }
    Ok(value)
}

/// Selector matching an element by id, safe for ids CSS would need escaped
pub fn id_selector(id: &str) -> String {
    format!("[id=\"{}\"]", id.replace('\\', "\\\\").replace('"', "\\\""))
}

fn element_json(element: &ElementRef) -> Value {
    json!({ ELEMENT_KEY: element.0 })
}

/// A live WebDriver session; optionally owns the driver process it runs on
#[derive(Debug)]
pub struct WebDriverSession {
    client: WebDriverClient,
    session_id: String,
    driver: Mutex<Option<Child>>,
}

impl WebDriverSession {
    /// Hand over a spawned driver process so it is stopped with the session
    pub fn with_driver(self, driver: Option<Child>) -> Self {
        Self {
            driver: Mutex::new(driver),
            ..self
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn path(&self, suffix: &str) -> String {
        format!("session/{}/{}", self.session_id, suffix)
    }

    fn element_path(&self, element: &ElementRef, suffix: &str) -> String {
        self.path(&format!("element/{}/{}", element.0, suffix))
    }

    async fn execute(&self, script: &str, element: &ElementRef) -> AutomationResult<Value> {
        self.client
            .send(
                Method::POST,
                &self.path("execute/sync"),
                Some(json!({ "script": script, "args": [element_json(element)] })),
            )
            .await
    }

    async fn bool_property(&self, element: &ElementRef, property: &str) -> AutomationResult<bool> {
        let value = self.client.send(Method::GET, &self.element_path(element, property), None).await?;
        value
            .as_bool()
            .ok_or_else(|| AutomationError::InvalidResponse(format!("'{property}' is not a boolean")))
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> AutomationResult<()> {
        self.client
            .send(Method::POST, &self.path("url"), Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> AutomationResult<Option<ElementRef>> {
        let body = json!({ "using": "css selector", "value": id_selector(id) });
        match self.client.send(Method::POST, &self.path("element"), Some(body)).await {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|reference| Some(ElementRef(reference.to_string())))
                .ok_or_else(|| AutomationError::InvalidResponse("element reference missing".to_string())),
            Err(AutomationError::Protocol { error, .. }) if error == NO_SUCH_ELEMENT || error == STALE_ELEMENT => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn clear(&self, element: &ElementRef) -> AutomationResult<()> {
        self.client
            .send(Method::POST, &self.element_path(element, "clear"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> AutomationResult<()> {
        self.client
            .send(Method::POST, &self.element_path(element, "value"), Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> AutomationResult<()> {
        self.client
            .send(Method::POST, &self.element_path(element, "click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn is_displayed(&self, element: &ElementRef) -> AutomationResult<bool> {
        self.bool_property(element, "displayed").await
    }

    async fn is_enabled(&self, element: &ElementRef) -> AutomationResult<bool> {
        self.bool_property(element, "enabled").await
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> AutomationResult<()> {
        self.execute(SCROLL_INTO_VIEW_SCRIPT, element).await?;
        Ok(())
    }

    async fn force_click(&self, element: &ElementRef) -> AutomationResult<()> {
        self.execute(FORCE_CLICK_SCRIPT, element).await?;
        Ok(())
    }

    async fn quit(&self) -> AutomationResult<()> {
        let result = self.client.send(Method::DELETE, &format!("session/{}", self.session_id), None).await;

        if let Some(mut child) = self.driver.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop browser driver: {}", e);
            }
        }

        result.map(|_| info!("WebDriver session closed: {}", self.session_id))
    }
}
