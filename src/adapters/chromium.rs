//! Headless Chromium sessions over the DevTools protocol.
//!
//! Every session gets its own throwaway profile directory, so no cookies or
//! storage leak between replications. Element probing and value setting go
//! through `Runtime.evaluate` so hidden inputs and selects can be filled the
//! same way as text boxes.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{FormBrowser, FormPage, ReplicationError};

/// Launcher for isolated Chromium sessions
#[derive(Debug, Clone)]
pub struct ChromiumBrowser {
    /// Run without a visible window
    headless: bool,
    /// Explicit browser binary (auto-detected if not set)
    executable: Option<PathBuf>,
    /// Bound on process start-up
    launch_timeout: Duration,
}

impl Default for ChromiumBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl ChromiumBrowser {
    /// Headless launcher using the auto-detected browser binary
    pub fn new() -> Self {
        Self {
            headless: true,
            executable: None,
            launch_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_head(mut self, visible: bool) -> Self {
        self.headless = !visible;
        self
    }

    pub fn with_executable(mut self, executable: Option<PathBuf>) -> Self {
        self.executable = executable;
        self
    }
}

#[async_trait]
impl FormBrowser for ChromiumBrowser {
    async fn open(&self) -> Result<Box<dyn FormPage>, ReplicationError> {
        let profile = tempfile::Builder::new()
            .prefix("leadrelay-profile-")
            .tempdir()
            .map_err(|e| ReplicationError::Launch(format!("profile dir: {}", e)))?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .no_sandbox()
            .launch_timeout(self.launch_timeout);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(ref executable) = self.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(ReplicationError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ReplicationError::Launch(e.to_string()))?;

        // The handler must be polled for the connection to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler stopped");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(ReplicationError::Launch(e.to_string()));
            }
        };

        Ok(Box::new(ChromiumPage {
            browser,
            page,
            handler_task,
            profile: Some(profile),
            closed: false,
        }))
    }
}

/// A page in a live Chromium session
struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile: Option<TempDir>,
    closed: bool,
}

impl ChromiumPage {
    async fn eval_bool(&mut self, script: String) -> Result<bool, ReplicationError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| ReplicationError::Page(e.to_string()))?;

        result
            .into_value::<bool>()
            .map_err(|e| ReplicationError::Page(e.to_string()))
    }
}

/// Quote a string as a JavaScript literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn exists_script(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

fn fill_script(selector: &str, value: &str) -> String {
    format!(
        "(() => {{ \
            const el = document.querySelector({}); \
            if (!el) return false; \
            el.value = {}; \
            el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
            el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
            return true; \
        }})()",
        js_string(selector),
        js_string(value)
    )
}

#[async_trait]
impl FormPage for ChromiumPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ReplicationError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ReplicationError::Navigation(e.to_string())),
            Err(_) => Err(ReplicationError::NavigationTimeout(timeout)),
        }
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, ReplicationError> {
        self.eval_bool(exists_script(selector)).await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), ReplicationError> {
        if self.eval_bool(fill_script(selector, value)).await? {
            Ok(())
        } else {
            Err(ReplicationError::Page(format!(
                "element disappeared before fill: {}",
                selector
            )))
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), ReplicationError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| ReplicationError::Page(e.to_string()))?;

        element
            .click()
            .await
            .map_err(|e| ReplicationError::Page(e.to_string()))?;

        Ok(())
    }

    async fn close(&mut self) -> Result<(), ReplicationError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();

        if let Some(profile) = self.profile.take() {
            if let Err(e) = profile.close() {
                warn!(error = %e, "Failed to remove browser profile directory");
            }
        }

        closed
            .map(|_| ())
            .map_err(|e| ReplicationError::Page(format!("close: {}", e)))
    }
}
