//! Shared fixtures for integration tests: a scripted browser and a
//! throwaway spreadsheet endpoint.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

use leadrelay::adapters::{FormBrowser, FormPage, ReplicationError};
use leadrelay::core::replicator::{
    AFFILIATE_SELECTOR, DESTINATION_SELECTOR, NAME_SELECTOR, NOTES_SELECTOR, PHONE_SELECTOR,
    SUBMIT_SELECTORS, SUCCESS_SELECTOR,
};
use leadrelay::core::PartnerForm;

/// How the fake partner page behaves
#[derive(Debug, Clone)]
pub struct PageScript {
    /// Selectors that exist on the page
    pub present: HashSet<String>,
    /// Show the success indicator once the form is submitted
    pub success_after_submit: bool,
    /// Fail navigation with this error
    pub goto_error: Option<ReplicationError>,
    /// Fail session launch
    pub launch_error: Option<ReplicationError>,
    /// Time spent inside `goto`
    pub goto_delay: Duration,
}

impl PageScript {
    /// A page with every known field, a submit button and a success banner
    pub fn complete() -> Self {
        let present = [
            AFFILIATE_SELECTOR,
            DESTINATION_SELECTOR,
            NAME_SELECTOR,
            PHONE_SELECTOR,
            NOTES_SELECTOR,
            SUBMIT_SELECTORS[0],
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            present,
            success_after_submit: true,
            goto_error: None,
            launch_error: None,
            goto_delay: Duration::ZERO,
        }
    }

    pub fn without(mut self, selector: &str) -> Self {
        self.present.remove(selector);
        self
    }

    pub fn with(mut self, selector: &str) -> Self {
        self.present.insert(selector.to_string());
        self
    }

    pub fn no_indicator(mut self) -> Self {
        self.success_after_submit = false;
        self
    }
}

/// Recorded interactions across all sessions
#[derive(Debug, Default)]
pub struct BrowserLog {
    pub calls: Mutex<Vec<String>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl BrowserLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fills(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("fill "))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub struct FakeBrowser {
    script: PageScript,
    pub log: Arc<BrowserLog>,
}

impl FakeBrowser {
    pub fn new(script: PageScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            log: Arc::new(BrowserLog::default()),
        })
    }
}

#[async_trait]
impl FormBrowser for FakeBrowser {
    async fn open(&self) -> Result<Box<dyn FormPage>, ReplicationError> {
        if let Some(ref e) = self.script.launch_error {
            return Err(e.clone());
        }

        self.log.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.log.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(FakePage {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
            submitted: false,
            closed: false,
        }))
    }
}

struct FakePage {
    script: PageScript,
    log: Arc<BrowserLog>,
    submitted: bool,
    closed: bool,
}

#[async_trait]
impl FormPage for FakePage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), ReplicationError> {
        self.log.record(format!("goto {}", url));
        if !self.script.goto_delay.is_zero() {
            tokio::time::sleep(self.script.goto_delay).await;
        }
        match self.script.goto_error {
            Some(ref e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn exists(&mut self, selector: &str) -> Result<bool, ReplicationError> {
        if selector == SUCCESS_SELECTOR {
            return Ok(self.submitted && self.script.success_after_submit);
        }
        Ok(self.script.present.contains(selector))
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), ReplicationError> {
        self.log.record(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), ReplicationError> {
        self.log.record(format!("click {}", selector));
        self.submitted = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ReplicationError> {
        if !self.closed {
            self.closed = true;
            self.log.closed.fetch_add(1, Ordering::SeqCst);
            self.log.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Partner form settings with short test bounds
pub fn test_form() -> PartnerForm {
    PartnerForm {
        affiliate_id: "AFF-42".to_string(),
        destination: "Lisboa".to_string(),
        navigation_timeout: Duration::from_secs(2),
        success_wait: Duration::from_millis(150),
        poll_interval: Duration::from_millis(20),
        ..PartnerForm::new("https://partner.example/book")
    }
}

/// How the fake spreadsheet endpoint answers
#[derive(Debug, Clone, Copy)]
pub enum StoreBehavior {
    Respond(u16),
    Stall(Duration),
}

/// One request seen by the fake endpoint
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub body: Value,
    pub idempotency_key: Option<String>,
    /// Lines in the general log when the request arrived
    pub captured_lines: usize,
}

#[derive(Clone)]
struct StoreState {
    behavior: StoreBehavior,
    general_log: PathBuf,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

/// A local spreadsheet endpoint bound to an ephemeral port
pub struct FakeStore {
    pub url: String,
    pub seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeStore {
    pub async fn start(behavior: StoreBehavior, general_log: PathBuf) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = StoreState {
            behavior,
            general_log,
            seen: Arc::clone(&seen),
        };

        let app = Router::new().route("/hook", post(store_hook)).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}/hook", addr),
            seen,
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn store_hook(
    State(state): State<StoreState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    let captured_lines = std::fs::read_to_string(&state.general_log)
        .map(|s| s.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0);

    state.seen.lock().unwrap().push(SeenRequest {
        body,
        idempotency_key: headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        captured_lines,
    });

    match state.behavior {
        StoreBehavior::Respond(code) => (
            StatusCode::from_u16(code).unwrap(),
            if code < 300 { "ok" } else { "store exploded" },
        ),
        StoreBehavior::Stall(delay) => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, "late")
        }
    }
}
