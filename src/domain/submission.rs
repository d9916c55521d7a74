//! Submission records: the unit of work flowing through the relay pipeline.
//!
//! A `SubmissionRecord` is built once from the inbound payload and never
//! mutated afterwards. Every downstream stage reads it and produces its own
//! `OutcomeRecord`.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Where a lead came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Website form (the default)
    Form,

    /// Chat widget
    #[serde(rename = "whatsapp")]
    WhatsApp,
}

impl Source {
    /// Resolve a raw `source` value. Matching is case-insensitive; anything
    /// absent or unrecognized resolves to `Form`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "whatsapp" => Source::WhatsApp,
            _ => Source::Form,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Form => "form",
            Source::WhatsApp => "whatsapp",
        }
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::Form
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact details of the lead
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Selected tours, accepted either as a list or as one delimited string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tours {
    List(Vec<String>),
    Text(String),
}

impl Tours {
    /// Trimmed, non-empty tour names in submission order
    pub fn names(&self) -> Vec<String> {
        let parts: Vec<&str> = match self {
            Tours::List(items) => items.iter().map(String::as_str).collect(),
            Tours::Text(text) => text
                .split(|c| matches!(c, ',' | ';' | '|' | '\n' | '\r'))
                .collect(),
        };

        parts
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Normalised display form (`"A, B, C"`)
    pub fn joined(&self) -> String {
        self.names().join(", ")
    }
}

/// Free-form trip details attached to a lead
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourContext {
    /// Participant count (`npart`)
    pub npart: Option<String>,

    /// Participant count under its alternate name (`participants`)
    pub participants: Option<String>,

    /// Textual tour description (`tour_details`)
    pub tour_details: Option<String>,

    /// Selected tour names (`tours`)
    pub tours: Option<Tours>,
}

/// Best-effort originating address of the caller.
///
/// Derived from transport hints that the client can forge, so it is
/// informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(Option<String>);

impl ClientIdentity {
    /// Pick the first usable hint.
    ///
    /// Hints are expected in priority order. For comma-separated
    /// forwarding chains only the first hop is kept.
    pub fn from_hints<'a, I>(hints: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let picked = hints
            .into_iter()
            .flatten()
            .filter_map(|hint| hint.split(',').next())
            .map(str::trim)
            .find(|hint| !hint.is_empty())
            .map(str::to_string);

        Self(picked)
    }

    /// Identity from the TCP peer alone
    pub fn from_peer(addr: IpAddr) -> Self {
        Self(Some(addr.to_string()))
    }

    pub fn unknown() -> Self {
        Self(None)
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Transport-level hints, as received alongside the payload
#[derive(Debug, Clone, Default)]
pub struct TransportHints {
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub cf_connecting_ip: Option<String>,
    pub peer: Option<IpAddr>,
}

impl TransportHints {
    /// Resolve to a client identity using the fixed priority order
    pub fn client_identity(&self) -> ClientIdentity {
        let peer = self.peer.map(|p| p.to_string());
        ClientIdentity::from_hints([
            self.forwarded_for.as_deref(),
            self.real_ip.as_deref(),
            self.cf_connecting_ip.as_deref(),
            peer.as_deref(),
        ])
    }
}

/// Errors raised while turning a raw payload into a record
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// One lead submission, immutable after creation
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    /// Unique identifier for this submission
    pub submission_id: Uuid,

    /// Content hash of the raw payload (16 hex chars)
    pub idempotency_key: String,

    pub source: Source,

    pub contact: Contact,

    pub tour_context: TourContext,

    pub client_identity: ClientIdentity,

    /// Capture timestamp, assigned at ingestion
    pub received_at: DateTime<Utc>,

    /// The inbound payload exactly as received
    pub raw: Value,
}

impl SubmissionRecord {
    /// Build a record from the raw inbound payload.
    ///
    /// Only a non-object payload is rejected; every individual field is
    /// optional and malformed values are treated as absent.
    pub fn from_payload(raw: Value, client_identity: ClientIdentity) -> Result<Self, IntakeError> {
        let fields = raw.as_object().ok_or_else(|| {
            IntakeError::InvalidPayload(format!("expected a JSON object, got {}", kind_of(&raw)))
        })?;

        let text = |key: &str| fields.get(key).and_then(scalar_text);

        let source = Source::from_raw(fields.get("source").and_then(Value::as_str));

        let contact = Contact {
            name: text("name"),
            phone: text("phone"),
            email: text("email"),
        };

        let tour_context = TourContext {
            npart: text("npart"),
            participants: text("participants"),
            tour_details: text("tour_details"),
            tours: fields.get("tours").and_then(parse_tours),
        };

        Ok(Self {
            submission_id: Uuid::new_v4(),
            idempotency_key: idempotency_key(&raw),
            source,
            contact,
            tour_context,
            client_identity,
            received_at: Utc::now(),
            raw,
        })
    }

    /// Whether this record is handed to the browser replicator
    pub fn is_replicated(&self) -> bool {
        self.source == Source::Form
    }
}

/// Generate the idempotency key for a payload (first 16 hex chars of SHA256)
pub fn idempotency_key(raw: &Value) -> String {
    let canonical = raw.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Render a JSON scalar as trimmed text; empty strings count as absent
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

fn parse_tours(value: &Value) -> Option<Tours> {
    match value {
        Value::String(s) => Some(Tours::Text(s.clone())),
        Value::Array(items) => Some(Tours::List(items.iter().filter_map(scalar_text).collect())),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
