// JSON-over-HTTP calendar transport.
//
// Events are created with `POST {base_url}/events` and removed with
// `DELETE {base_url}/events/{id}`. A missing event on delete (404 or 410)
// counts as already gone.

use std::sync::Arc;

use async_trait::async_trait;
use leaguekeeper_core::config::Config;
use leaguekeeper_core::sync::{BackendError, CalendarBackend, CalendarEvent, DeleteOutcome};
use serde_json::Value;
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---------------------------------------------------------------------------
// HttpCalendar
// ---------------------------------------------------------------------------

pub struct HttpCalendar {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpCalendar {
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.is_empty()),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }

    /// `{base_url}/events/{event_id}` with the id escaped as one path segment.
    fn event_url(&self, event_id: &str) -> Result<reqwest::Url, BackendError> {
        let malformed =
            |why: String| BackendError::Malformed(format!("calendar URL `{}` {why}", self.base_url));
        let mut url = reqwest::Url::parse(&self.events_url())
            .map_err(|e| malformed(format!("is invalid: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| malformed("cannot take a path".into()))?
            .push(event_id);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

#[async_trait]
impl CalendarBackend for HttpCalendar {
    async fn push_event(&self, event: &CalendarEvent) -> Result<String, BackendError> {
        let response = self
            .authorize(self.http.post(self.events_url()))
            .json(&event_body(event))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let id = parse_event_id(&body)
            .ok_or_else(|| BackendError::Malformed(format!("no event id in `{body}`")))?;
        debug!(fixture_id = event.fixture_id, "Calendar accepted event {}", id);
        Ok(id)
    }

    async fn delete_event(&self, event_id: &str) -> Result<DeleteOutcome, BackendError> {
        let response = self
            .authorize(self.http.delete(self.event_url(event_id)?))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        match classify_delete(status) {
            Some(outcome) => Ok(outcome),
            None => Err(BackendError::Status {
                status,
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// CalendarClient
// ---------------------------------------------------------------------------

/// The configured calendar, or nothing when no credentials are present.
pub enum CalendarClient {
    Active(HttpCalendar),
    Disabled,
}

impl CalendarClient {
    /// Returns `Active` when `[calendar]` credentials are configured.
    pub fn from_config(config: &Config) -> Self {
        match &config.credentials.calendar {
            Some(cal) if !cal.base_url.trim().is_empty() => {
                CalendarClient::Active(HttpCalendar::new(&cal.base_url, cal.api_token.clone()))
            }
            _ => CalendarClient::Disabled,
        }
    }

    pub fn into_backend(self) -> Option<Arc<dyn CalendarBackend>> {
        match self {
            CalendarClient::Active(http) => Some(Arc::new(http)),
            CalendarClient::Disabled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

pub(crate) fn event_body(event: &CalendarEvent) -> Value {
    serde_json::json!({
        "summary": event.title,
        "start": event.starts_at.format(TIMESTAMP_FORMAT).to_string(),
        "end": event.ends_at.format(TIMESTAMP_FORMAT).to_string(),
        "metadata": {
            "fixture_id": event.fixture_id,
            "league_id": event.league_id,
        }
    })
}

/// Extract the created event's `id`, which may be a string or a number.
///
/// Expected shape: `{ "id": "abc123", ... }`
pub(crate) fn parse_event_id(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    match v.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn classify_delete(status: u16) -> Option<DeleteOutcome> {
    match status {
        200..=299 => Some(DeleteOutcome::Deleted),
        404 | 410 => Some(DeleteOutcome::AlreadyGone),
        _ => None,
    }
}
