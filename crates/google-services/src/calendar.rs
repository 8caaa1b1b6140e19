//! Google Calendar v3 client

use serde_json::{json, Value};
use tracing::info;

use crate::config::endpoint;
use crate::credentials::Credentials;
use crate::errors::ServiceError;

/// Authenticated handle on the Calendar API
#[derive(Clone, Debug)]
pub struct CalendarClient {
    http: reqwest::Client,
    base: String,
    access_token: String,
}

impl CalendarClient {
    pub fn new(
        http: reqwest::Client,
        base: impl Into<String>,
        credentials: &Credentials,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            http,
            base: base.into(),
            access_token: credentials.access_token()?.to_string(),
        })
    }

    /// Create a secondary calendar, returning its id.
    pub async fn create_calendar(&self, summary: &str, timezone: &str) -> Result<String, ServiceError> {
        let url = endpoint(&self.base, &["calendars"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "summary": summary, "timeZone": timezone }))
            .send()
            .await?;
        let calendar: Value = ServiceError::check(response).await?.json().await?;
        let id = calendar
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::Decode("created calendar has no id".into()))?;
        info!(calendar_id = id, summary, "Created calendar");
        Ok(id.to_string())
    }

    /// Insert an event and return the created resource.
    pub async fn insert_event(&self, calendar_id: &str, body: &Value) -> Result<Value, ServiceError> {
        let url = endpoint(&self.base, &["calendars", calendar_id, "events"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        let event: Value = ServiceError::check(response).await?.json().await?;

        let (start, summary) = event_headline(&event);
        info!(calendar_id, start, summary, "Inserted event");
        Ok(event)
    }
}

/// Start `dateTime` (or all-day `date`) and summary of an event resource
pub fn event_headline(event: &Value) -> (&str, &str) {
    let start = event
        .pointer("/start/dateTime")
        .or_else(|| event.pointer("/start/date"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let summary = event.get("summary").and_then(Value::as_str).unwrap_or_default();
    (start, summary)
}
