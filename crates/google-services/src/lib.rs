//! Google Calendar and Gmail access for taskdriver.
//!
//! Every operation takes the path of an authorized-user token file. The token
//! is loaded, refreshed, or re-authorized through the configured
//! [`AuthorizationFlow`] and written back before the API call is made.

pub mod calendar;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod flow;
pub mod gmail;

pub use calendar::{event_headline, CalendarClient};
pub use config::ServiceEndpoints;
pub use credentials::{get_credentials, Credentials, SCOPES};
pub use errors::ServiceError;
pub use flow::{AuthorizationFlow, ClientSecrets, InstalledAppFlow, PromptingFlow};
pub use gmail::{GmailClient, INBOX_SCAN_LIMIT};

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point bundling the HTTP client, API endpoints and authorization flow
pub struct GoogleServices {
    http: reqwest::Client,
    endpoints: ServiceEndpoints,
    flow: Arc<dyn AuthorizationFlow>,
}

impl GoogleServices {
    pub fn new(endpoints: ServiceEndpoints, flow: Arc<dyn AuthorizationFlow>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoints, flow)
    }

    pub fn with_client(
        http: reqwest::Client,
        endpoints: ServiceEndpoints,
        flow: Arc<dyn AuthorizationFlow>,
    ) -> Self {
        Self {
            http,
            endpoints,
            flow,
        }
    }

    pub async fn credentials(&self, token_path: &Path) -> Result<Credentials, ServiceError> {
        get_credentials(token_path, self.flow.as_ref(), &self.http).await
    }

    /// Calendar handle plus the id to use: `calendar_id` when given and
    /// non-empty, otherwise the id of a newly created calendar.
    pub async fn create_or_get_calendar(
        &self,
        credentials_path: &Path,
        calendar_id: Option<&str>,
        summary: &str,
        timezone: &str,
    ) -> Result<(CalendarClient, String), ServiceError> {
        let credentials = self.credentials(credentials_path).await?;
        let client = CalendarClient::new(
            self.http.clone(),
            self.endpoints.calendar_base.clone(),
            &credentials,
        )?;

        let calendar_id = match calendar_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => client.create_calendar(summary, timezone).await?,
        };
        Ok((client, calendar_id))
    }

    pub async fn insert_event(
        &self,
        calendar: &CalendarClient,
        calendar_id: &str,
        body: &Value,
    ) -> Result<Value, ServiceError> {
        calendar.insert_event(calendar_id, body).await
    }

    /// Send a plain-text email. Does nothing unless sender, recipient and
    /// content are all non-empty.
    pub async fn send_email(
        &self,
        credentials_path: &Path,
        subject: &str,
        from: &str,
        to: &str,
        content: &str,
    ) -> Result<(), ServiceError> {
        if from.is_empty() || to.is_empty() || content.is_empty() {
            debug!("Email not sent: sender, recipient or content is empty");
            return Ok(());
        }

        let credentials = self.credentials(credentials_path).await?;
        let gmail = GmailClient::new(self.http.clone(), self.endpoints.gmail_base.clone(), &credentials)?;
        let message = gmail::build_message(subject, from, to, content);
        gmail.send_raw(message.as_bytes()).await?;
        info!(subject, to, "Sent email");
        Ok(())
    }

    /// First capture group of `pattern` in the newest messages from `from`.
    ///
    /// Returns `None` when an input is empty, nothing matches, or Gmail
    /// rejects the list/get requests. The pattern must have a capture group.
    pub async fn extract_string_from_inbox(
        &self,
        credentials_path: &Path,
        from: &str,
        pattern: &str,
    ) -> Result<Option<String>, ServiceError> {
        if credentials_path.as_os_str().is_empty() || from.is_empty() || pattern.is_empty() {
            return Ok(None);
        }
        let pattern = gmail::extraction_pattern(pattern)?;

        let credentials = self.credentials(credentials_path).await?;
        let gmail = GmailClient::new(self.http.clone(), self.endpoints.gmail_base.clone(), &credentials)?;

        let ids = match gmail
            .list_message_ids(&format!("from:{from}"), INBOX_SCAN_LIMIT)
            .await
        {
            Ok(ids) => ids,
            Err(err) if err.is_remote() => {
                warn!(error = %err, from, "Listing messages failed");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        debug!(from, messages = ids.len(), "Scanning messages");

        for id in ids {
            let message = match gmail.get_message(&id).await {
                Ok(message) => message,
                Err(err) if err.is_remote() => {
                    warn!(error = %err, id = %id, "Fetching message failed");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            if let Some(found) = gmail::first_capture(&pattern, &message)? {
                debug!(id = %id, matched = found.is_some(), "Pattern matched");
                return Ok(found);
            }
        }
        Ok(None)
    }
}
