//! Service endpoint configuration

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ServiceError;

pub const DEFAULT_CALENDAR_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Base URLs of the REST APIs. Overridable so tests can point at a mock server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoints {
    pub calendar_base: String,
    pub gmail_base: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            calendar_base: DEFAULT_CALENDAR_BASE.to_string(),
            gmail_base: DEFAULT_GMAIL_BASE.to_string(),
        }
    }
}

/// Append percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ServiceError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| ServiceError::Decode(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
