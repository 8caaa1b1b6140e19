//! Error types for the Google service clients

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport failure talking to Google
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Google answered with a non-success status
    #[error("Google API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Token or client secrets missing, invalid, or rejected
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload could not be decoded (base64, URL)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Extraction pattern is invalid or has no capture group
    #[error("Invalid pattern: {0}")]
    Regex(String),
}

impl From<regex::Error> for ServiceError {
    fn from(err: regex::Error) -> Self {
        ServiceError::Regex(err.to_string())
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::Decode(format!("invalid URL: {err}"))
    }
}

impl ServiceError {
    /// Whether the failure came from the remote side (status or transport)
    pub fn is_remote(&self) -> bool {
        matches!(self, ServiceError::Http(_) | ServiceError::Api { .. })
    }

    /// Pass a successful response through, turn anything else into [`ServiceError::Api`].
    pub(crate) async fn check(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Api {
            status: status.as_u16(),
            message: api_message(&body),
        })
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured { message: String },
    // OAuth endpoints answer {"error": "invalid_grant", ...}
    Code(String),
}

fn api_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorDetail::Structured { message },
        }) => message,
        Ok(ErrorEnvelope {
            error: ErrorDetail::Code(code),
        }) => code,
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_google_error_messages() {
        assert_eq!(
            api_message(r#"{"error": {"code": 404, "message": "Not Found", "errors": []}}"#),
            "Not Found"
        );
        assert_eq!(
            api_message(r#"{"error": "invalid_grant", "error_description": "Bad Request"}"#),
            "invalid_grant"
        );
        assert_eq!(api_message("  upstream down \n"), "upstream down");
    }

    #[test]
    fn remote_classification() {
        let api = ServiceError::Api {
            status: 500,
            message: "boom".into(),
        };
        assert!(api.is_remote());
        assert!(!ServiceError::Credential("missing".into()).is_remote());
        assert_eq!(api.to_string(), "Google API returned 500: boom");
    }
}
