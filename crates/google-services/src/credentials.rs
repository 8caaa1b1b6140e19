//! Authorized-user OAuth credentials
//!
//! The token file uses the authorized-user JSON layout shared with Google's
//! client libraries (`token`, `refresh_token`, `token_uri`, `client_id`,
//! `client_secret`, `scopes`, `expiry`), so existing token files keep working.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::errors::ServiceError;
use crate::flow::AuthorizationFlow;

/// Scopes requested for every token.
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
];

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are treated as expired this long before their actual expiry.
const REFRESH_THRESHOLD_SECS: i64 = 225;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, with = "expiry_format", skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Token endpoint response for both code exchange and refresh
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Credentials {
    pub fn from_authorized_user_file(path: &Path) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|err| {
            ServiceError::Credential(format!("invalid token file {}: {err}", path.display()))
        })
    }

    pub fn to_json(&self) -> Result<String, ServiceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// True once the expiry (minus the refresh threshold) has passed.
    /// Credentials without an expiry never expire.
    pub fn expired(&self) -> bool {
        self.expiry
            .map(|expiry| Utc::now() >= expiry - Duration::seconds(REFRESH_THRESHOLD_SECS))
            .unwrap_or(false)
    }

    pub fn valid(&self) -> bool {
        self.token.is_some() && !self.expired()
    }

    pub fn access_token(&self) -> Result<&str, ServiceError> {
        self.token
            .as_deref()
            .ok_or_else(|| ServiceError::Credential("credentials carry no access token".into()))
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&mut self, http: &reqwest::Client) -> Result<(), ServiceError> {
        let refresh_token = self
            .refresh_token
            .clone()
            .ok_or_else(|| ServiceError::Credential("no refresh token available".into()))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = http.post(&self.token_uri).form(&form).send().await?;
        let response = ServiceError::check(response).await.map_err(|err| match err {
            ServiceError::Api { status, message } => {
                ServiceError::Credential(format!("token refresh rejected ({status}): {message}"))
            }
            other => other,
        })?;
        let tokens: TokenResponse = response.json().await?;
        self.apply(tokens);
        info!(client_id = %self.client_id, "Refreshed access token");
        Ok(())
    }

    pub(crate) fn apply(&mut self, tokens: TokenResponse) {
        self.token = Some(tokens.access_token);
        self.expiry = tokens
            .expires_in
            .map(|seconds| Utc::now() + Duration::seconds(seconds));
        if let Some(refresh_token) = tokens.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = tokens.scope {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
    }
}

/// Load usable credentials from `token_path`, refreshing or re-authorizing as
/// needed, and write the result back whenever it changed.
pub async fn get_credentials(
    token_path: &Path,
    flow: &dyn AuthorizationFlow,
    http: &reqwest::Client,
) -> Result<Credentials, ServiceError> {
    let stored = if token_path.is_file() {
        let mut credentials = Credentials::from_authorized_user_file(token_path)?;
        credentials.scopes = SCOPES.iter().map(|scope| scope.to_string()).collect();
        Some(credentials)
    } else {
        None
    };

    let credentials = match stored {
        Some(credentials) if credentials.valid() => {
            debug!(path = %token_path.display(), "Using stored credentials");
            return Ok(credentials);
        }
        Some(mut credentials) if credentials.expired() && credentials.refresh_token.is_some() => {
            credentials.refresh(http).await?;
            credentials
        }
        _ => {
            info!(path = %token_path.display(), "Authorization required");
            flow.authorize(&SCOPES).await?
        }
    };

    tokio::fs::write(token_path, credentials.to_json()?).await?;
    debug!(path = %token_path.display(), "Persisted credentials");
    Ok(credentials)
}

// Microsecond precision, `Z` suffix: the layout Google's client libraries read back.
mod expiry_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(expiry) => serializer.serialize_str(&expiry.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(parsed.with_timezone(&Utc)));
        }
        // Naive timestamps are UTC
        NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::AuthorizationFlow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingFlow {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationFlow for CountingFlow {
        async fn authorize(&self, scopes: &[&str]) -> Result<Credentials, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Credentials {
                token: Some("fresh-from-flow".into()),
                refresh_token: Some("refresh-1".into()),
                token_uri: DEFAULT_TOKEN_URI.into(),
                client_id: "client".into(),
                client_secret: "secret".into(),
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
                expiry: Some(Utc::now() + Duration::hours(1)),
            })
        }
    }

    fn flow() -> CountingFlow {
        CountingFlow {
            calls: AtomicUsize::new(0),
        }
    }

    fn stored(token_uri: &str, expiry: DateTime<Utc>) -> Credentials {
        Credentials {
            token: Some("old-token".into()),
            refresh_token: Some("refresh-1".into()),
            token_uri: token_uri.into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            scopes: vec![],
            expiry: Some(expiry),
        }
    }

    #[test]
    fn expiry_threshold() {
        let mut credentials = stored(DEFAULT_TOKEN_URI, Utc::now() + Duration::seconds(100));
        assert!(credentials.expired());
        assert!(!credentials.valid());

        credentials.expiry = Some(Utc::now() + Duration::seconds(600));
        assert!(credentials.valid());

        credentials.expiry = None;
        assert!(!credentials.expired());
        credentials.token = None;
        assert!(!credentials.valid());
    }

    #[test]
    fn reads_authorized_user_token_files() {
        let raw = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/calendar"],
            "universe_domain": "googleapis.com",
            "account": "",
            "expiry": "2030-01-02T03:04:05.678901Z"
        }"#;
        let credentials: Credentials = serde_json::from_str(raw).unwrap();
        assert_eq!(credentials.token.as_deref(), Some("ya29.a0"));
        let expiry = credentials.expiry.unwrap();
        assert_eq!(expiry.format("%Y-%m-%d %H:%M:%S").to_string(), "2030-01-02 03:04:05");

        let json = credentials.to_json().unwrap();
        assert!(json.contains(r#""expiry":"2030-01-02T03:04:05.678901Z""#), "{json}");
    }

    #[tokio::test]
    async fn uses_valid_stored_token_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let credentials = stored(DEFAULT_TOKEN_URI, Utc::now() + Duration::hours(1));
        std::fs::write(&token_path, credentials.to_json().unwrap()).unwrap();

        let flow = flow();
        let loaded = get_credentials(&token_path, &flow, &reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(loaded.token.as_deref(), Some("old-token"));
        assert_eq!(loaded.scopes.len(), SCOPES.len());
        assert_eq!(flow.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refreshes_expired_token_and_persists_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let expired = stored(&format!("{}/token", server.uri()), Utc::now() - Duration::hours(1));
        std::fs::write(&token_path, expired.to_json().unwrap()).unwrap();

        let flow = flow();
        let refreshed = get_credentials(&token_path, &flow, &reqwest::Client::new())
            .await
            .unwrap();

        assert_eq!(refreshed.token.as_deref(), Some("new-token"));
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-1"));
        assert!(refreshed.valid());
        assert_eq!(flow.calls.load(Ordering::SeqCst), 0);

        let persisted = Credentials::from_authorized_user_file(&token_path).unwrap();
        assert_eq!(persisted.token.as_deref(), Some("new-token"));
    }

    #[tokio::test]
    async fn rejected_refresh_is_a_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let mut credentials = stored(&format!("{}/token", server.uri()), Utc::now() - Duration::hours(1));
        let err = credentials.refresh(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Credential(ref msg) if msg.contains("invalid_grant")), "{err}");
    }

    #[tokio::test]
    async fn runs_flow_when_no_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");

        let flow = flow();
        let credentials = get_credentials(&token_path, &flow, &reqwest::Client::new())
            .await
            .unwrap();

        assert_eq!(credentials.token.as_deref(), Some("fresh-from-flow"));
        assert_eq!(flow.calls.load(Ordering::SeqCst), 1);
        assert!(token_path.is_file());
    }

    #[tokio::test]
    async fn runs_flow_when_expired_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let mut expired = stored(DEFAULT_TOKEN_URI, Utc::now() - Duration::hours(1));
        expired.refresh_token = None;
        std::fs::write(&token_path, expired.to_json().unwrap()).unwrap();

        let flow = flow();
        get_credentials(&token_path, &flow, &reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(flow.calls.load(Ordering::SeqCst), 1);
    }
}
