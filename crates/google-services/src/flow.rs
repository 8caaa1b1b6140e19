//! Authorization flows that produce fresh credentials
//!
//! [`InstalledAppFlow`] is the desktop-app OAuth flow: it opens a loopback
//! listener on an ephemeral port, asks the user to visit the consent URL, and
//! exchanges the returned code (with PKCE) for tokens. [`PromptingFlow`] asks
//! for the client secrets path on stdin first.

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::credentials::{Credentials, TokenResponse, DEFAULT_TOKEN_URI};
use crate::errors::ServiceError;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

const SUCCESS_PAGE: &str = "The authentication flow has completed. You may close this window.";

// How long open browser connections may keep the redirect server alive.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Strategy for obtaining new credentials when the stored token is unusable
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self, scopes: &[&str]) -> Result<Credentials, ServiceError>;
}

/// OAuth client registration, as downloaded from the Google Cloud console
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClientSecretsFile {
    Installed(ClientSecrets),
    Web(ClientSecrets),
}

impl ClientSecrets {
    pub fn from_json(raw: &str) -> Result<Self, ServiceError> {
        let file: ClientSecretsFile = serde_json::from_str(raw).map_err(|err| {
            ServiceError::Credential(format!(
                "client secrets must contain an \"installed\" or \"web\" client: {err}"
            ))
        })?;
        Ok(match file {
            ClientSecretsFile::Installed(secrets) | ClientSecretsFile::Web(secrets) => secrets,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ServiceError::Credential(format!("cannot read client secrets {}: {err}", path.display()))
        })?;
        Self::from_json(&raw)
    }
}

/// Desktop-app consent flow with a loopback redirect
pub struct InstalledAppFlow {
    secrets: ClientSecrets,
    http: reqwest::Client,
}

impl InstalledAppFlow {
    pub fn new(secrets: ClientSecrets, http: reqwest::Client) -> Self {
        Self { secrets, http }
    }

    pub fn from_client_secrets_file(path: &Path, http: reqwest::Client) -> Result<Self, ServiceError> {
        Ok(Self::new(ClientSecrets::from_file(path)?, http))
    }

    pub fn authorization_url(
        &self,
        scopes: &[&str],
        redirect_uri: &str,
        challenge: &str,
        state: &str,
    ) -> Result<Url, ServiceError> {
        let scope = scopes.join(" ");
        Ok(Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state),
                ("code_challenge", challenge),
                ("code_challenge_method", "S256"),
                ("access_type", "offline"),
            ],
        )?)
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: &str,
        scopes: &[&str],
    ) -> Result<Credentials, ServiceError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier),
        ];
        let response = self.http.post(&self.secrets.token_uri).form(&form).send().await?;
        let response = ServiceError::check(response).await.map_err(|err| match err {
            ServiceError::Api { status, message } => {
                ServiceError::Credential(format!("code exchange rejected ({status}): {message}"))
            }
            other => other,
        })?;
        let tokens: TokenResponse = response.json().await?;

        let mut credentials = Credentials {
            token: None,
            refresh_token: None,
            token_uri: self.secrets.token_uri.clone(),
            client_id: self.secrets.client_id.clone(),
            client_secret: self.secrets.client_secret.clone(),
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
            expiry: None,
        };
        credentials.apply(tokens);
        Ok(credentials)
    }
}

#[async_trait]
impl AuthorizationFlow for InstalledAppFlow {
    async fn authorize(&self, scopes: &[&str]) -> Result<Credentials, ServiceError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");

        let verifier = random_token(32);
        let challenge = pkce_challenge(&verifier);
        let state = random_token(16);

        let url = self.authorization_url(scopes, &redirect_uri, &challenge, &state)?;
        println!("Please visit this URL to authorize this application: {url}");
        info!(port, "Waiting for the authorization redirect");

        let code = wait_for_redirect(listener, &state).await?;
        self.exchange_code(&code, &redirect_uri, &verifier, scopes).await
    }
}

/// Asks for the client secrets location on stdin, then runs [`InstalledAppFlow`]
pub struct PromptingFlow {
    prompt: String,
    http: reqwest::Client,
}

impl PromptingFlow {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            prompt: "Path to client_secrets.json: ".to_string(),
            http,
        }
    }

    async fn read_path(&self) -> Result<PathBuf, ServiceError> {
        let prompt = self.prompt.clone();
        let line = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            use std::io::Write;
            let mut stdout = std::io::stdout();
            stdout.write_all(prompt.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|err| ServiceError::Credential(format!("prompt task failed: {err}")))??;
        Ok(PathBuf::from(line.trim()))
    }
}

#[async_trait]
impl AuthorizationFlow for PromptingFlow {
    async fn authorize(&self, scopes: &[&str]) -> Result<Credentials, ServiceError> {
        let path = self.read_path().await?;
        InstalledAppFlow::from_client_secrets_file(&path, self.http.clone())?
            .authorize(scopes)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type RedirectOutcome = Result<String, ServiceError>;

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    outcome: Arc<Mutex<Option<oneshot::Sender<RedirectOutcome>>>>,
}

async fn redirect_handler(
    State(state): State<RedirectState>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, &'static str) {
    let outcome = match params {
        RedirectParams {
            error: Some(error), ..
        } => Err(ServiceError::Credential(format!("authorization denied: {error}"))),
        RedirectParams {
            code: Some(code),
            state: returned,
            ..
        } => {
            if returned.as_deref() == Some(&*state.expected_state) {
                Ok(code)
            } else {
                warn!("Authorization response state mismatch");
                Err(ServiceError::Credential(
                    "authorization response state does not match the request".into(),
                ))
            }
        }
        _ => {
            debug!("Ignoring request without authorization response");
            return (StatusCode::NOT_FOUND, "");
        }
    };

    let sender = state
        .outcome
        .lock()
        .map(|mut slot| slot.take())
        .unwrap_or_default();
    match sender {
        Some(sender) => {
            let _ = sender.send(outcome);
            (StatusCode::OK, SUCCESS_PAGE)
        }
        None => (StatusCode::GONE, "This authorization response was already received."),
    }
}

/// Serve the loopback redirect until it carries a code or an error, then
/// shut the server down.
pub(crate) async fn wait_for_redirect(
    listener: TcpListener,
    expected_state: &str,
) -> Result<String, ServiceError> {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let state = RedirectState {
        expected_state: Arc::from(expected_state),
        outcome: Arc::new(Mutex::new(Some(outcome_tx))),
    };
    let router = Router::new()
        .route("/", get(redirect_handler))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = outcome_rx.await.map_err(|_| {
        ServiceError::Credential("redirect listener stopped before authorization completed".into())
    });
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => warn!(error = %err, "Redirect listener failed"),
        Ok(Err(err)) => warn!(error = %err, "Redirect listener task failed"),
        Err(_) => debug!("Redirect listener still draining connections; leaving it"),
    }
    outcome?
}

fn random_token(bytes: usize) -> String {
    let raw: Vec<u8> = (0..bytes).map(|_| rand::random::<u8>()).collect();
    URL_SAFE_NO_PAD.encode(raw)
}

pub(crate) fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
