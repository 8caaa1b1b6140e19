use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use crate::config::Config;
use google_services::{AuthorizationFlow, GoogleServices, InstalledAppFlow, PromptingFlow};

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    google: OnceCell<Arc<GoogleServices>>,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            google: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn token_path(&self) -> &Path {
        &self.config.google.token_path
    }

    /// Google service facade, built on first use.
    ///
    /// New authorizations go through the local-redirect consent flow when
    /// `google.client_secrets` is configured, otherwise the secrets path is
    /// asked for on stdin.
    pub async fn google(&self) -> Result<Arc<GoogleServices>> {
        self.google
            .get_or_try_init(|| async {
                let http = reqwest::Client::new();
                let flow: Arc<dyn AuthorizationFlow> = match &self.config.google.client_secrets {
                    Some(path) => Arc::new(
                        InstalledAppFlow::from_client_secrets_file(path, http.clone())
                            .with_context(|| {
                                format!("Failed to load client secrets from {}", path.display())
                            })?,
                    ),
                    None => Arc::new(PromptingFlow::new(http.clone())),
                };
                Ok::<_, anyhow::Error>(Arc::new(GoogleServices::with_client(
                    http,
                    self.config.google.endpoints.clone(),
                    flow,
                )))
            })
            .await
            .map(Arc::clone)
    }
}
