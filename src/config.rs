//! Application configuration
//!
//! Loaded from YAML. Every section and field is optional:
//!
//! ```yaml
//! browser:
//!   headless: false
//!   user_data_dir: /home/me/.config/google-chrome
//!   profile_directory: Default
//!   implicit_wait_ms: 2000
//!   driver_cache_dir: /home/me/.cache/chrome-for-testing/linux64
//! google:
//!   token_path: token.json
//!   client_secrets: client_secrets.json
//! ```

use cdp_adapter::CdpConfig;
use google_services::ServiceEndpoints;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: CdpConfig,
    pub google: GoogleConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Authorized-user token file, created on first authorization
    pub token_path: PathBuf,
    /// OAuth client secrets. Prompted for on stdin when unset and a new
    /// authorization is needed.
    pub client_secrets: Option<PathBuf>,
    #[serde(flatten)]
    pub endpoints: ServiceEndpoints,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            client_secrets: None,
            endpoints: ServiceEndpoints::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document means "all defaults"
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}
