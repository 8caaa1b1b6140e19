//! taskdriver CDP session layer.
//!
//! Launches a Chromium instance through `chromiumoxide`, prepares it the way the
//! action interpreter expects (headless toggle, profile selection, user-agent
//! normalization, stale version pruning) and exposes XPath based element
//! operations with an implicit wait.

use std::{env, path::PathBuf};
use which::which;

pub mod session;
pub mod util;

pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use session::ChromeSession;

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
    pub enum AdapterErrorKind {
        #[error("browser launch failed")]
        Launch,
        #[error("navigation failed")]
        Navigation,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target element not found")]
        TargetNotFound,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self { kind, hint: None }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }
    }

    impl From<chromiumoxide::error::CdpError> for AdapterError {
        fn from(err: chromiumoxide::error::CdpError) -> Self {
            AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{env, path::PathBuf, time::Duration};

    /// Configuration for launching and tuning the browser session.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        /// Browser binary; detected from the environment when unset.
        pub executable: Option<PathBuf>,
        pub headless: bool,
        /// Chrome `--user-data-dir`. Only applied together with `profile_directory`.
        pub user_data_dir: Option<PathBuf>,
        /// Chrome `--profile-directory`. Only applied together with `user_data_dir`.
        pub profile_directory: Option<String>,
        /// How long element lookups keep polling before giving up.
        pub implicit_wait_ms: u64,
        pub poll_interval_ms: u64,
        /// Directory holding downloaded browser/driver builds, one subdirectory per version.
        pub driver_cache_dir: Option<PathBuf>,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable(),
                headless: headless_from_env().unwrap_or(true),
                user_data_dir: None,
                profile_directory: profile_from_env(),
                implicit_wait_ms: 2_000,
                poll_interval_ms: 100,
                driver_cache_dir: None,
            }
        }
    }

    impl CdpConfig {
        pub fn implicit_wait(&self) -> Duration {
            Duration::from_millis(self.implicit_wait_ms)
        }

        pub fn poll_interval(&self) -> Duration {
            Duration::from_millis(self.poll_interval_ms.max(1))
        }

        /// Let `TASKDRIVER_HEADLESS`, `TASKDRIVER_CHROME` and `TASKDRIVER_PROFILE`
        /// win over values read from a config file.
        pub fn apply_env_overrides(&mut self) {
            if let Some(headless) = headless_from_env() {
                self.headless = headless;
            }
            if let Some(profile) = profile_from_env() {
                self.profile_directory = Some(profile);
            }
            if let Some(executable) = crate::chrome_from_env() {
                self.executable = Some(executable);
            }
        }

        /// Profile flags, present only when both the data dir and profile are set.
        pub fn profile_args(&self) -> Option<(String, String)> {
            match (&self.user_data_dir, &self.profile_directory) {
                (Some(data_dir), Some(profile)) if !profile.trim().is_empty() => Some((
                    format!("--user-data-dir={}", data_dir.display()),
                    format!("--profile-directory={}", profile.trim()),
                )),
                _ => None,
            }
        }
    }

    fn headless_from_env() -> Option<bool> {
        // "0", "false", "no", "off" means headful
        env::var("TASKDRIVER_HEADLESS").ok().map(|value| {
            let lower = value.trim().to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        })
    }

    fn profile_from_env() -> Option<String> {
        env::var("TASKDRIVER_PROFILE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Locate a Chrome/Chromium binary: `TASKDRIVER_CHROME`, then `PATH`, then the usual install paths.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    chrome_from_env()
        .or_else(|| CHROME_NAMES.iter().find_map(|name| which(name).ok()))
        .or_else(|| {
            INSTALL_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
        })
}

/// `TASKDRIVER_CHROME`, when it names an existing file.
fn chrome_from_env() -> Option<PathBuf> {
    env::var("TASKDRIVER_CHROME")
        .ok()
        .map(|raw| PathBuf::from(raw.trim()))
        .filter(|path| path.exists())
}

#[cfg(target_os = "windows")]
const CHROME_NAMES: &[&str] = &["chrome.exe", "chromium.exe"];
#[cfg(not(target_os = "windows"))]
const CHROME_NAMES: &[&str] = &["google-chrome-stable", "google-chrome", "chromium", "chromium-browser"];

#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];
#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &["/usr/bin/google-chrome-stable", "/usr/bin/google-chrome", "/usr/bin/chromium"];
