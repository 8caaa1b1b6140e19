use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// What `config/local.env` contributed. Loading happens before logging is
/// initialised, so the outcome is reported afterwards through [`Self::log`].
#[derive(Debug)]
pub enum LocalEnvOverrides {
    Absent,
    Loaded {
        path: PathBuf,
        applied: usize,
        invalid_lines: Vec<usize>,
    },
    Unreadable {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl LocalEnvOverrides {
    pub fn log(&self) {
        match self {
            LocalEnvOverrides::Absent => {}
            LocalEnvOverrides::Loaded {
                path,
                applied,
                invalid_lines,
            } => {
                for line in invalid_lines {
                    warn!(path = %path.display(), line, "invalid local.env entry; skipped");
                }
                info!(path = %path.display(), applied, "Loaded environment overrides from local.env");
            }
            LocalEnvOverrides::Unreadable { path, error } => {
                warn!(path = %path.display(), %error, "failed to read local.env overrides");
            }
        }
    }
}

pub fn load_local_env_overrides() -> LocalEnvOverrides {
    let path = Path::new("config/local.env");
    if !path.exists() {
        return LocalEnvOverrides::Absent;
    }

    match stdfs::read_to_string(path) {
        Ok(contents) => {
            let (pairs, invalid_lines) = parse_env_lines(&contents);
            let mut applied = 0;
            for (key, value) in pairs {
                if env::var(&key).is_ok() {
                    continue;
                }
                env::set_var(key, value);
                applied += 1;
            }
            LocalEnvOverrides::Loaded {
                path: path.to_path_buf(),
                applied,
                invalid_lines,
            }
        }
        Err(error) => LocalEnvOverrides::Unreadable {
            path: path.to_path_buf(),
            error,
        },
    }
}

/// Key/value pairs, plus the 1-based numbers of lines without `=`.
fn parse_env_lines(contents: &str) -> (Vec<(String, String)>, Vec<usize>) {
    let mut pairs = Vec::new();
    let mut invalid = Vec::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            invalid.push(idx + 1);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), unescape_value(value.trim())));
    }
    (pairs, invalid)
}

/// Logs go to stderr so captured script output on stdout stays clean.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => {
            // Priority: ./config/config.yaml > ~/.config/taskdriver/config.yaml
            let local_config = PathBuf::from("config/config.yaml");
            if local_config.exists() {
                local_config
            } else {
                let mut path = dirs::config_dir().context("Failed to get config directory")?;
                path.push("taskdriver");
                path.push("config.yaml");
                path
            }
        }
    };

    if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;

        let config = Config::from_yaml_str(&content).context("Failed to parse config file")?;

        info!("Loaded configuration from: {}", config_path.display());
        Ok(LoadedConfig {
            config,
            path: config_path,
        })
    } else {
        info!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Ok(LoadedConfig {
            config: Config::default(),
            path: config_path,
        })
    }
}

/// Environment wins over the config file for browser settings.
pub fn apply_env_overrides(config: &mut Config) {
    config.browser.apply_env_overrides();
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}
