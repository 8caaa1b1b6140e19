use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

static VERSION_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+\.\d+$").expect("valid version pattern"));

/// Strip the `Headless` marker Chrome adds to its user agent in headless mode.
pub fn normalize_user_agent(user_agent: &str) -> String {
    user_agent.replace("Headless", "")
}

/// Remove every version directory under `cache_dir` except the newest one.
///
/// Only direct subdirectories named like `128.0.6613.84` are considered. Age is
/// taken from the creation time, or the modification time where the platform
/// does not record creation. Returns the removed paths.
pub fn prune_stale_versions(cache_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut versions: Vec<(SystemTime, PathBuf)> = Vec::new();

    for entry in fs::read_dir(cache_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let is_version = entry
            .file_name()
            .to_str()
            .map(|name| VERSION_DIR.is_match(name))
            .unwrap_or(false);
        if !is_version {
            continue;
        }
        let metadata = entry.metadata()?;
        let stamp = metadata.created().or_else(|_| metadata.modified())?;
        versions.push((stamp, path));
    }

    versions.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = Vec::new();
    for (_, path) in versions.into_iter().skip(1) {
        debug!(path = %path.display(), "removing stale browser version");
        fs::remove_dir_all(&path)?;
        removed.push(path);
    }

    if !removed.is_empty() {
        info!(
            cache_dir = %cache_dir.display(),
            removed = removed.len(),
            "pruned stale browser versions"
        );
    }

    Ok(removed)
}
