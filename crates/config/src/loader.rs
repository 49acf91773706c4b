//! Config file discovery and parsing.
//!
//! Huddle reads one optional file, `huddle.{toml,yaml,yml,json}`: the
//! working directory wins, then the user config directory. When neither
//! has one, a starter `huddle.toml` with the defaults is seeded so there
//! is something to edit. Tests pin discovery to a scratch directory via
//! [`set_config_dir`] and never touch the real home.

use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use crate::schema::HuddleConfig;

const FILE_STEM: &str = "huddle";
const EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

static DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

fn dir_override() -> MutexGuard<'static, Option<PathBuf>> {
    // Poisoning only means a holder panicked; the PathBuf inside is intact.
    DIR_OVERRIDE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pin discovery to a single directory. Replaces any earlier override.
pub fn set_config_dir(path: PathBuf) {
    *dir_override() = Some(path);
}

/// Undo [`set_config_dir`], restoring the normal search order.
pub fn clear_config_dir() {
    *dir_override() = None;
}

/// Parse a config file, picking the format from its extension.
pub fn load_config(path: &Path) -> anyhow::Result<HuddleConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&raw)?),
        Some("json") => Ok(serde_json::from_str(&raw)?),
        Some("toml") | None => Ok(toml::from_str(&raw)?),
        Some(other) => anyhow::bail!("unknown config format: .{other}"),
    }
}

/// Locate and load the config, falling back to [`HuddleConfig::default`].
///
/// A file that fails to parse is reported and skipped for this run rather
/// than aborting startup; a missing file seeds the starter `huddle.toml`.
pub fn discover_and_load() -> HuddleConfig {
    let Some(path) = find_config_file() else {
        let config = HuddleConfig::default();
        if let Err(e) = seed_default_file(&config) {
            warn!(error = %e, "could not write starter config file");
        }
        return config;
    };
    match load_config(&path) {
        Ok(config) => {
            debug!(path = %path.display(), "config loaded");
            config
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "bad config file, using defaults");
            HuddleConfig::default()
        },
    }
}

/// Directories searched, in order. An override replaces the whole list.
fn search_dirs() -> Vec<PathBuf> {
    if let Some(dir) = dir_override().clone() {
        return vec![dir];
    }
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(dir) = user_config_dir() {
        dirs.push(dir);
    }
    dirs
}

fn find_config_file() -> Option<PathBuf> {
    search_dirs()
        .into_iter()
        .flat_map(|dir| {
            EXTENSIONS
                .iter()
                .map(move |ext| dir.join(format!("{FILE_STEM}.{ext}")))
        })
        .find(|candidate| candidate.exists())
}

fn user_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|base| base.home_dir().join(".config").join(FILE_STEM))
}

/// Write a `huddle.toml` holding the defaults, unless one already exists.
fn seed_default_file(config: &HuddleConfig) -> anyhow::Result<()> {
    let Some(dir) = dir_override().clone().or_else(user_config_dir) else {
        return Ok(());
    };
    let path = dir.join(format!("{FILE_STEM}.toml"));
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, toml::to_string_pretty(config)?)?;
    debug!(path = %path.display(), "seeded starter config");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.toml");
        std::fs::write(&path, "[gateway]\nport = 9000\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.gateway.port, 9000);
        // Unspecified sections keep their defaults.
        assert_eq!(cfg.gateway.bind, "127.0.0.1");
        assert_eq!(cfg.store.path, "huddle-store.json");
    }

    #[test]
    fn loads_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huddle.json");
        std::fs::write(&path, r#"{"store": {"path": "/tmp/h.json"}}"#).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.store.path, "/tmp/h.json");
    }

    // One test owns the override static; splitting it would race under the
    // parallel test runner.
    #[test]
    fn discovery_respects_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        set_config_dir(dir.path().to_path_buf());

        // Empty directory: defaults come back and a starter file is seeded.
        let cfg = discover_and_load();
        assert_eq!(cfg.gateway.port, 18790);
        assert!(dir.path().join("huddle.toml").exists());

        std::fs::write(dir.path().join("huddle.toml"), "[gateway]\nport = 4444\n").unwrap();
        let cfg = discover_and_load();
        clear_config_dir();

        assert_eq!(cfg.gateway.port, 4444);
    }
}
