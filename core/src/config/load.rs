use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AppConfig;

pub const DEFAULT_CONFIG_FILE: &str = "autopilot.toml";

pub fn load_default() -> Result<AppConfig, ConfigError> {
    let mut cfg = if Path::new(DEFAULT_CONFIG_FILE).exists() {
        load_from(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        AppConfig::default()
    };
    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok());
    Ok(cfg)
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<AppConfig>(&s).map_err(ConfigError::Parse)
}

/// Environment overrides. Empty values are ignored.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("AUTOPILOT_OUTPUT_ROOT_PATH") {
        cfg.output_root_path = v;
    }
    if let Some(v) = get("AUTOPILOT_JUNIT_REPORT_PATH") {
        cfg.junit.output_path = v;
    }
    if let Some(v) = get("AUTOPILOT_FILE_LOGGER_OUTPUT_PATH") {
        cfg.file_logger.output_path = v;
    }
    if let Some(v) = get("AUTOPILOT_SLACK_TOKEN") {
        cfg.slack.token = v;
    }
    if let Some(v) = get("AUTOPILOT_SLACK_CHANNELS") {
        cfg.slack.channels = split_list(&v);
    }
}

pub fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Resolves an output path: `arg` wins over `configured`; relative paths are
/// joined to `root`. Returns `None` when nothing is configured.
pub fn resolve_output_path(root: &str, configured: &str, arg: Option<&str>) -> Option<PathBuf> {
    let raw = match arg {
        Some(a) if !a.trim().is_empty() => a,
        _ => configured,
    };
    if raw.trim().is_empty() {
        return None;
    }
    let expanded = PathBuf::from(shellexpand::tilde(raw.trim()).as_ref());
    if expanded.is_absolute() || root.trim().is_empty() {
        return Some(expanded);
    }
    let root = PathBuf::from(shellexpand::tilde(root.trim()).as_ref());
    Some(root.join(expanded))
}
