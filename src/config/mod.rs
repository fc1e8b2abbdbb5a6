//! Server configuration loading - YAML document plus environment
//! overrides (§6 "Server config").

pub mod settings;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub use settings::*;

/// Load the server config from a YAML file, then apply environment
/// variable overrides (mirrors the way the teacher's `load_config`
/// layers `config.yml` + env vars, minus the deployment-overlay step this
/// crate has no use for).
pub fn load_config(path: &Path) -> Result<PollerConfig> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str::<PollerConfig>(&contents).with_context(|| format!("parsing config file {}", path.display()))?
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        PollerConfig::default()
    };

    config.apply_env_overrides();
    Ok(config)
}

/// mtime of the config file, or `None` if it can't be stat'd (treated as
/// "unchanged" by the Orchestrator's change detection, §4.E).
pub fn config_mtime(path: &Path) -> Option<std::time::SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
