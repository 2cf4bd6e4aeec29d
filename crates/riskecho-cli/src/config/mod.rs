//! Configuration file resolution and loading.

use std::path::{Path, PathBuf};

use anyhow::Context;

use riskecho::EngineConfig;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "RISKECHO_CONFIG";

/// Configuration file picked up from the working directory when present.
pub const LOCAL_CONFIG: &str = ".riskecho/config.json";

/// Resolve the configuration file path.
///
/// Order: explicit flag, then `RISKECHO_CONFIG`, then `./.riskecho/config.json`
/// if it exists. `None` means built-in defaults.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    resolve_config_path_from(
        explicit,
        std::env::var(CONFIG_ENV).ok(),
        Path::new(LOCAL_CONFIG),
    )
}

/// Resolution with its inputs passed in.
pub fn resolve_config_path_from(
    explicit: Option<&str>,
    env_path: Option<String>,
    local: &Path,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env_path.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }

    local.exists().then(|| local.to_path_buf())
}

/// Load the effective engine configuration.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<EngineConfig> {
    match resolve_config_path(explicit) {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => {
            tracing::debug!("No configuration file found, using built-in defaults");
            Ok(EngineConfig::default())
        }
    }
}
