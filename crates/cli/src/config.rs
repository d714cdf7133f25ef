//! CLI configuration: file discovery and command line overrides

use anyhow::{Context, Result};
use directories::ProjectDirs;
use inkdesk_admin::AdminConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Values given on the command line; they win over file and environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub api_url: Option<String>,
}

/// Load the admin configuration, using the platform config file when no
/// explicit file is given and one exists
pub fn load(file: Option<&Path>, overrides: Overrides) -> Result<AdminConfig> {
    let discovered = match file {
        Some(_) => None,
        None => default_config_path().filter(|path| path.exists()),
    };
    let file = file.or(discovered.as_deref());

    let mut config = AdminConfig::load(file).with_context(|| match file {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if let Some(data_dir) = overrides.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(api_url) = overrides.api_url {
        config.api_url = api_url;
    }
    config.validate()?;

    debug!(?config, "Configuration loaded");
    Ok(config)
}

/// Platform config file location, e.g. `~/.config/inkdesk/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "inkdesk", "inkdesk").map(|dirs| dirs.config_dir().join("config.json"))
}

/// Write `config` as pretty JSON, creating parent directories
pub fn save(config: &AdminConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
