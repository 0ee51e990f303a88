use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;
use crate::schema::ProvisionConfig;

/// A loaded configuration and where it came from
#[derive(Debug)]
pub struct Loaded {
    pub config: ProvisionConfig,
    /// `None` when the built-in defaults are in use
    pub source: Option<PathBuf>,
}

/// Load the configuration, honouring `--config` / `ARCHUP_CONFIG`
///
/// Falls back to the built-in defaults (with a warning) when no config file
/// exists. The result is always validated.
pub fn load(explicit: Option<&Path>) -> Result<Loaded> {
    let loaded = match paths::resolve_config(explicit) {
        Some(path) => Loaded {
            config: load_from(&path)?,
            source: Some(path),
        },
        None => {
            log::warn!("No config file found, using built-in defaults");
            Loaded {
                config: ProvisionConfig::defaults(),
                source: None,
            }
        }
    };

    loaded.config.validate()?;
    Ok(loaded)
}

/// Parse a config file
pub fn load_from(path: &Path) -> Result<ProvisionConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

/// Render a config as TOML
pub fn render(config: &ProvisionConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}

/// Write the default config to `path`
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }

    let content = render(&ProvisionConfig::defaults())?;
    fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
