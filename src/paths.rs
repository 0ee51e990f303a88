//! Centralized path resolution for archup
//!
//! # Config Resolution Priority
//!
//! 1. `--config <path>` or the `ARCHUP_CONFIG` environment variable
//! 2. `/etc/archup/archup.toml` (where the installer stage stages it)
//! 3. `$XDG_CONFIG_HOME/archup/archup.toml` (or `~/.config/archup/archup.toml`)
//!
//! If none exists, the built-in defaults are used.

use std::path::{Path, PathBuf};

/// Environment variable for the config file override
pub const ENV_CONFIG: &str = "ARCHUP_CONFIG";

/// System-wide config location inside an installed system
pub const SYSTEM_CONFIG: &str = "/etc/archup/archup.toml";

/// Where the installer stage puts the archup binary in the new root
pub const STAGED_BINARY: &str = "/usr/local/bin/archup";

/// Per-user config path (`~/.config/archup/archup.toml`)
pub fn user_config() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("archup").join("archup.toml"))
}

/// The config locations searched when no explicit path is given, in order
pub fn default_config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(user) = user_config() {
        candidates.push(user);
    }
    candidates
}

/// Resolve which config file to load
///
/// An explicit path is returned as-is, even if it does not exist, so that
/// loading it reports a clear error. Otherwise the first existing candidate
/// wins; `None` means "use defaults".
pub fn resolve_config(explicit: Option<&Path>) -> Option<PathBuf> {
    resolve_config_in(explicit, &default_config_candidates())
}

fn resolve_config_in(explicit: Option<&Path>, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        log::debug!("Using explicit config: {}", path.display());
        return Some(path.to_path_buf());
    }

    let found = candidates.iter().find(|c| c.is_file()).cloned();
    match &found {
        Some(path) => log::debug!("Using config: {}", path.display()),
        None => log::debug!("No config file found, using defaults"),
    }
    found
}

/// Expand ~ and environment variables in a path string.
///
/// All config paths go through this before use.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Join an absolute path onto a new root (`/etc/x` under `/mnt` → `/mnt/etc/x`)
pub fn under_root(root: &Path, path: &Path) -> PathBuf {
    root.join(path.strip_prefix("/").unwrap_or(path))
}

/// Home directory of a user on the system being provisioned
pub fn home_of(user: &str) -> PathBuf {
    if user == "root" {
        PathBuf::from("/root")
    } else {
        PathBuf::from("/home").join(user)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_wins_even_if_missing() {
        let result = resolve_config_in(Some(Path::new("/nope/archup.toml")), &[]);
        assert_eq!(result, Some(PathBuf::from("/nope/archup.toml")));
    }

    #[test]
    fn test_first_existing_candidate() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("present.toml");
        std::fs::write(&present, "").unwrap();

        let result = resolve_config_in(None, &[missing, present.clone()]);
        assert_eq!(result, Some(present));
    }

    #[test]
    fn test_no_candidates_means_defaults() {
        let dir = TempDir::new().unwrap();
        let result = resolve_config_in(None, &[dir.path().join("a.toml")]);
        assert!(result.is_none());
    }

    #[test]
    fn test_system_config_is_first_candidate() {
        assert_eq!(
            default_config_candidates()[0],
            PathBuf::from("/etc/archup/archup.toml")
        );
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_under_root() {
        assert_eq!(
            under_root(Path::new("/mnt"), Path::new("/etc/archup/archup.toml")),
            PathBuf::from("/mnt/etc/archup/archup.toml")
        );
        assert_eq!(
            under_root(Path::new("/mnt"), Path::new("root/x.sh")),
            PathBuf::from("/mnt/root/x.sh")
        );
    }

    #[test]
    fn test_home_of() {
        assert_eq!(home_of("alex"), PathBuf::from("/home/alex"));
        assert_eq!(home_of("root"), PathBuf::from("/root"));
    }
}
