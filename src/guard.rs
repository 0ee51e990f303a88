//! Pre-flight guards
//!
//! Every stage runs these before its first mutating step:
//! - effective identity (root, or a specific non-root user)
//! - required input files
//! - required binaries on `PATH`
//! - network reachability
//!
//! A failing guard aborts the stage before anything on the system changes.

use converge::Host;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Who a stage must run as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Root,
    /// A named user, which must not be root
    User(String),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::User(name) => write!(f, "{name}"),
        }
    }
}

/// A binary missing from `PATH` and the package that provides it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBinary {
    pub binary: String,
    pub package: &'static str,
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("must run as {expected}, but running as {actual}")]
    WrongIdentity { expected: Identity, actual: String },

    #[error("must not run as root; log in as {user} and run it again")]
    RunningAsRoot { user: String },

    #[error("could not determine the current user: {0}")]
    UnknownIdentity(String),

    #[error("required file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("missing required binaries: {}", format_missing(.0))]
    MissingBinaries(Vec<MissingBinary>),

    #[error("network unreachable (ping {host} failed)")]
    NoNetwork { host: String },
}

fn format_missing(missing: &[MissingBinary]) -> String {
    let names: Vec<String> = missing
        .iter()
        .map(|m| format!("{} (pacman -S {})", m.binary, m.package))
        .collect();
    names.join(", ")
}

/// Check the effective identity
///
/// Runs no commands when the identity is root; for a named user the login
/// name is looked up through the host.
pub fn ensure_identity(host: &dyn Host, required: &Identity) -> Result<(), GuardError> {
    match required {
        Identity::Root => {
            if host.is_root() {
                return Ok(());
            }
            let actual = host
                .effective_user()
                .unwrap_or_else(|_| format!("uid {}", host.effective_uid()));
            Err(GuardError::WrongIdentity {
                expected: Identity::Root,
                actual,
            })
        }
        Identity::User(name) => {
            if host.is_root() {
                return Err(GuardError::RunningAsRoot { user: name.clone() });
            }
            let actual = host
                .effective_user()
                .map_err(|e| GuardError::UnknownIdentity(format!("{e:#}")))?;
            if &actual == name {
                Ok(())
            } else {
                Err(GuardError::WrongIdentity {
                    expected: required.clone(),
                    actual,
                })
            }
        }
    }
}

pub fn ensure_input_file(host: &dyn Host, path: &Path) -> Result<(), GuardError> {
    if host.exists(path) && !host.is_dir(path) {
        Ok(())
    } else {
        Err(GuardError::MissingInput(path.to_path_buf()))
    }
}

/// Binaries from `binaries` that are not on `PATH`
pub fn missing_binaries(host: &dyn Host, binaries: &[&str]) -> Vec<MissingBinary> {
    binaries
        .iter()
        .filter(|b| !host.command_exists(b))
        .map(|b| MissingBinary {
            binary: (*b).to_string(),
            package: package_for_binary(b),
        })
        .collect()
}

pub fn ensure_binaries(host: &dyn Host, binaries: &[&str]) -> Result<(), GuardError> {
    let missing = missing_binaries(host, binaries);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GuardError::MissingBinaries(missing))
    }
}

pub fn network_reachable(host: &dyn Host, probe_host: &str) -> bool {
    host.run("ping", &["-c", "1", "-W", "5", probe_host])
        .map(|o| o.success)
        .unwrap_or(false)
}

pub fn ensure_network(host: &dyn Host, probe_host: &str) -> Result<(), GuardError> {
    if network_reachable(host, probe_host) {
        Ok(())
    } else {
        Err(GuardError::NoNetwork {
            host: probe_host.to_string(),
        })
    }
}

/// Map binary names to the Arch package that ships them
pub fn package_for_binary(binary: &str) -> &'static str {
    match binary {
        "archinstall" => "archinstall",
        "pacman" => "pacman",
        "makepkg" => "pacman",
        "git" => "git",
        "sudo" => "sudo",
        "visudo" => "sudo",
        "useradd" | "passwd" => "shadow",
        "systemctl" => "systemd",
        "mount" => "util-linux",
        "ping" => "iputils",
        "ufw" => "ufw",
        "grub-mkconfig" => "grub",
        "chown" | "id" => "coreutils",
        "yay" => "yay (AUR)",
        "paru" => "paru (AUR)",
        _ => "unknown",
    }
}

// ============================================================================
// Tests
// ============================================================================
