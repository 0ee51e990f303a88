//! The real machine behind [`converge::Host`]

use anyhow::{Context, Result};
use converge::{CommandOutput, Host};
use std::fs;
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Runs commands and touches files on the local system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

/// Sibling path used while replacing a file
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.archup-tmp"))
}

/// Fill a staging file, set its mode and rename it over `path`.
///
/// The staging file is removed again when any of those steps fails.
fn replace_via_staging(
    path: &Path,
    mode: u32,
    fill: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    ensure_parent(path)?;
    let staging = staging_path(path);
    let result = fill(&staging)
        .and_then(|()| {
            fs::set_permissions(&staging, fs::Permissions::from_mode(mode))
                .with_context(|| format!("Failed to set mode on {}", staging.display()))
        })
        .and_then(|()| {
            fs::rename(&staging, path)
                .with_context(|| format!("Failed to move into place: {}", path.display()))
        });
    if result.is_err() {
        match fs::remove_file(&staging) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                log::warn!("Could not remove {}: {e}", staging.display());
            }
            _ => {}
        }
    }
    result
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn optional<T>(result: std::io::Result<T>, path: &Path) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

impl Host for SystemHost {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("run: {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute: {} {}", program, args.join(" ")))?;
        Ok(output.into())
    }

    fn run_interactive(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<bool> {
        log::debug!("run (interactive): {} {}", program, args.join(" "));
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        let status = command
            .status()
            .with_context(|| format!("Failed to execute: {} {}", program, args.join(" ")))?;
        Ok(status.success())
    }

    fn command_exists(&self, program: &str) -> bool {
        Command::new("which")
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn effective_uid(&self) -> u32 {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() }
    }

    fn effective_user(&self) -> Result<String> {
        let output = self.run_checked("id", &["-un"])?;
        Ok(output.stdout_str().trim().to_string())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        optional(fs::read_to_string(path), path)
    }

    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        optional(fs::read(path), path)
    }

    fn mode(&self, path: &Path) -> Result<Option<u32>> {
        Ok(optional(fs::metadata(path), path)?.map(|m| m.permissions().mode() & 0o7777))
    }

    fn write_file(&self, path: &Path, contents: &str, mode: u32) -> Result<()> {
        replace_via_staging(path, mode, |staging| {
            fs::write(staging, contents)
                .with_context(|| format!("Failed to write {}", staging.display()))
        })
    }

    fn append_file(&self, path: &Path, contents: &str) -> Result<()> {
        ensure_parent(path)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path, mode: u32) -> Result<()> {
        replace_via_staging(to, mode, |staging| {
            fs::copy(from, staging).map(|_| ()).with_context(|| {
                format!("Failed to copy {} to {}", from.display(), staging.display())
            })
        })
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set mode on {}", path.display()))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).with_context(|| {
            format!("Failed to rename {} to {}", from.display(), to.display())
        })
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))
    }
}

// ============================================================================
// Tests
// ============================================================================
