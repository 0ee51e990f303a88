//! Apply context and provider traits
//!
//! These traits keep the executor independent of the real machine, the
//! terminal UI and interactive prompts.

use crate::types::{CommandOutput, Outcome};
use anyhow::Result;
use std::path::Path;

/// Provider for the live system state.
///
/// Query methods never mutate; action methods are the only way a step
/// changes the system. The domain queries (`user_exists`,
/// `package_installed`, `service_enabled`) have default implementations in
/// terms of [`Host::run`], which a fake host can override with in-memory
/// state.
pub trait Host {
    /// Run a command to completion and capture its output
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command attached to the terminal, optionally in a working
    /// directory. Returns whether it exited successfully.
    fn run_interactive(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<bool>;

    /// Check if a program is on `PATH`
    fn command_exists(&self, program: &str) -> bool;

    /// Effective uid of this process
    fn effective_uid(&self) -> u32;

    /// Login name for the effective uid
    fn effective_user(&self) -> Result<String>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Read a text file, `None` if it does not exist
    fn read_file(&self, path: &Path) -> Result<Option<String>>;

    /// Read a file as bytes, `None` if it does not exist
    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Permission bits of a path, `None` if it does not exist
    fn mode(&self, path: &Path) -> Result<Option<u32>>;

    /// Replace a file's contents and set its mode
    fn write_file(&self, path: &Path, contents: &str, mode: u32) -> Result<()>;

    /// Append to a file, creating it if needed
    fn append_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Copy a file and set the mode on the destination
    fn copy_file(&self, from: &Path, to: &Path, mode: u32) -> Result<()>;

    fn set_mode(&self, path: &Path, mode: u32) -> Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    fn is_root(&self) -> bool {
        self.effective_uid() == 0
    }

    fn user_exists(&self, name: &str) -> Result<bool> {
        Ok(self.run("id", &["-u", name])?.success)
    }

    fn package_installed(&self, name: &str) -> Result<bool> {
        Ok(self.run("pacman", &["-Q", name])?.success)
    }

    fn service_enabled(&self, unit: &str) -> Result<bool> {
        Ok(self.run("systemctl", &["is-enabled", "--quiet", unit])?.success)
    }

    /// Run a command and fail with its error output if it exits non-zero
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(program, args)?;
        if !output.success {
            anyhow::bail!("{} {} failed: {}", program, args.join(" "), output.error_text());
        }
        Ok(output)
    }
}

/// Progress callback for execution
pub trait ProgressCallback {
    /// Called once before the first step
    fn on_plan_start(&mut self, total: usize);

    /// Called before a step's check runs
    fn on_step_start(&mut self, id: &str, description: &str, interactive: bool);

    /// Called when a step's outcome is known
    fn on_step_complete(&mut self, id: &str, description: &str, outcome: &Outcome);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_plan_start(&mut self, _total: usize) {}
    fn on_step_start(&mut self, _id: &str, _description: &str, _interactive: bool) {}
    fn on_step_complete(&mut self, _id: &str, _description: &str, _outcome: &Outcome) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to step apply operations
pub struct ApplyContext<'a> {
    /// The system being provisioned
    pub host: &'a dyn Host,
}

impl<'a> ApplyContext<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        Self { host }
    }
}
