//! File resources - managed files, one-time templates, staged copies,
//! user-owned scripts and directories

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

/// Compare a file on the host against the wanted contents and mode
fn file_state(host: &dyn Host, path: &Path, contents: &[u8], mode: u32) -> Result<StepState> {
    let Some(current) = host.read_bytes(path)? else {
        return Ok(StepState::Missing);
    };
    if current != contents {
        return Ok(StepState::drifted("content differs"));
    }
    match host.mode(path)? {
        Some(actual) if actual != mode => Ok(StepState::drifted(format!(
            "mode {actual:o}, want {mode:o}"
        ))),
        _ => Ok(StepState::satisfied()),
    }
}

fn created_or_modified(existed: bool) -> ApplyResult {
    if existed {
        ApplyResult::Modified
    } else {
        ApplyResult::Created
    }
}

// ============================================================================
// ManagedFile
// ============================================================================

/// A file whose entire contents archup owns
#[derive(Debug, Clone)]
pub struct ManagedFile {
    pub path: PathBuf,
    pub contents: String,
    pub mode: u32,
    pub fatal: bool,
    label: Option<String>,
}

impl ManagedFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>, mode: u32) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            mode,
            fatal: false,
            label: None,
        }
    }

    /// Abort the run if the file cannot be written
    pub fn required(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Describe the file by what it is for
    pub fn labeled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

impl Step for ManagedFile {
    fn id(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn description(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} ({})", self.path.display()),
            None => format!("Write {}", self.path.display()),
        }
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn fatal(&self) -> bool {
        self.fatal
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        file_state(host, &self.path, self.contents.as_bytes(), self.mode)
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = ctx.host.exists(&self.path);
        ctx.host.write_file(&self.path, &self.contents, self.mode)?;
        Ok(created_or_modified(existed))
    }
}

// ============================================================================
// TemplateFile
// ============================================================================

/// A file written once for the operator to fill in, never overwritten
///
/// Only the mode is corrected on later runs.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub path: PathBuf,
    pub contents: String,
    pub mode: u32,
}

impl TemplateFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>, mode: u32) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            mode,
        }
    }
}

impl Step for TemplateFile {
    fn id(&self) -> String {
        format!("template:{}", self.path.display())
    }

    fn description(&self) -> String {
        format!("Create template {}", self.path.display())
    }

    fn kind(&self) -> &'static str {
        "template"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        match host.mode(&self.path)? {
            None => Ok(StepState::Missing),
            Some(mode) if mode != self.mode => Ok(StepState::drifted(format!(
                "mode {mode:o}, want {:o}",
                self.mode
            ))),
            Some(_) => Ok(StepState::satisfied_with("operator-owned")),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if ctx.host.exists(&self.path) {
            ctx.host.set_mode(&self.path, self.mode)?;
            return Ok(ApplyResult::Modified);
        }
        ctx.host.write_file(&self.path, &self.contents, self.mode)?;
        Ok(ApplyResult::Created)
    }
}

// ============================================================================
// StagedCopy
// ============================================================================

/// A byte-for-byte copy of a local file onto the target system
#[derive(Debug, Clone)]
pub struct StagedCopy {
    pub from: PathBuf,
    pub to: PathBuf,
    pub mode: u32,
}

impl StagedCopy {
    pub fn new(from: impl Into<PathBuf>, to: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            mode,
        }
    }

    fn source(&self, host: &dyn Host) -> Result<Vec<u8>> {
        match host.read_bytes(&self.from)? {
            Some(bytes) => Ok(bytes),
            None => bail!("source {} not found", self.from.display()),
        }
    }
}

impl Step for StagedCopy {
    fn id(&self) -> String {
        format!("stage:{}", self.to.display())
    }

    fn description(&self) -> String {
        format!("Stage {} to {}", self.from.display(), self.to.display())
    }

    fn kind(&self) -> &'static str {
        "stage"
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let source = self.source(host)?;
        file_state(host, &self.to, &source, self.mode)
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = ctx.host.exists(&self.to);
        ctx.host.copy_file(&self.from, &self.to, self.mode)?;
        Ok(created_or_modified(existed))
    }
}

// ============================================================================
// OwnedScript
// ============================================================================

/// An executable script placed in a user's home and owned by them
#[derive(Debug, Clone)]
pub struct OwnedScript {
    pub path: PathBuf,
    pub contents: String,
    pub owner: String,
}

const SCRIPT_MODE: u32 = 0o755;

impl OwnedScript {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>, owner: &str) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            owner: owner.to_string(),
        }
    }
}

impl Step for OwnedScript {
    fn id(&self) -> String {
        format!("script:{}", self.path.display())
    }

    fn description(&self) -> String {
        format!("Write {} for {}", self.path.display(), self.owner)
    }

    fn kind(&self) -> &'static str {
        "script"
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let state = file_state(host, &self.path, self.contents.as_bytes(), SCRIPT_MODE)?;
        if !state.is_satisfied() {
            return Ok(state);
        }
        let path = self.path.to_string_lossy();
        let owner = host.run_checked("stat", &["-c", "%U", &path])?.stdout_str();
        if owner.trim() == self.owner {
            Ok(state)
        } else {
            Ok(StepState::drifted(format!("owned by {}", owner.trim())))
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existed = ctx.host.exists(&self.path);
        ctx.host.write_file(&self.path, &self.contents, SCRIPT_MODE)?;
        let owner = format!("{0}:{0}", self.owner);
        let path = self.path.to_string_lossy();
        ctx.host.run_checked("chown", &[&owner, &path])?;
        Ok(created_or_modified(existed))
    }
}

// ============================================================================
// Directory
// ============================================================================

#[derive(Debug, Clone)]
pub struct Directory {
    pub path: PathBuf,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Step for Directory {
    fn id(&self) -> String {
        format!("dir:{}", self.path.display())
    }

    fn description(&self) -> String {
        format!("Create directory {}", self.path.display())
    }

    fn kind(&self) -> &'static str {
        "dir"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        if host.is_dir(&self.path) {
            Ok(StepState::satisfied())
        } else if host.exists(&self.path) {
            bail!("{} exists but is not a directory", self.path.display())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        ctx.host.create_dir_all(&self.path)?;
        Ok(ApplyResult::Created)
    }
}

// ============================================================================
// Tests
// ============================================================================
