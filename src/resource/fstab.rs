//! CIFS share entry in `/etc/fstab`, appended once behind a marker line

use anyhow::Result;
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

pub const FSTAB: &str = "/etc/fstab";

#[derive(Debug, Clone)]
pub struct FstabEntry {
    pub path: PathBuf,
    pub remote: String,
    pub mountpoint: String,
    pub credentials: String,
    pub options: String,
}

impl FstabEntry {
    pub fn new(remote: &str, mountpoint: &str, credentials: &str, options: &str) -> Self {
        Self {
            path: PathBuf::from(FSTAB),
            remote: remote.to_string(),
            mountpoint: mountpoint.to_string(),
            credentials: credentials.to_string(),
            options: options.to_string(),
        }
    }

    pub fn marker(&self) -> String {
        format!("# archup-share: {}", self.mountpoint)
    }

    pub fn line(&self) -> String {
        let mut options = format!("credentials={}", self.credentials);
        if !self.options.is_empty() {
            options.push(',');
            options.push_str(&self.options);
        }
        format!("{} {} cifs {} 0 0", self.remote, self.mountpoint, options)
    }
}

impl Step for FstabEntry {
    fn id(&self) -> String {
        format!("fstab:{}", self.mountpoint)
    }

    fn description(&self) -> String {
        format!("Mount {} at {}", self.remote, self.mountpoint)
    }

    fn kind(&self) -> &'static str {
        "fstab"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let marker = self.marker();
        let content = host.read_file(&self.path)?.unwrap_or_default();
        if content.lines().any(|l| l.trim_end() == marker) {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let content = ctx.host.read_file(&self.path)?.unwrap_or_default();
        let mut entry = String::new();
        if !content.is_empty() && !content.ends_with('\n') {
            entry.push('\n');
        }
        entry.push_str(&format!("{}\n{}\n", self.marker(), self.line()));

        ctx.host.append_file(&self.path, &entry)?;
        Ok(ApplyResult::Modified)
    }
}
