//! Sudoers drop-in, validated before it becomes active
//!
//! The fragment is written to a hidden sibling (sudo ignores files in
//! `sudoers.d` whose name contains a dot), checked with `visudo -cf`, and only
//! then renamed into place. A rejected fragment is removed, so the target
//! path never holds content visudo has not accepted.

use anyhow::{Result, bail};
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

pub const SUDOERS_DIR: &str = "/etc/sudoers.d";
const MODE: u32 = 0o440;

#[derive(Debug, Clone)]
pub struct SudoersDropIn {
    pub user: String,
    pub rule: String,
}

impl SudoersDropIn {
    pub fn new(user: &str, rule: &str) -> Self {
        Self {
            user: user.to_string(),
            rule: rule.to_string(),
        }
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(SUDOERS_DIR).join(format!("10-archup-{}", self.user))
    }

    fn staging_path(&self) -> PathBuf {
        PathBuf::from(SUDOERS_DIR).join(format!(".10-archup-{}.tmp", self.user))
    }

    pub fn contents(&self) -> String {
        format!("# Managed by archup\n{}\n", self.rule)
    }
}

impl Step for SudoersDropIn {
    fn id(&self) -> String {
        format!("sudoers:{}", self.user)
    }

    fn description(&self) -> String {
        format!("Sudo access for {} ({})", self.user, self.path().display())
    }

    fn kind(&self) -> &'static str {
        "sudoers"
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let path = self.path();
        match host.read_file(&path)? {
            None => Ok(StepState::Missing),
            Some(current) if current != self.contents() => Ok(StepState::drifted("rule differs")),
            Some(_) => match host.mode(&path)? {
                Some(mode) if mode != MODE => Ok(StepState::drifted(format!("mode {mode:o}"))),
                _ => Ok(StepState::satisfied()),
            },
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let target = self.path();
        let staging = self.staging_path();
        let existed = ctx.host.exists(&target);

        ctx.host.write_file(&staging, &self.contents(), MODE)?;
        let staging_str = staging.to_string_lossy();
        let validation = ctx.host.run("visudo", &["-cf", &staging_str]);

        let rejected = match validation {
            Ok(output) if output.success => None,
            Ok(output) => Some(output.error_text()),
            Err(e) => Some(format!("{e:#}")),
        };
        if let Some(reason) = rejected {
            ctx.host.remove_file(&staging)?;
            bail!("visudo rejected the sudoers fragment: {reason}");
        }

        ctx.host.rename(&staging, &target)?;
        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }
}
