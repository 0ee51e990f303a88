//! Bootstrap an AUR helper (e.g. yay) from its AUR git repository

use anyhow::{Result, bail};
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

#[derive(Debug, Clone)]
pub struct AurHelper {
    pub helper: String,
    pub repo: String,
    pub build_dir: PathBuf,
}

impl AurHelper {
    pub fn new(helper: &str, repo: &str, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.to_string(),
            repo: repo.to_string(),
            build_dir: build_dir.into(),
        }
    }
}

impl Step for AurHelper {
    fn id(&self) -> String {
        format!("aur-helper:{}", self.helper)
    }

    fn description(&self) -> String {
        format!("Build and install {} from {}", self.helper, self.repo)
    }

    fn kind(&self) -> &'static str {
        "aur-helper"
    }

    // makepkg -si asks for the sudo password
    fn interactive(&self) -> bool {
        true
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        if host.command_exists(&self.helper) {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let dir = self.build_dir.to_string_lossy();

        // Reuse a checkout left by an earlier, interrupted run
        if ctx.host.is_dir(&self.build_dir.join(".git")) {
            ctx.host.run_checked("git", &["-C", &dir, "pull", "--ff-only"])?;
        } else {
            if let Some(parent) = self.build_dir.parent() {
                ctx.host.create_dir_all(parent)?;
            }
            ctx.host.run_checked("git", &["clone", &self.repo, &dir])?;
        }

        if !ctx
            .host
            .run_interactive("makepkg", &["-si", "--noconfirm"], Some(&self.build_dir))?
        {
            bail!("makepkg failed in {dir}");
        }

        if !ctx.host.command_exists(&self.helper) {
            bail!("{} is still not on PATH after makepkg", self.helper);
        }
        Ok(ApplyResult::Created)
    }
}
