//! Package cache cleanup after the AUR installs

use anyhow::{Result, bail};

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

#[derive(Debug, Clone)]
pub struct CacheClean {
    pub helper: String,
}

impl CacheClean {
    pub fn new(helper: &str) -> Self {
        Self {
            helper: helper.to_string(),
        }
    }
}

impl Step for CacheClean {
    fn id(&self) -> String {
        format!("cache:{}", self.helper)
    }

    fn description(&self) -> String {
        format!("Clean the {} package cache", self.helper)
    }

    fn kind(&self) -> &'static str {
        "cache"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn interactive(&self) -> bool {
        true
    }

    fn check(&self, _host: &dyn Host) -> Result<StepState> {
        Ok(StepState::Always)
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if !ctx
            .host
            .run_interactive(&self.helper, &["-Sc", "--noconfirm"], None)?
        {
            bail!("{} -Sc failed", self.helper);
        }
        Ok(ApplyResult::Modified)
    }
}
