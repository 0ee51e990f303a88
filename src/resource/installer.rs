//! Run archinstall against its declarative configuration file

use anyhow::{Result, bail};
use std::path::PathBuf;

use super::{ApplyContext, ApplyResult, Host, Step, StepState};
use crate::discovery;

#[derive(Debug, Clone)]
pub struct Archinstall {
    pub config: PathBuf,
    pub creds: Option<PathBuf>,
    pub extra_args: Vec<String>,
    /// Where a finished install would be mounted
    pub candidates: Vec<PathBuf>,
    pub marker: String,
}

impl Archinstall {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--config".to_string(), self.config.display().to_string()];
        if let Some(creds) = &self.creds {
            args.push("--creds".to_string());
            args.push(creds.display().to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl Step for Archinstall {
    fn id(&self) -> String {
        "archinstall".to_string()
    }

    fn description(&self) -> String {
        format!("Install Arch Linux with {}", self.config.display())
    }

    fn kind(&self) -> &'static str {
        "archinstall"
    }

    fn interactive(&self) -> bool {
        true
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        match discovery::find_target(host, &self.candidates, &self.marker) {
            Some(root) => Ok(StepState::satisfied_with(format!(
                "installed system mounted at {}",
                root.display()
            ))),
            None => Ok(StepState::Missing),
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let args = self.args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        if !ctx.host.run_interactive("archinstall", &args, None)? {
            bail!("archinstall exited with an error");
        }
        Ok(ApplyResult::Created)
    }
}
