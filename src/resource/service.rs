//! Service resource - enable systemd units

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

/// A systemd unit enabled at boot
#[derive(Debug, Clone)]
pub struct Service {
    pub unit: String,
}

impl Service {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
        }
    }
}

impl Step for Service {
    fn id(&self) -> String {
        format!("service:{}", self.unit)
    }

    fn description(&self) -> String {
        format!("Enable {}", self.unit)
    }

    fn kind(&self) -> &'static str {
        "service"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        if host.service_enabled(&self.unit)? {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        // Not --now: inside a chroot or before reboot there is no running systemd
        ctx.host.run_checked("systemctl", &["enable", &self.unit])?;
        Ok(ApplyResult::Modified)
    }
}
