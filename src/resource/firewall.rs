//! ufw firewall steps: default policies, allow rules, enablement
//!
//! All three are soft; a broken firewall setup should not stop the rest of
//! the post-install stage.

use anyhow::Result;
use std::path::Path;

use super::vars::read_var;
use super::{ApplyContext, ApplyResult, Host, Step, StepState};

/// Where ufw keeps its default policies
pub const UFW_DEFAULTS: &str = "/etc/default/ufw";

/// The iptables target ufw stores for a policy name
pub fn policy_value(policy: &str) -> &'static str {
    match policy {
        "allow" => "ACCEPT",
        "reject" => "REJECT",
        _ => "DROP",
    }
}

// ============================================================================
// Default policies
// ============================================================================

#[derive(Debug, Clone)]
pub struct UfwDefaults {
    pub incoming: String,
    pub outgoing: String,
}

impl UfwDefaults {
    pub fn new(incoming: &str, outgoing: &str) -> Self {
        Self {
            incoming: incoming.to_string(),
            outgoing: outgoing.to_string(),
        }
    }

    fn wanted(&self) -> [(&'static str, &str, &'static str); 2] {
        [
            ("incoming", self.incoming.as_str(), "DEFAULT_INPUT_POLICY"),
            ("outgoing", self.outgoing.as_str(), "DEFAULT_OUTPUT_POLICY"),
        ]
    }
}

impl Step for UfwDefaults {
    fn id(&self) -> String {
        "ufw:defaults".to_string()
    }

    fn description(&self) -> String {
        format!(
            "Firewall defaults ({} incoming, {} outgoing)",
            self.incoming, self.outgoing
        )
    }

    fn kind(&self) -> &'static str {
        "ufw"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let content = host.read_file(Path::new(UFW_DEFAULTS))?.unwrap_or_default();
        let off: Vec<&str> = self
            .wanted()
            .into_iter()
            .filter(|(_, policy, key)| {
                read_var(&content, key).as_deref() != Some(policy_value(policy))
            })
            .map(|(direction, _, _)| direction)
            .collect();

        if off.is_empty() {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::drifted(off.join(", ")))
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        for (direction, policy, _) in self.wanted() {
            ctx.host.run_checked("ufw", &["default", policy, direction])?;
        }
        Ok(ApplyResult::Modified)
    }
}

// ============================================================================
// Allow rules
// ============================================================================

/// A `ufw allow <rule>` entry (e.g. "ssh", "1714:1764/udp")
#[derive(Debug, Clone)]
pub struct UfwRule {
    pub rule: String,
}

impl UfwRule {
    pub fn new(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
        }
    }
}

impl Step for UfwRule {
    fn id(&self) -> String {
        format!("ufw:allow {}", self.rule)
    }

    fn description(&self) -> String {
        format!("Firewall: allow {}", self.rule)
    }

    fn kind(&self) -> &'static str {
        "ufw"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let added = host.run_checked("ufw", &["show", "added"])?.stdout_str();
        let wanted = format!("ufw allow {}", self.rule);
        if added.lines().any(|l| l.trim() == wanted) {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        ctx.host.run_checked("ufw", &["allow", &self.rule])?;
        Ok(ApplyResult::Created)
    }
}

// ============================================================================
// Enable
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct UfwEnable;

impl Step for UfwEnable {
    fn id(&self) -> String {
        "ufw:enable".to_string()
    }

    fn description(&self) -> String {
        "Enable the firewall".to_string()
    }

    fn kind(&self) -> &'static str {
        "ufw"
    }

    fn fatal(&self) -> bool {
        false
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        let status = host.run_checked("ufw", &["status"])?.stdout_str();
        if status.lines().any(|l| l.trim() == "Status: active") {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        ctx.host.run_checked("ufw", &["--force", "enable"])?;
        Ok(ApplyResult::Modified)
    }
}
