//! User account and password steps

use anyhow::{Result, bail};

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

/// The primary login user, created with a home directory
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub name: String,
    pub groups: Vec<String>,
    pub shell: String,
}

impl UserAccount {
    pub fn new(name: &str, groups: &[String], shell: &str) -> Self {
        Self {
            name: name.to_string(),
            groups: groups.to_vec(),
            shell: shell.to_string(),
        }
    }
}

impl Step for UserAccount {
    fn id(&self) -> String {
        format!("user:{}", self.name)
    }

    fn description(&self) -> String {
        if self.groups.is_empty() {
            format!("Create user {}", self.name)
        } else {
            format!("Create user {} ({})", self.name, self.groups.join(", "))
        }
    }

    fn kind(&self) -> &'static str {
        "user"
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        if host.user_exists(&self.name)? {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let groups = self.groups.join(",");
        let mut args = vec!["-m"];
        if !groups.is_empty() {
            args.extend(["-G", groups.as_str()]);
        }
        args.extend(["-s", self.shell.as_str(), self.name.as_str()]);

        ctx.host.run_checked("useradd", &args)?;
        Ok(ApplyResult::Created)
    }
}

/// An interactive `passwd` for a user without a usable password
#[derive(Debug, Clone)]
pub struct UserPassword {
    pub name: String,
}

impl UserPassword {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// Parse the status field of `passwd -S` ("P" = usable password)
fn has_password(status_line: &str) -> bool {
    status_line.split_whitespace().nth(1) == Some("P")
}

impl Step for UserPassword {
    fn id(&self) -> String {
        format!("password:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Set password for {}", self.name)
    }

    fn kind(&self) -> &'static str {
        "password"
    }

    fn interactive(&self) -> bool {
        true
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        // passwd -S fails for an account that does not exist yet
        if !host.user_exists(&self.name)? {
            return Ok(StepState::Missing);
        }
        let output = host.run_checked("passwd", &["-S", &self.name])?;
        if has_password(&output.stdout_str()) {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if !ctx.host.run_interactive("passwd", &[&self.name], None)? {
            bail!("passwd {} did not complete", self.name);
        }
        Ok(ApplyResult::Modified)
    }
}
