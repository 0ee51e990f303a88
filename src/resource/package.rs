//! Package steps - one pacman or AUR package per step

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Host, Step, StepState};

/// Which tool installs a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manager {
    /// `pacman`, already running as root
    Pacman,
    /// `sudo pacman`, from an unprivileged user
    SudoPacman,
    /// An AUR helper such as `yay`
    Aur(String),
}

impl Manager {
    fn kind(&self) -> &'static str {
        match self {
            Self::Pacman | Self::SudoPacman => "pkg",
            Self::Aur(_) => "aur",
        }
    }

    /// Program and arguments for a non-interactive install of `name`
    fn install_command<'a>(&'a self, name: &'a str) -> (&'a str, Vec<&'a str>) {
        let install = ["-S", "--needed", "--noconfirm", name];
        match self {
            Self::Pacman => ("pacman", install.to_vec()),
            Self::SudoPacman => {
                let mut args = vec!["pacman"];
                args.extend(install);
                ("sudo", args)
            }
            Self::Aur(helper) => (helper.as_str(), install.to_vec()),
        }
    }
}

/// A package that should be installed
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub manager: Manager,
    pub fatal: bool,
}

impl Package {
    pub fn new(name: &str, manager: Manager) -> Self {
        Self {
            name: name.to_string(),
            manager,
            fatal: false,
        }
    }

    /// Abort the run if this package fails to install
    pub fn required(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl Step for Package {
    fn id(&self) -> String {
        format!("{}:{}", self.manager.kind(), self.name)
    }

    fn description(&self) -> String {
        match &self.manager {
            Manager::Aur(helper) => format!("Install {} (AUR via {helper})", self.name),
            _ => format!("Install {}", self.name),
        }
    }

    fn kind(&self) -> &'static str {
        self.manager.kind()
    }

    fn fatal(&self) -> bool {
        self.fatal
    }

    // sudo and AUR helpers may prompt for a password
    fn interactive(&self) -> bool {
        !matches!(self.manager, Manager::Pacman)
    }

    fn check(&self, host: &dyn Host) -> Result<StepState> {
        if host.package_installed(&self.name)? {
            Ok(StepState::satisfied())
        } else {
            Ok(StepState::Missing)
        }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let (program, args) = self.manager.install_command(&self.name);
        if self.interactive() {
            if ctx.host.run_interactive(program, &args, None)? {
                return Ok(ApplyResult::Created);
            }
            anyhow::bail!("{program} {} failed", args.join(" "));
        }

        ctx.host.run_checked(program, &args)?;
        Ok(ApplyResult::Created)
    }
}
