//! Installer stage - run archinstall from the live ISO and stage the rest
//!
//! After archinstall finishes, the new root is located and archup copies
//! itself, its config and two launcher scripts onto it. Nothing is copied
//! unless a root was found.

use anyhow::Result;
use converge::{Host, Plan, RunSummary};
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::InstallArgs;
use crate::commands::{self, Invocation};
use crate::config;
use crate::discovery::{self, DiscoveryError};
use crate::engine::{self, StageOptions};
use crate::guard::{self, Identity};
use crate::host::SystemHost;
use crate::paths::{self, STAGED_BINARY, SYSTEM_CONFIG};
use crate::resource::{Archinstall, ManagedFile, StagedCopy};
use crate::schema::ProvisionConfig;
use crate::ui;

const REQUIRED_BINARIES: &[&str] = &["archinstall", "mount", "ping"];

/// Launcher for stage 2, relative to the new root
pub const POST_INSTALL_LAUNCHER: &str = "/root/archup-post-install.sh";
/// Launcher for stage 3, relative to the new root
pub const EXTRAS_LAUNCHER: &str = "/root/archup-extras.sh";

pub fn run(ctx: &Context, args: InstallArgs) -> Result<()> {
    ui::banner("stage 1 of 3: install");
    ui::header("Arch Linux Installation");

    let loaded = commands::load_config(ctx)?;
    let invocation = Invocation::current(loaded.source.as_deref())?;
    let opts = commands::stage_options(ctx, args.dry_run, true);

    execute(&SystemHost::new(), &loaded.config, &invocation, &opts)?;
    Ok(())
}

/// Run the stage against a host
///
/// `invocation` is the running binary and the config file it loaded; both
/// are copied onto the new root.
pub fn execute(
    host: &dyn Host,
    config: &ProvisionConfig,
    invocation: &Invocation,
    opts: &StageOptions,
) -> Result<RunSummary> {
    let install = &config.install;

    guard::ensure_identity(host, &Identity::Root)?;
    guard::ensure_input_file(host, &install.config_path())?;
    if let Some(creds) = install.creds_path() {
        guard::ensure_input_file(host, &creds)?;
    }
    guard::ensure_binaries(host, REQUIRED_BINARIES)?;
    guard::ensure_network(host, &config.network.probe_host)?;

    let mut summary = engine::run_plan(&install_plan(config), host, opts)?;

    let root = match discovery::discover_target_root(host, install, !opts.dry_run) {
        Ok(root) => root,
        Err(err) if opts.dry_run => {
            summary.notes.push(format!(
                "Staging onto the new root would follow once it is found ({err})"
            ));
            engine::print_summary(&summary, true);
            return Ok(summary);
        }
        Err(err) => {
            print_recovery(&err);
            return Err(err.into());
        }
    };
    ui::success(&format!("Installed system found at {}", root.display()));

    let staging = staging_plan(config, invocation, &root)?;
    summary.merge(engine::run_plan(&staging, host, opts)?);
    engine::print_summary(&summary, opts.dry_run);
    Ok(summary)
}

fn print_recovery(err: &DiscoveryError) {
    ui::error(&err.to_string());
    ui::section("Manual recovery");
    for step in err.recovery() {
        ui::item(&step);
    }
}

/// The archinstall run itself
pub fn install_plan(config: &ProvisionConfig) -> Plan {
    let install = &config.install;
    let mut plan = Plan::new();
    plan.push(Box::new(Archinstall {
        config: install.config_path(),
        creds: install.creds_path(),
        extra_args: install.extra_args.clone(),
        candidates: install.candidate_paths(),
        marker: install.marker.clone(),
    }));
    plan
}

/// Copy archup, its config and the stage launchers onto `root`
pub fn staging_plan(
    config: &ProvisionConfig,
    invocation: &Invocation,
    root: &Path,
) -> Result<Plan> {
    let mut plan = Plan::new();

    plan.push(Box::new(StagedCopy::new(
        &invocation.binary,
        paths::under_root(root, Path::new(STAGED_BINARY)),
        0o755,
    )));

    let staged_config = paths::under_root(root, Path::new(SYSTEM_CONFIG));
    match &invocation.config {
        Some(source) => plan.push(Box::new(StagedCopy::new(source, staged_config, 0o644))),
        None => plan.push(Box::new(
            ManagedFile::new(staged_config, config::render(config)?, 0o644)
                .labeled("Default archup config")
                .required(),
        )),
    }

    // Inside the new system archup lives at fixed paths
    let staged = Invocation {
        binary: PathBuf::from(STAGED_BINARY),
        config: Some(PathBuf::from(SYSTEM_CONFIG)),
    };
    let launchers = [
        (
            POST_INSTALL_LAUNCHER,
            "post-install",
            "Stage 2: run as root after booting into the new system".to_string(),
        ),
        (
            EXTRAS_LAUNCHER,
            "extras",
            format!("Stage 3: run as {} after stage 2", config.user.name),
        ),
    ];
    for (path, stage, comment) in launchers {
        plan.push(Box::new(
            ManagedFile::new(
                paths::under_root(root, Path::new(path)),
                staged.script(stage, &comment),
                0o755,
            )
            .labeled("Launcher")
            .required(),
        ));
    }

    plan.note(format!(
        "Reboot into the new system, log in as root and run {POST_INSTALL_LAUNCHER}"
    ));
    Ok(plan)
}

// ============================================================================
// Tests
// ============================================================================
