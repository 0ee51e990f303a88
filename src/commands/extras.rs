//! Extras stage - AUR software, run as the provisioned user
//!
//! makepkg refuses to run as root, so this stage insists on the user named
//! in the config and reaches pacman through sudo.

use anyhow::Result;
use converge::{ConfirmCallback, Host, Plan, RunSummary};

use crate::Context;
use crate::cli::StageArgs;
use crate::commands;
use crate::engine::{self, Group, StageOptions};
use crate::guard::{self, Identity};
use crate::host::SystemHost;
use crate::resource::{AurHelper, CacheClean, Manager, Package};
use crate::schema::ProvisionConfig;
use crate::ui;

const REQUIRED_BINARIES: &[&str] = &["sudo", "pacman", "makepkg", "ping"];

pub fn run(ctx: &Context, args: StageArgs) -> Result<()> {
    ui::banner("stage 3 of 3: extras");
    ui::header("AUR Extras");

    let loaded = commands::load_config(ctx)?;
    let opts = commands::stage_options(ctx, args.dry_run, args.yes);
    let mut confirm = engine::confirmer(args.yes);

    execute(&SystemHost::new(), &loaded.config, &opts, confirm.as_mut())?;
    Ok(())
}

/// Run the stage against a host
pub fn execute(
    host: &dyn Host,
    config: &ProvisionConfig,
    opts: &StageOptions,
    confirm: &mut dyn ConfirmCallback,
) -> Result<RunSummary> {
    guard::ensure_identity(host, &Identity::User(config.user.name.clone()))?;
    guard::ensure_binaries(host, REQUIRED_BINARIES)?;
    guard::ensure_network(host, &config.network.probe_host)?;

    let plan = build_plan(config, confirm)?;
    let summary = engine::run_plan(&plan, host, opts)?;
    engine::print_summary(&summary, opts.dry_run);
    Ok(summary)
}

/// Prerequisites, the helper itself, then the AUR groups
pub fn build_plan(config: &ProvisionConfig, confirm: &mut dyn ConfirmCallback) -> Result<Plan> {
    let aur = &config.aur;
    let mut plan = Plan::new();

    for name in &aur.prerequisites {
        plan.push(Box::new(Package::new(name, Manager::SudoPacman).required()));
    }
    plan.push(Box::new(AurHelper::new(&aur.helper, &aur.repo, aur.build_path())));

    let manager = Manager::Aur(aur.helper.clone());
    engine::add_group(
        &mut plan,
        &aur.required,
        &manager,
        Group::Required,
        "AUR packages",
        confirm,
    )?;
    engine::add_group(
        &mut plan,
        &aur.optional,
        &manager,
        Group::Optional,
        "AUR packages",
        confirm,
    )?;

    if aur.clean_cache {
        plan.push(Box::new(CacheClean::new(&aur.helper)));
    }
    Ok(plan)
}
