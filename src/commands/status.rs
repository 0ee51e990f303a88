//! `archup status <stage>` - show what a stage would still do

use anyhow::Result;
use colored::Colorize;
use converge::{AutoConfirm, Host, Plan};

use crate::Context;
use crate::cli::StageName;
use crate::commands::{self, Invocation, extras, install, post_install};
use crate::discovery;
use crate::engine;
use crate::host::SystemHost;
use crate::schema::ProvisionConfig;
use crate::ui;

pub fn run(ctx: &Context, stage: StageName, only: Option<&str>) -> Result<()> {
    ui::banner(&format!("status: {stage}"));
    ui::header("Stage Status");

    let loaded = commands::load_config(ctx)?;
    let invocation = Invocation::current(loaded.source.as_deref())?;
    let host = SystemHost::new();

    let plan = plan_for(stage, &host, &loaded.config, &invocation)?.filter_by_target(only);
    let counts = engine::display_status(&plan, &host);

    if !plan.notes.is_empty() {
        ui::section("Notes");
        for note in &plan.notes {
            ui::item(note);
        }
    }

    println!();
    if counts.pending == 0 && counts.errors == 0 {
        ui::success(&format!("Nothing left to do for {stage}"));
    } else {
        ui::info(&format!(
            "Run {} to apply",
            format!("archup {stage}").bold()
        ));
    }
    Ok(())
}

/// The plan a stage would run, built without prompting or mounting anything
///
/// Optional groups are listed as if accepted.
pub fn plan_for(
    stage: StageName,
    host: &dyn Host,
    config: &ProvisionConfig,
    invocation: &Invocation,
) -> Result<Plan> {
    match stage {
        StageName::Install => {
            let mut plan = install::install_plan(config);
            match discovery::discover_target_root(host, &config.install, false) {
                Ok(root) => {
                    let staging = install::staging_plan(config, invocation, &root)?;
                    plan.extend(staging.steps);
                    for note in staging.notes {
                        plan.note(note);
                    }
                }
                Err(err) => plan.note(format!("Staging not shown: {err}")),
            }
            Ok(plan)
        }
        StageName::PostInstall => post_install::build_plan(config, invocation, &mut AutoConfirm),
        StageName::Extras => extras::build_plan(config, &mut AutoConfirm),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use std::path::PathBuf;

    fn invocation() -> Invocation {
        Invocation {
            binary: PathBuf::from("/run/archiso/archup"),
            config: None,
        }
    }

    #[test]
    fn test_install_without_target_lists_only_archinstall() {
        let host = FakeHost::root();
        let plan = plan_for(
            StageName::Install,
            &host,
            &ProvisionConfig::defaults(),
            &invocation(),
        )
        .unwrap();

        assert_eq!(plan.ids(), vec!["archinstall"]);
        assert!(plan.notes[0].starts_with("Staging not shown"));
        assert!(host.commands().is_empty());
    }

    #[test]
    fn test_install_with_target_lists_staging() {
        let host = FakeHost::root().with_dir("/mnt/etc");
        let plan = plan_for(
            StageName::Install,
            &host,
            &ProvisionConfig::defaults(),
            &invocation(),
        )
        .unwrap();

        assert_eq!(plan.len(), 5);
        assert!(plan.ids().contains(&"stage:/mnt/usr/local/bin/archup".to_string()));
    }

    #[test]
    fn test_status_applies_nothing() {
        let host = FakeHost::user("arch");
        let plan = plan_for(
            StageName::Extras,
            &host,
            &ProvisionConfig::defaults(),
            &invocation(),
        )
        .unwrap();

        let counts = engine::display_status(&plan, &host);
        assert!(counts.pending > 0);
        assert!(!host.ran("git clone"));
        assert!(!host.ran("sudo"));
    }

    #[test]
    fn test_filter_by_kind() {
        let host = FakeHost::root();
        let plan = plan_for(
            StageName::PostInstall,
            &host,
            &ProvisionConfig::defaults(),
            &invocation(),
        )
        .unwrap()
        .filter_by_target(Some("service"));

        assert!(!plan.is_empty());
        assert!(plan.ids().iter().all(|id| id.starts_with("service:")));
    }
}
