//! Post-install stage - configure the new system as root
//!
//! Packages, the primary user and its sudo access, NetworkManager, the
//! firewall, services, the network share, GRUB theming and the greeter.
//! Ends by leaving the extras launcher in the new user's home.

use anyhow::Result;
use converge::{ConfirmCallback, Host, Plan, RunSummary};
use std::path::PathBuf;

use crate::Context;
use crate::cli::StageArgs;
use crate::commands::{self, Invocation};
use crate::engine::{self, Group, StageOptions};
use crate::guard::{self, Identity};
use crate::host::SystemHost;
use crate::paths;
use crate::resource::{
    Directory, FstabEntry, GrubSettings, ManagedFile, Manager, OwnedScript, Service,
    SudoersDropIn, TemplateFile, UfwDefaults, UfwEnable, UfwRule, UserAccount, UserPassword,
};
use crate::schema::ProvisionConfig;
use crate::ui;

/// Binaries the stage needs before it can install anything
const REQUIRED_BINARIES: &[&str] = &["pacman", "useradd", "passwd", "systemctl", "ping"];

/// Name of the handoff script in the user's home
pub const HANDOFF_SCRIPT: &str = "archup-extras.sh";

const CREDENTIALS_TEMPLATE: &str = "username=\npassword=\ndomain=\n";

pub fn run(ctx: &Context, args: StageArgs) -> Result<()> {
    ui::banner("stage 2 of 3: post-install");
    ui::header("Post-Install Configuration");

    let loaded = commands::load_config(ctx)?;
    let invocation = Invocation::current(loaded.source.as_deref())?;
    let opts = commands::stage_options(ctx, args.dry_run, args.yes);
    let mut confirm = engine::confirmer(args.yes);

    execute(
        &SystemHost::new(),
        &loaded.config,
        &invocation,
        &opts,
        confirm.as_mut(),
    )?;
    Ok(())
}

/// Run the stage against a host
pub fn execute(
    host: &dyn Host,
    config: &ProvisionConfig,
    invocation: &Invocation,
    opts: &StageOptions,
    confirm: &mut dyn ConfirmCallback,
) -> Result<RunSummary> {
    guard::ensure_identity(host, &Identity::Root)?;
    guard::ensure_binaries(host, REQUIRED_BINARIES)?;
    guard::ensure_network(host, &config.network.probe_host)?;

    let plan = build_plan(config, invocation, confirm)?;
    let summary = engine::run_plan(&plan, host, opts)?;
    engine::print_summary(&summary, opts.dry_run);
    Ok(summary)
}

/// Build the post-install plan
///
/// Prompts for the optional package group.
pub fn build_plan(
    config: &ProvisionConfig,
    invocation: &Invocation,
    confirm: &mut dyn ConfirmCallback,
) -> Result<Plan> {
    let mut plan = Plan::new();
    let user = &config.user;

    // Packages
    let mut required = config.packages.required.clone();
    if !required.contains(&config.greeter.package) {
        required.push(config.greeter.package.clone());
    }
    engine::add_group(
        &mut plan,
        &required,
        &Manager::Pacman,
        Group::Required,
        "packages",
        confirm,
    )?;
    engine::add_group(
        &mut plan,
        &config.packages.optional,
        &Manager::Pacman,
        Group::Optional,
        "packages",
        confirm,
    )?;

    // User and access control
    plan.push(Box::new(UserAccount::new(
        &user.name,
        &user.groups,
        &user.shell,
    )));
    if user.set_password {
        plan.push(Box::new(UserPassword::new(&user.name)));
    }
    plan.push(Box::new(SudoersDropIn::new(&user.name, &user.sudoers_rule)));

    // Network and firewall
    plan.push(Box::new(
        ManagedFile::new(
            paths::expand(&config.network_manager.path),
            config.network_manager.contents.clone(),
            0o644,
        )
        .labeled("NetworkManager settings"),
    ));
    let firewall = &config.firewall;
    plan.push(Box::new(UfwDefaults::new(
        &firewall.default_incoming,
        &firewall.default_outgoing,
    )));
    for rule in &firewall.allow {
        plan.push(Box::new(UfwRule::new(rule)));
    }
    plan.push(Box::new(UfwEnable));

    // Services
    for unit in config
        .services
        .iter()
        .chain(std::iter::once(&config.greeter.service))
    {
        plan.push(Box::new(Service::new(unit)));
    }

    // Network share
    if let Some(share) = &config.share {
        let mountpoint = paths::expand(&share.mountpoint);
        let credentials = paths::expand(&share.credentials);
        plan.push(Box::new(Directory::new(&mountpoint)));
        plan.push(Box::new(TemplateFile::new(
            &credentials,
            CREDENTIALS_TEMPLATE,
            0o600,
        )));
        plan.push(Box::new(FstabEntry::new(
            &share.remote,
            &mountpoint.to_string_lossy(),
            &credentials.to_string_lossy(),
            &share.options,
        )));
        plan.note(format!(
            "Fill in {} with the credentials for {}",
            credentials.display(),
            share.remote
        ));
    }

    // Boot loader and greeter
    if !config.grub.settings.is_empty() {
        plan.push(Box::new(GrubSettings::new(
            paths::expand(&config.grub.file),
            &config.grub.output,
            config.grub.settings.clone(),
        )));
    }
    plan.push(Box::new(
        ManagedFile::new(
            paths::expand(&config.greeter.path),
            config.greeter.contents.clone(),
            0o644,
        )
        .labeled("Greeter settings"),
    ));

    // Handoff
    let handoff = handoff_path(&user.name);
    plan.push(Box::new(OwnedScript::new(
        handoff.clone(),
        invocation.script(
            "extras",
            &format!("Stage 3: run as {} (not root) after the first login", user.name),
        ),
        &user.name,
    )));
    plan.note("Reboot into the new system");
    plan.note(format!(
        "Log in as {} and run {}",
        user.name,
        handoff.display()
    ));

    Ok(plan)
}

pub fn handoff_path(user: &str) -> PathBuf {
    paths::home_of(user).join(HANDOFF_SCRIPT)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ShareConfig;
    use crate::testing::FakeHost;
    use converge::{AutoConfirm, AutoDecline, Outcome};

    const GRUB_DEFAULTS: &str = "GRUB_DEFAULT=0\nGRUB_TIMEOUT=5\n";

    fn config() -> ProvisionConfig {
        let mut config = ProvisionConfig::defaults();
        config.user.name = "alex".to_string();
        config.packages.required = vec!["git".to_string(), "ufw".to_string()];
        config.packages.optional = vec!["firefox".to_string(), "vlc".to_string()];
        config.services = vec!["NetworkManager".to_string()];
        config.share = Some(ShareConfig {
            remote: "//nas.local/media".to_string(),
            mountpoint: "/mnt/media".to_string(),
            credentials: "/etc/samba/credentials/archup".to_string(),
            options: "_netdev,nofail".to_string(),
        });
        config
    }

    fn invocation() -> Invocation {
        Invocation {
            binary: PathBuf::from("/usr/local/bin/archup"),
            config: Some(PathBuf::from("/etc/archup/archup.toml")),
        }
    }

    fn host() -> FakeHost {
        FakeHost::root()
            .with_binaries(REQUIRED_BINARIES)
            .with_file("/etc/default/grub", GRUB_DEFAULTS)
            .with_file("/etc/fstab", "UUID=abc / ext4 rw 0 1\n")
    }

    fn quiet() -> StageOptions {
        StageOptions {
            quiet: true,
            ..StageOptions::default()
        }
    }

    fn run(host: &FakeHost, confirm: &mut dyn ConfirmCallback) -> Result<RunSummary> {
        execute(host, &config(), &invocation(), &quiet(), confirm)
    }

    #[test]
    fn test_full_stage() {
        let host = host().with_package("git");
        let summary = run(&host, &mut AutoConfirm).unwrap();

        assert!(summary.is_success(), "failed: {:?}", summary.failed_ids());
        assert_eq!(summary.get("pkg:git").unwrap().outcome, Outcome::AlreadyDone);
        assert!(!host.ran("pacman -S --needed --noconfirm git"));
        assert!(host.has_package("firefox"));
        assert!(host.has_package("sddm"));
        assert!(host.state().users.contains("alex"));
        assert!(host.has_service("NetworkManager"));
        assert!(host.has_service("sddm"));
        assert_eq!(host.file_mode("/etc/sudoers.d/10-archup-alex"), Some(0o440));
        assert_eq!(
            host.file("/etc/samba/credentials/archup").as_deref(),
            Some("username=\npassword=\ndomain=\n")
        );
        assert_eq!(host.file_mode("/etc/samba/credentials/archup"), Some(0o600));
        assert!(host.file("/etc/sddm.conf.d/10-archup.conf").is_some());
        assert!(host.ran("grub-mkconfig -o /boot/grub/grub.cfg"));

        let handoff = host.file("/home/alex/archup-extras.sh").unwrap();
        assert!(handoff.contains("--config '/etc/archup/archup.toml' extras"));
        assert_eq!(host.file_mode("/home/alex/archup-extras.sh"), Some(0o755));
        assert_eq!(
            host.state().owners.get(&PathBuf::from("/home/alex/archup-extras.sh")),
            Some(&"alex".to_string())
        );
        assert!(summary.notes.iter().any(|n| n.contains("/etc/samba/credentials/archup")));
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let host = host();
        run(&host, &mut AutoConfirm).unwrap();
        let commands_before = host.commands().len();
        let fstab_before = host.file("/etc/fstab").unwrap();

        let second = run(&host, &mut AutoConfirm).unwrap();
        assert_eq!(second.changed(), 0, "changed on rerun: {:?}", second.records);
        assert_eq!(host.file("/etc/fstab").unwrap(), fstab_before);
        assert_eq!(
            host.file("/etc/fstab")
                .unwrap()
                .matches("# archup-share: /mnt/media")
                .count(),
            1
        );
        let rerun: Vec<String> = host.commands()[commands_before..].to_vec();
        assert!(!rerun.iter().any(|c| c.starts_with("useradd")));
        assert!(!rerun.iter().any(|c| c.starts_with("grub-mkconfig")));
        assert!(!rerun.iter().any(|c| c.starts_with("systemctl enable")));
    }

    #[test]
    fn test_declined_optional_packages() {
        let host = host();
        let summary = run(&host, &mut AutoDecline).unwrap();

        assert!(!host.has_package("firefox"));
        assert!(summary.get("pkg:firefox").is_none());
        assert!(
            summary
                .notes
                .contains(&"Optional packages not installed: firefox, vlc".to_string())
        );
    }

    #[test]
    fn test_failing_optional_package_continues() {
        let host = host().failing("pacman -S --needed --noconfirm firefox");
        let summary = run(&host, &mut AutoConfirm).unwrap();

        assert_eq!(summary.failed_ids(), vec!["pkg:firefox"]);
        assert!(host.has_package("vlc"));
        assert!(host.state().users.contains("alex"));
    }

    #[test]
    fn test_invalid_sudoers_aborts_before_later_steps() {
        let host = host().rejecting_sudoers();
        let err = run(&host, &mut AutoConfirm).unwrap_err();

        assert!(err.to_string().contains("sudoers:alex"));
        assert!(host.file("/etc/sudoers.d/10-archup-alex").is_none());
        assert!(!host.ran("ufw"));
        assert!(host.file("/home/alex/archup-extras.sh").is_none());
    }

    #[test]
    fn test_wrong_identity_changes_nothing() {
        let host = FakeHost::user("alex").with_binaries(REQUIRED_BINARIES);
        let err = run(&host, &mut AutoConfirm).unwrap_err();

        assert!(err.to_string().contains("must run as root"));
        assert!(host.commands().is_empty());
        assert!(host.file_paths().is_empty());
    }

    #[test]
    fn test_offline_aborts() {
        let host = host().offline();
        let err = run(&host, &mut AutoConfirm).unwrap_err();
        assert!(err.to_string().contains("network unreachable"));
        assert_eq!(host.commands(), vec!["ping -c 1 -W 5 archlinux.org"]);
    }

    #[test]
    fn test_dry_run_applies_nothing() {
        let host = host();
        let opts = StageOptions {
            dry_run: true,
            quiet: true,
            ..StageOptions::default()
        };
        let summary = execute(&host, &config(), &invocation(), &opts, &mut AutoConfirm).unwrap();

        assert_eq!(summary.changed(), 0);
        assert!(summary.skipped() > 0);
        assert!(!host.ran("useradd"));
        assert!(!host.ran("pacman -S"));
        assert!(host.file("/etc/sudoers.d/10-archup-alex").is_none());
        // the user does not exist yet, so the password step is only pending
        assert!(matches!(
            summary.get("password:alex").unwrap().outcome,
            Outcome::Skipped { .. }
        ));
        assert!(!host.ran("passwd -S"));
    }

    #[test]
    fn test_no_share_section() {
        let mut config = config();
        config.share = None;
        let plan = build_plan(&config, &invocation(), &mut AutoConfirm).unwrap();
        assert!(!plan.ids().iter().any(|id| id.starts_with("fstab:")));
        assert!(!plan.notes.iter().any(|n| n.contains("credentials")));
    }

    #[test]
    fn test_share_paths_are_expanded_in_fstab() {
        let mut config = config();
        if let Some(share) = config.share.as_mut() {
            share.mountpoint = "~/shares/media".to_string();
            share.credentials = "~/.smbcredentials".to_string();
        }
        let host = host();
        execute(&host, &config, &invocation(), &quiet(), &mut AutoConfirm).unwrap();

        let mountpoint = paths::expand("~/shares/media");
        let credentials = paths::expand("~/.smbcredentials");
        let fstab = host.file("/etc/fstab").unwrap();
        assert!(!fstab.contains('~'), "unexpanded path in fstab:\n{fstab}");
        assert!(fstab.contains(&format!(
            "//nas.local/media {} cifs credentials={}",
            mountpoint.display(),
            credentials.display()
        )));
        assert!(host.is_dir(&mountpoint));
    }

    #[test]
    fn test_plan_order() {
        let plan = build_plan(&config(), &invocation(), &mut AutoConfirm).unwrap();
        let ids = plan.ids();
        let pos = |id: &str| ids.iter().position(|i| i == id).unwrap();

        assert!(pos("pkg:git") < pos("pkg:firefox"));
        assert!(pos("pkg:firefox") < pos("user:alex"));
        assert!(pos("user:alex") < pos("password:alex"));
        assert!(pos("password:alex") < pos("sudoers:alex"));
        assert!(pos("sudoers:alex") < pos("ufw:defaults"));
        assert_eq!(ids.last().unwrap(), "script:/home/alex/archup-extras.sh");
    }
}
