use anyhow::Result;
use colored::Colorize;
use converge::Host;
use std::path::Path;

use crate::Context;
use crate::cli::StageName;
use crate::config;
use crate::guard;
use crate::host::SystemHost;
use crate::paths;
use crate::schema::ProvisionConfig;
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    detail: Option<String>,
    fix: Option<String>,
    fix_cmd: Option<String>,
}

/// Binaries each stage calls, beyond its own guard list
const STAGE_BINARIES: &[(StageName, &[&str])] = &[
    (StageName::Install, &["archinstall", "mount", "ping"]),
    (
        StageName::PostInstall,
        &[
            "pacman",
            "useradd",
            "passwd",
            "systemctl",
            "visudo",
            "ufw",
            "grub-mkconfig",
            "ping",
        ],
    ),
    (StageName::Extras, &["sudo", "pacman", "makepkg", "git", "ping"]),
];

pub fn run(ctx: &Context) -> Result<()> {
    ui::banner("doctor");
    ui::header("Provisioning Readiness");

    let host = SystemHost::new();
    let mut issues: Vec<Issue> = Vec::new();

    let config = check_config(ctx.config.as_deref(), &mut issues);
    check_identity(&host, &config);
    check_binaries(&host, &mut issues);
    check_network(&host, &config.network.probe_host, &mut issues);

    println!();
    if issues.is_empty() {
        ui::success("Ready to provision!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        let num = i + 1;
        println!(
            "  {}  {} {}",
            format!("{num}.").bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(detail) = &issue.detail {
            for line in detail.lines() {
                println!("      {}", line.dimmed());
            }
        }
        if let Some(fix) = &issue.fix {
            println!("      {} {}", "Fix:".cyan(), fix);
        }
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
        println!();
    }

    let fix_cmds: Vec<&str> = issues.iter().filter_map(|i| i.fix_cmd.as_deref()).collect();
    if !fix_cmds.is_empty() {
        ui::section("Quick Fixes");
        println!();
        for cmd in &fix_cmds {
            println!("    {}", cmd.bold());
        }
    }
}

/// Load and validate the config; on failure the defaults are used for the
/// remaining checks
fn check_config(explicit: Option<&Path>, issues: &mut Vec<Issue>) -> ProvisionConfig {
    ui::section("Configuration");

    let Some(path) = paths::resolve_config(explicit) else {
        println!(
            "  {} {}",
            "○".dimmed(),
            "No archup.toml found, built-in defaults apply".dimmed()
        );
        return ProvisionConfig::defaults();
    };

    let name = path.display().to_string();
    let parsed = config::load_from(&path).and_then(|c| c.validate().map(|()| c));
    match parsed {
        Ok(config) => {
            println!("  {} {}", "✓".green(), name);
            config
        }
        Err(e) => {
            println!("  {} {} {}", "✗".red(), name, "(invalid)".red());
            issues.push(Issue {
                category: "Configuration",
                summary: format!("{name} cannot be used"),
                detail: Some(format!("{e:#}")),
                fix: Some(
                    "Fix the file, or regenerate it with `archup config init --force`".into(),
                ),
                fix_cmd: Some(format!("$EDITOR {name}")),
            });
            ProvisionConfig::defaults()
        }
    }
}

/// Which stages the current identity may run
fn check_identity(host: &dyn Host, config: &ProvisionConfig) {
    ui::section("Identity");

    let user = host
        .effective_user()
        .unwrap_or_else(|_| format!("uid {}", host.effective_uid()));
    ui::kv("Running as", &user);

    for stage in runnable_stages(host, config) {
        println!("  {} can run {}", "✓".green(), stage.to_string().bold());
    }
}

fn runnable_stages(host: &dyn Host, config: &ProvisionConfig) -> Vec<StageName> {
    let user = guard::Identity::User(config.user.name.clone());
    if host.is_root() {
        vec![StageName::Install, StageName::PostInstall]
    } else if guard::ensure_identity(host, &user).is_ok() {
        vec![StageName::Extras]
    } else {
        Vec::new()
    }
}

fn check_binaries(host: &dyn Host, issues: &mut Vec<Issue>) {
    ui::section("Required Commands");

    for (stage, binaries) in STAGE_BINARIES {
        let missing = guard::missing_binaries(host, binaries);
        if missing.is_empty() {
            println!("  {} {} - {}", "✓".green(), stage, binaries.join(", ").dimmed());
            continue;
        }

        let names: Vec<&str> = missing.iter().map(|m| m.binary.as_str()).collect();
        println!(
            "  {} {} - {} {}",
            "✗".red(),
            stage,
            names.join(", "),
            "(missing)".red()
        );

        let mut packages: Vec<&str> = missing.iter().map(|m| m.package).collect();
        packages.sort_unstable();
        packages.dedup();
        issues.push(Issue {
            category: "Required Commands",
            summary: format!("{stage} is missing {}", names.join(", ")),
            detail: None,
            fix: Some("Install the packages that provide them".into()),
            fix_cmd: Some(format!("pacman -S --needed {}", packages.join(" "))),
        });
    }
}

fn check_network(host: &dyn Host, probe_host: &str, issues: &mut Vec<Issue>) {
    ui::section("Network");

    if guard::network_reachable(host, probe_host) {
        println!("  {} {} reachable", "✓".green(), probe_host);
    } else {
        println!("  {} {} {}", "✗".red(), probe_host, "(unreachable)".red());
        issues.push(Issue {
            category: "Network",
            summary: format!("cannot reach {probe_host}"),
            detail: Some("Every stage downloads packages".into()),
            fix: Some("Connect to a network (iwctl on the live ISO, nmtui afterwards)".into()),
            fix_cmd: None,
        });
    }
}
