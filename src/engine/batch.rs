//! Best-effort batch installs
//!
//! A package group becomes one soft step per package, in declaration order.
//! Installed packages show up as already done, failures are collected in the
//! summary, and the rest of the group still runs.

use anyhow::Result;
use converge::{ConfirmCallback, Plan};

use crate::resource::{Manager, Package};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    /// Always installed
    Required,
    /// Installed only when the operator agrees
    Optional,
}

/// Add a package group to a plan
///
/// Optional groups are confirmed while the plan is built, so every prompt
/// comes before the first change. Declining adds a note instead of steps.
/// Returns whether the group was added.
pub fn add_group(
    plan: &mut Plan,
    names: &[String],
    manager: &Manager,
    group: Group,
    label: &str,
    confirm: &mut dyn ConfirmCallback,
) -> Result<bool> {
    if names.is_empty() {
        return Ok(false);
    }

    if group == Group::Optional {
        let prompt = format!(
            "Install {} optional {label} ({})?",
            names.len(),
            names.join(", ")
        );
        if !confirm.confirm(&prompt)? {
            log::info!("Optional {label} declined");
            plan.note(format!(
                "Optional {label} not installed: {}",
                names.join(", ")
            ));
            return Ok(false);
        }
    }

    for name in names {
        plan.push(Box::new(Package::new(name, manager.clone())));
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, run_plan};
    use converge::{AutoConfirm, AutoDecline, Outcome};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_required_group_in_order() {
        let mut plan = Plan::new();
        add_group(
            &mut plan,
            &names(&["git", "ufw", "sddm"]),
            &Manager::Pacman,
            Group::Required,
            "packages",
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(plan.ids(), vec!["pkg:git", "pkg:ufw", "pkg:sddm"]);
    }

    #[test]
    fn test_declined_optional_group_adds_note_only() {
        let mut plan = Plan::new();
        let added = add_group(
            &mut plan,
            &names(&["firefox", "vlc"]),
            &Manager::Pacman,
            Group::Optional,
            "packages",
            &mut AutoDecline,
        )
        .unwrap();

        assert!(!added);
        assert!(plan.is_empty());
        assert_eq!(plan.notes, vec!["Optional packages not installed: firefox, vlc"]);
    }

    #[test]
    fn test_one_failing_optional_package() {
        let host = FakeHost::user("alex")
            .with_package("google-chrome")
            .failing("yay -S --needed --noconfirm spotify");
        let mut plan = Plan::new();
        add_group(
            &mut plan,
            &names(&["spotify", "google-chrome", "discord"]),
            &Manager::Aur("yay".to_string()),
            Group::Optional,
            "AUR packages",
            &mut AutoConfirm,
        )
        .unwrap();

        let summary = run_plan(&plan, &host).unwrap();
        assert_eq!(summary.failed_ids(), vec!["aur:spotify"]);
        assert_eq!(
            summary.get("aur:google-chrome").unwrap().outcome,
            Outcome::AlreadyDone
        );
        assert_eq!(summary.get("aur:discord").unwrap().outcome, Outcome::Changed);
        assert!(!host.ran("yay -S --needed --noconfirm google-chrome"));
    }
}
