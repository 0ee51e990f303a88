//! Provisioning steps
//!
//! Every change archup makes to a system is one of these steps:
//! - a check that re-queries the live system (no state is kept between runs)
//! - an action that reaches the target state
//! - a failure policy (fatal steps abort the stage, soft steps are reported)

pub use converge::{ApplyContext, ApplyResult, Host, Step, StepState};

pub mod aur_helper;
pub mod cache;
pub mod file;
pub mod firewall;
pub mod fstab;
pub mod grub;
pub mod installer;
pub mod package;
pub mod service;
pub mod sudoers;
pub mod user;
pub mod vars;

pub use aur_helper::AurHelper;
pub use cache::CacheClean;
pub use file::{Directory, ManagedFile, OwnedScript, StagedCopy, TemplateFile};
pub use firewall::{UfwDefaults, UfwEnable, UfwRule};
pub use fstab::FstabEntry;
pub use grub::GrubSettings;
pub use installer::Archinstall;
pub use package::{Manager, Package};
pub use service::Service;
pub use sudoers::SudoersDropIn;
pub use user::{UserAccount, UserPassword};
