//! Step trait for idempotent provisioning
//!
//! A Step is one desired system state: a check that says whether the state
//! already holds, and an action that establishes it.

use crate::context::{ApplyContext, Host};
use crate::types::{ApplyResult, StepState};
use anyhow::Result;
use std::fmt;

/// Core trait for provisioning steps
///
/// Every step provides:
/// - Identity (id, description, kind)
/// - A precondition check against the live [`Host`]
/// - An action that reaches the target state
/// - A failure policy (`fatal`)
///
/// # Example
///
/// ```ignore
/// use converge::{ApplyContext, ApplyResult, Host, Step, StepState};
///
/// #[derive(Debug)]
/// struct Enabled(String);
///
/// impl Step for Enabled {
///     fn id(&self) -> String {
///         format!("service:{}", self.0)
///     }
///
///     fn description(&self) -> String {
///         format!("Enable {}", self.0)
///     }
///
///     fn kind(&self) -> &'static str {
///         "service"
///     }
///
///     fn fatal(&self) -> bool {
///         false
///     }
///
///     fn check(&self, host: &dyn Host) -> anyhow::Result<StepState> {
///         if host.service_enabled(&self.0)? {
///             Ok(StepState::satisfied())
///         } else {
///             Ok(StepState::Missing)
///         }
///     }
///
///     fn apply(&self, ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
///         ctx.host.run_checked("systemctl", &["enable", &self.0])?;
///         Ok(ApplyResult::Modified)
///     }
/// }
/// ```
pub trait Step: fmt::Debug {
    /// Stable identifier, unique within a plan (e.g. "pkg:firefox",
    /// "file:/etc/NetworkManager/conf.d/archup.conf")
    fn id(&self) -> String;

    /// Human-readable description of the target state
    fn description(&self) -> String;

    /// Step category, used for grouping in status output
    fn kind(&self) -> &'static str;

    /// Whether a failure aborts the whole run
    fn fatal(&self) -> bool {
        true
    }

    /// Whether the action needs the terminal (password prompts, installers)
    fn interactive(&self) -> bool {
        false
    }

    /// Query the live system for the step's current state
    fn check(&self, host: &dyn Host) -> Result<StepState>;

    /// Reach the target state
    ///
    /// Only called when [`Step::check`] did not report the step satisfied.
    /// Return `Err` or `ApplyResult::Failed` on failure.
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;
}

/// A boxed step for type-erased storage
pub type BoxedStep = Box<dyn Step>;
