//! # Converge
//!
//! Idempotent, sequential step execution.
//!
//! A provisioning run is an ordered [`Plan`] of [`Step`]s. Every step knows how
//! to check whether the system already satisfies it and how to get there if it
//! does not. The executor walks the plan in order, skips satisfied steps,
//! applies the rest, and either aborts (fatal step) or records the failure and
//! keeps going (soft step).
//!
//! ## Core Concepts
//!
//! - **Step**: a precondition check plus an action, with a `fatal` flag
//! - **StepState**: result of the precondition check
//! - **Plan**: ordered steps plus operator notes for the final summary
//! - **Host**: the live system, injected so steps never touch the OS directly
//!
//! ## Example
//!
//! ```ignore
//! use converge::{ApplyContext, ApplyResult, Host, Plan, Step, StepState};
//!
//! #[derive(Debug)]
//! struct Motd { text: String }
//!
//! impl Step for Motd {
//!     fn id(&self) -> String { "file:/etc/motd".into() }
//!     fn description(&self) -> String { "Write /etc/motd".into() }
//!     fn kind(&self) -> &'static str { "file" }
//!
//!     fn check(&self, host: &dyn Host) -> anyhow::Result<StepState> {
//!         match host.read_file("/etc/motd".as_ref())? {
//!             Some(current) if current == self.text => Ok(StepState::satisfied()),
//!             Some(_) => Ok(StepState::drifted("content differs")),
//!             None => Ok(StepState::Missing),
//!         }
//!     }
//!
//!     fn apply(&self, ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
//!         ctx.host.write_file("/etc/motd".as_ref(), &self.text, 0o644)?;
//!         Ok(ApplyResult::Created)
//!     }
//! }
//!
//! let mut plan = Plan::new();
//! plan.push(Box::new(Motd { text: "hello\n".into() }));
//! let summary = converge::execute_simple(&plan, &host, &ExecuteOptions::default())?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`Host`]: queries and mutates the live system
//! - [`ProgressCallback`]: receives per-step progress events
//! - [`ConfirmCallback`]: answers yes/no prompts
//!
//! The CLI runs plans against the real machine; tests run the same plans
//! against a fake host.

pub mod context;
pub mod error;
pub mod executor;
pub mod plan;
pub mod step;
pub mod types;

pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, Host, NoProgress, ProgressCallback,
};
pub use error::ExecuteError;
pub use executor::{execute, execute_simple, inspect};
pub use plan::Plan;
pub use step::{BoxedStep, Step};
pub use types::{
    ApplyResult, CommandOutput, ExecuteOptions, Outcome, RunSummary, StepRecord, StepState,
};
