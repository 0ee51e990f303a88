//! Execution engine for archup
//!
//! The stages build a [`converge::Plan`]; the engine:
//! 1. Batching - turns package groups into best-effort steps
//! 2. Executing - runs the plan with progress and a final summary
//! 3. Status - shows pending steps without applying anything

pub mod batch;
pub mod executor;
pub mod status;

pub use batch::{Group, add_group};
pub use executor::{StageOptions, confirmer, print_summary, run_plan};
pub use status::display_status;
