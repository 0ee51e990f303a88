//! Read-only view of a plan against the live system

use colored::Colorize;
use converge::{Host, Plan, StepState};

/// Counts from a status pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub done: usize,
    pub pending: usize,
    pub errors: usize,
}

/// Run every check in the plan and print where each step stands
///
/// Nothing is applied.
pub fn display_status(plan: &Plan, host: &dyn Host) -> StatusCounts {
    let mut counts = StatusCounts::default();
    let mut current_kind = "";

    for (step, state) in converge::inspect(plan, host) {
        if step.kind() != current_kind {
            current_kind = step.kind();
            println!();
            println!("  {}", current_kind.bold());
        }

        let policy = if step.fatal() {
            ""
        } else {
            " (best effort)"
        };

        match state {
            Ok(state @ StepState::Satisfied { .. }) => {
                counts.done += 1;
                println!(
                    "    {} {} {}",
                    "○".dimmed(),
                    step.description().dimmed(),
                    state.to_string().dimmed()
                );
            }
            Ok(state) => {
                counts.pending += 1;
                println!(
                    "    {} {}{} {}",
                    "+".green(),
                    step.description(),
                    policy.dimmed(),
                    format!("({state})").yellow()
                );
            }
            Err(error) => {
                counts.errors += 1;
                println!("    {} {}", "?".red(), step.description());
                println!("        {}", error.red());
            }
        }
    }

    println!();
    println!(
        "  {} done, {} pending, {} could not be checked",
        counts.done, counts.pending, counts.errors
    );
    counts
}
