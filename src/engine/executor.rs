//! Plan execution with archup's terminal UI

use anyhow::Result;
use colored::Colorize;
use converge::{ConfirmCallback, ExecuteError, ExecuteOptions, Host, Outcome, Plan, RunSummary};

use crate::progress::ConsoleProgress;
use crate::ui;

/// Options for running a stage
#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    /// Report pending steps without applying them
    pub dry_run: bool,
    /// Answer yes to every prompt
    pub yes: bool,
    pub quiet: bool,
}

impl StageOptions {
    fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: self.dry_run,
        }
    }
}

/// Execute a plan, rendering progress and the final summary
///
/// A fatal failure prints the partial summary before the error is
/// returned, so the operator sees how far the stage got.
pub fn run_plan(plan: &Plan, host: &dyn Host, opts: &StageOptions) -> Result<RunSummary> {
    let mut progress = ConsoleProgress::new(opts.quiet);
    match converge::execute(plan, host, &opts.execute_options(), &mut progress) {
        Ok(summary) => Ok(summary),
        Err(err) => {
            print_summary(err.summary(), opts.dry_run);
            print_fatal(&err);
            Err(err.into())
        }
    }
}

fn print_fatal(err: &ExecuteError) {
    println!();
    println!(
        "  {} Stopped at '{}'; later steps did not run",
        "✗".red().bold(),
        err.step()
    );
}

/// Print the end-of-stage summary
pub fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!();
    if dry_run {
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if summary.is_success() {
        println!("  {} Stage completed successfully!", "✓".green().bold());
    } else {
        println!("  {} Stage completed with errors", "⚠".yellow().bold());
    }

    if summary.changed() > 0 {
        println!("    • {} changed", summary.changed());
    }
    if summary.already_done() > 0 {
        println!("    • {} already done", summary.already_done());
    }
    if summary.skipped() > 0 {
        let label = if dry_run { "pending" } else { "skipped" };
        println!("    • {} {label}", summary.skipped());
    }
    if summary.failed() > 0 {
        println!("    • {} {}", summary.failed(), "failed:".red());
        for record in &summary.records {
            if let Outcome::Failed { error } = &record.outcome {
                println!("        {} {}: {}", "✗".red(), record.id, error.dimmed());
            }
        }
    }

    if !summary.notes.is_empty() {
        ui::section(if dry_run { "Notes" } else { "Next steps" });
        for note in &summary.notes {
            ui::item(note);
        }
    }
}

/// Interactive yes/no prompt on the terminal
pub struct DialoguerConfirm;

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}

/// `--yes` answers every prompt; otherwise ask on the terminal
pub fn confirmer(yes: bool) -> Box<dyn ConfirmCallback> {
    if yes {
        Box::new(converge::AutoConfirm)
    } else {
        Box::new(DialoguerConfirm)
    }
}
