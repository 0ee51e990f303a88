//! Terminal progress for plan execution
//!
//! Non-interactive steps get an indicatif spinner while they run; interactive
//! steps (installers, password prompts) print a line and hand the terminal
//! over instead.

use colored::Colorize;
use converge::{Outcome, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui;

/// Create a spinner for a running step
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Renders executor events on the terminal
#[derive(Default)]
pub struct ConsoleProgress {
    quiet: bool,
    total: usize,
    index: usize,
    spinner: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ..Self::default()
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_plan_start(&mut self, total: usize) {
        self.total = total;
        self.index = 0;
    }

    fn on_step_start(&mut self, _id: &str, description: &str, interactive: bool) {
        self.index += 1;
        if self.quiet {
            return;
        }
        if interactive {
            ui::step(self.index, self.total, description);
        } else {
            let label = format!("[{}/{}] {}", self.index, self.total, description);
            self.spinner = Some(spinner(&label));
        }
    }

    fn on_step_complete(&mut self, _id: &str, description: &str, outcome: &Outcome) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }

        let symbol = match outcome {
            Outcome::AlreadyDone => outcome.symbol().dimmed(),
            Outcome::Changed => outcome.symbol().green(),
            Outcome::Skipped { .. } => outcome.symbol().yellow(),
            Outcome::Failed { .. } => outcome.symbol().red(),
        };

        match outcome {
            Outcome::Failed { error } => {
                println!("  {symbol} {description}");
                println!("      {}", error.red());
            }
            _ if self.quiet => {}
            Outcome::Skipped { reason } => {
                println!("  {symbol} {description} {}", format!("({reason})").dimmed());
            }
            Outcome::AlreadyDone => {
                println!("  {symbol} {} {}", description.dimmed(), "(already done)".dimmed());
            }
            Outcome::Changed => println!("  {symbol} {description}"),
        }
    }
}
