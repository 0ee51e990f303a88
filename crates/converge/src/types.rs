//! Core types for idempotent step execution

use std::fmt;
use std::process::Output;

/// Result of a step's precondition check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    /// Target state already reached
    Satisfied { details: Option<String> },
    /// Target state absent
    Missing,
    /// Something exists but differs from the target state
    Drifted { reason: String },
    /// Always pending (one-shot maintenance actions)
    Always,
}

impl StepState {
    pub fn satisfied() -> Self {
        Self::Satisfied { details: None }
    }

    pub fn satisfied_with(details: impl Into<String>) -> Self {
        Self::Satisfied {
            details: Some(details.into()),
        }
    }

    pub fn drifted(reason: impl Into<String>) -> Self {
        Self::Drifted {
            reason: reason.into(),
        }
    }

    /// Check if the step has nothing left to do
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied { details: None } => write!(f, "done"),
            Self::Satisfied { details: Some(d) } => write!(f, "done ({d})"),
            Self::Missing => write!(f, "missing"),
            Self::Drifted { reason } => write!(f, "drifted: {reason}"),
            Self::Always => write!(f, "runs every time"),
        }
    }
}

/// Result of applying a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Nothing needed doing after all
    NoChange,
    /// Something new was created
    Created,
    /// Something existing was changed
    Modified,
    /// The action ran but did not succeed
    Failed { error: String },
    /// The action was deliberately not run
    Skipped { reason: String },
}

/// What happened to one step during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Precondition held, action not invoked
    AlreadyDone,
    /// Action ran and changed the system
    Changed,
    /// Action was not run (dry run, declined)
    Skipped { reason: String },
    /// Check or action failed on a soft step
    Failed { error: String },
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::AlreadyDone => "○",
            Self::Changed => "✓",
            Self::Skipped { .. } => "⊘",
            Self::Failed { .. } => "✗",
        }
    }
}

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub id: String,
    pub kind: String,
    pub description: String,
    pub outcome: Outcome,
}

/// Summary of a run, in plan order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub records: Vec<StepRecord>,
    /// Manual follow-ups for the operator, printed after the run
    pub notes: Vec<String>,
}

impl RunSummary {
    pub fn push(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Number of steps that changed the system
    pub fn changed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Changed))
    }

    /// Number of steps whose precondition already held
    pub fn already_done(&self) -> usize {
        self.count(|o| matches!(o, Outcome::AlreadyDone))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    /// Steps that ended without failure (changed or already done)
    pub fn succeeded(&self) -> usize {
        self.changed() + self.already_done()
    }

    /// Ids of the failed steps, in plan order
    pub fn failed_ids(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
            .map(|r| r.id.as_str())
            .collect()
    }

    /// Look up the record for a step id
    pub fn get(&self, id: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Merge another summary into this one, keeping order
    pub fn merge(&mut self, other: RunSummary) {
        self.records.extend(other.records);
        for note in other.notes {
            if !self.notes.contains(&note) {
                self.notes.push(note);
            }
        }
    }
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Report pending steps without applying them
    pub dry_run: bool,
}

/// Captured output of a subprocess
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into().into_bytes(),
            stderr: Vec::new(),
            success: true,
        }
    }

    /// Failed output with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into().into_bytes(),
            success: false,
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Best available error text (stderr, falling back to stdout)
    pub fn error_text(&self) -> String {
        let stderr = self.stderr_str();
        if stderr.trim().is_empty() {
            self.stdout_str().trim().to_string()
        } else {
            stderr.trim().to_string()
        }
    }
}
