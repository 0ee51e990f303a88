//! Execution plan - an ordered list of steps

use crate::step::{BoxedStep, Step};

/// An ordered provisioning plan
///
/// Steps run in insertion order. Notes are operator follow-ups that end up
/// in the run summary regardless of what the steps did.
#[derive(Default)]
pub struct Plan {
    pub steps: Vec<BoxedStep>,
    pub notes: Vec<String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, ignoring it if a step with the same id is already planned
    pub fn push(&mut self, step: BoxedStep) {
        let id = step.id();
        if self.steps.iter().any(|s| s.id() == id) {
            return;
        }
        self.steps.push(step);
    }

    /// Append several steps in order
    pub fn extend(&mut self, steps: impl IntoIterator<Item = BoxedStep>) {
        for step in steps {
            self.push(step);
        }
    }

    /// Add a note for the final summary
    pub fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }

    /// Keep only steps matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Step) -> bool,
    {
        Self {
            steps: self
                .steps
                .into_iter()
                .filter(|s| predicate(s.as_ref()))
                .collect(),
            notes: self.notes,
        }
    }

    /// Keep only steps whose kind or id matches `target`
    ///
    /// Target format: "kind" or "kind:name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => self.filter(|s| matches_target(s, t)),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id()).collect()
    }
}

fn matches_target(step: &dyn Step, target: &str) -> bool {
    if target.contains(':') {
        step.id() == target
    } else {
        step.kind() == target
    }
}
