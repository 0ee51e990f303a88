//! Execution engine - applies steps in order with fatal/soft failure policy

use crate::context::{ApplyContext, Host, NoProgress, ProgressCallback};
use crate::error::ExecuteError;
use crate::plan::Plan;
use crate::step::Step;
use crate::types::{ApplyResult, ExecuteOptions, Outcome, RunSummary, StepRecord, StepState};
use anyhow::Result;

/// Execute a plan against a host
///
/// Steps run strictly in order. For each step the check runs first; a
/// satisfied step is recorded as already done and its action is never
/// invoked. A failing fatal step returns [`ExecuteError::Fatal`] immediately,
/// a failing soft step is recorded and the run continues.
///
/// # Arguments
/// * `plan` - The steps to run, plus operator notes
/// * `host` - The system being provisioned
/// * `opts` - Execution options (dry_run)
/// * `progress` - Progress callback
pub fn execute<P: ProgressCallback>(
    plan: &Plan,
    host: &dyn Host,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<RunSummary, ExecuteError> {
    let mut summary = RunSummary {
        records: Vec::with_capacity(plan.len()),
        notes: plan.notes.clone(),
    };

    progress.on_plan_start(plan.len());

    for step in &plan.steps {
        let id = step.id();
        let description = step.description();
        progress.on_step_start(&id, &description, step.interactive());

        let outcome = run_step(step.as_ref(), host, opts);
        progress.on_step_complete(&id, &description, &outcome);

        let failure = match &outcome {
            Outcome::Failed { error } if step.fatal() => Some(error.clone()),
            _ => None,
        };

        summary.push(StepRecord {
            id: id.clone(),
            kind: step.kind().to_string(),
            description: description.clone(),
            outcome,
        });

        if let Some(message) = failure {
            return Err(ExecuteError::Fatal {
                step: id,
                description,
                message,
                summary: Box::new(summary),
            });
        }
    }

    Ok(summary)
}

/// Check and, if needed, apply a single step
fn run_step(step: &dyn Step, host: &dyn Host, opts: &ExecuteOptions) -> Outcome {
    let state = match step.check(host) {
        Ok(state) => state,
        Err(e) => {
            return Outcome::Failed {
                error: format!("check failed: {e:#}"),
            };
        }
    };

    if state.is_satisfied() {
        return Outcome::AlreadyDone;
    }

    if opts.dry_run {
        return Outcome::Skipped {
            reason: format!("dry run: would apply ({state})"),
        };
    }

    let mut ctx = ApplyContext::new(host);
    match step.apply(&mut ctx) {
        Ok(ApplyResult::Created | ApplyResult::Modified) => Outcome::Changed,
        Ok(ApplyResult::NoChange) => Outcome::AlreadyDone,
        Ok(ApplyResult::Skipped { reason }) => Outcome::Skipped { reason },
        Ok(ApplyResult::Failed { error }) => Outcome::Failed { error },
        Err(e) => Outcome::Failed {
            error: format!("{e:#}"),
        },
    }
}

/// Run only the checks of a plan, never applying anything
///
/// Returns `(step, state)` pairs in plan order; a failing check is reported
/// as its error message.
pub fn inspect<'p>(
    plan: &'p Plan,
    host: &dyn Host,
) -> Vec<(&'p dyn Step, std::result::Result<StepState, String>)> {
    plan.steps
        .iter()
        .map(|step| {
            let state = step.check(host).map_err(|e| format!("{e:#}"));
            (step.as_ref(), state)
        })
        .collect()
}

/// Simple execution without progress reporting
pub fn execute_simple(
    plan: &Plan,
    host: &dyn Host,
    opts: &ExecuteOptions,
) -> Result<RunSummary, ExecuteError> {
    execute(plan, host, opts, &mut NoProgress)
}
