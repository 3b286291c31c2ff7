//! The pipeline executor: threads a file list through the configured steps.
//!
//! Every run starts from a clean slate. Steps run in list order; a file keeps
//! taking part until a step answers `continues = false` for it. Unknown or
//! unusable runners skip their step, and runner errors only stop the file they
//! occurred on.

use crate::core::record::{FileRecord, StepResult};
use crate::core::runner::{Runner, RunnerDefinition, RunnerError, RunnerRegistry, Scope, StepOutcome};
use crate::core::steps::StepConfig;
use serde::Serialize;

/// A step that could not be run at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepIssue {
    pub step_id: String,
    pub step_label: String,
    pub runner_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Steps that were resolved and executed.
    pub steps_run: usize,
    /// Steps skipped because their runner could not be resolved.
    pub issues: Vec<StepIssue>,
    /// Per-file runner failures across all steps.
    pub failures: usize,
}

pub struct PipelineExecutor<'r> {
    registry: &'r RunnerRegistry,
}

impl<'r> PipelineExecutor<'r> {
    pub fn new(registry: &'r RunnerRegistry) -> Self {
        Self { registry }
    }

    fn resolve(&self, step: &StepConfig) -> Result<&'r RunnerDefinition, StepIssue> {
        let issue = |reason: String| StepIssue {
            step_id: step.id.clone(),
            step_label: step.label.clone(),
            runner_id: step.runner_id.clone(),
            reason,
        };
        let runner = self
            .registry
            .get(&step.runner_id)
            .ok_or_else(|| issue(format!("runner '{}' does not exist", step.runner_id)))?;
        if let Some(error) = &runner.error {
            return Err(issue(format!("runner '{}' is invalid: {error}", runner.id)));
        }
        if !runner.enabled {
            return Err(issue(format!("runner '{}' is disabled", runner.id)));
        }
        Ok(runner)
    }

    /// Runs all steps against `files`, replacing any previous run's history.
    pub fn run(&self, files: &mut [FileRecord], steps: &[StepConfig]) -> PipelineReport {
        let mut report = PipelineReport::default();
        for file in files.iter_mut() {
            file.reset();
        }

        for step in steps {
            let runner = match self.resolve(step) {
                Ok(runner) => runner,
                Err(issue) => {
                    tracing::warn!("Skipping step '{}': {}", issue.step_label, issue.reason);
                    report.issues.push(issue);
                    continue;
                }
            };

            let eligible: Vec<usize> = files
                .iter()
                .enumerate()
                .filter(|(_, f)| f.is_eligible())
                .map(|(i, _)| i)
                .collect();
            tracing::debug!(
                "Running step '{}' ({}) on {} eligible files",
                step.label,
                runner.id,
                eligible.len()
            );

            match runner.scope() {
                Scope::PerFile => {
                    for &i in &eligible {
                        let outcome = runner
                            .execute(&[&files[i]], &step.params)
                            .and_then(single_outcome);
                        report.failures += record(&mut files[i], step, runner, outcome);
                    }
                }
                Scope::WholeList => {
                    let result = {
                        let batch: Vec<&FileRecord> = eligible.iter().map(|&i| &files[i]).collect();
                        runner.execute(&batch, &step.params)
                    };
                    let outcomes = match result {
                        Ok(outcomes) if outcomes.len() == eligible.len() => {
                            outcomes.into_iter().map(Ok).collect()
                        }
                        Ok(outcomes) => {
                            let error = RunnerError::BatchMismatch {
                                expected: eligible.len(),
                                got: outcomes.len(),
                            };
                            vec![Err(error); eligible.len()]
                        }
                        Err(error) => vec![Err(error); eligible.len()],
                    };
                    for (&i, outcome) in eligible.iter().zip(outcomes) {
                        report.failures += record(&mut files[i], step, runner, outcome);
                    }
                }
            }
            report.steps_run += 1;
        }

        if report.failures > 0 {
            tracing::warn!("Pipeline finished with {} per-file failures", report.failures);
        }
        tracing::info!(
            "Pipeline ran {} of {} steps over {} files",
            report.steps_run,
            steps.len(),
            files.len()
        );
        report
    }
}

fn single_outcome(mut outcomes: Vec<Option<StepOutcome>>) -> Result<Option<StepOutcome>, RunnerError> {
    if outcomes.len() != 1 {
        return Err(RunnerError::BatchMismatch {
            expected: 1,
            got: outcomes.len(),
        });
    }
    Ok(outcomes.pop().flatten())
}

/// Appends the step result for one file. Returns 1 when the runner failed for it.
fn record(
    file: &mut FileRecord,
    step: &StepConfig,
    runner: &RunnerDefinition,
    outcome: Result<Option<StepOutcome>, RunnerError>,
) -> usize {
    let outcome = match outcome {
        Ok(Some(outcome)) => outcome,
        Ok(None) => return 0,
        Err(error) => {
            tracing::debug!("Step '{}' failed for {:?}: {}", step.label, file.original_path, error);
            StepOutcome::failed(format!("error: {error}"))
        }
    };
    if let Some(working) = outcome.rename {
        file.set_working(working);
    }
    file.history.push(StepResult {
        step_id: step.id.clone(),
        runner_id: runner.id.clone(),
        action: runner.category,
        snapshot: file.working(),
        message: outcome.message,
        output_path: outcome.output_path,
        continues: outcome.continues,
        failed: outcome.failed,
    });
    usize::from(outcome.failed)
}
