//! Simpler sibling pipelines: a pure filter chain and a pure rename chain.
//!
//! Neither records history. The filter chain answers "does this file pass
//! every filter", the rename chain computes final working names.

use crate::core::record::FileRecord;
use crate::core::runner::{
    BoundParams, Runner, RunnerCategory, RunnerDefinition, RunnerError, RunnerRegistry, Scope,
};
use crate::core::steps::StepConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("runner '{0}' does not exist")]
    UnknownRunner(String),

    #[error("runner '{runner_id}' is not a {expected:?} runner")]
    WrongCategory {
        runner_id: String,
        expected: RunnerCategory,
    },

    #[error("runner '{0}' cannot be executed")]
    NotRunnable(String),
}

#[derive(Debug, Clone)]
struct Link<'r> {
    step: StepConfig,
    runner: &'r RunnerDefinition,
}

impl<'r> Link<'r> {
    fn params(&self) -> &BoundParams {
        &self.step.params
    }
}

fn resolve<'r>(
    steps: &[StepConfig],
    registry: &'r RunnerRegistry,
    expected: RunnerCategory,
) -> Result<Vec<Link<'r>>, ChainError> {
    steps
        .iter()
        .map(|step| {
            let runner = registry
                .get(&step.runner_id)
                .ok_or_else(|| ChainError::UnknownRunner(step.runner_id.clone()))?;
            if runner.category != expected {
                return Err(ChainError::WrongCategory {
                    runner_id: runner.id.clone(),
                    expected,
                });
            }
            if !runner.is_runnable() {
                return Err(ChainError::NotRunnable(runner.id.clone()));
            }
            Ok(Link {
                step: step.clone(),
                runner,
            })
        })
        .collect()
}

/// Picks the steps of `steps` whose runner resolves to a usable runner of `category`.
fn select(steps: &[StepConfig], registry: &RunnerRegistry, category: RunnerCategory) -> Vec<StepConfig> {
    steps
        .iter()
        .filter(|step| {
            registry
                .get(&step.runner_id)
                .is_some_and(|runner| runner.category == category && runner.is_runnable())
        })
        .cloned()
        .collect()
}

/// Ordered per-file filters; a file survives only if every filter keeps it.
#[derive(Debug, Clone)]
pub struct FilterChain<'r> {
    links: Vec<Link<'r>>,
}

impl<'r> FilterChain<'r> {
    pub fn new(steps: &[StepConfig], registry: &'r RunnerRegistry) -> Result<Self, ChainError> {
        Ok(Self {
            links: resolve(steps, registry, RunnerCategory::Filter)?,
        })
    }

    /// The filter steps of a mixed step list; other and unusable steps are left out.
    pub fn from_steps(steps: &[StepConfig], registry: &'r RunnerRegistry) -> Self {
        let filters = select(steps, registry, RunnerCategory::Filter);
        // `select` only keeps runnable filters, so resolving cannot fail.
        Self::new(&filters, registry).unwrap_or(Self { links: Vec::new() })
    }

    fn keeps(link: &Link<'_>, file: &FileRecord) -> bool {
        match link.runner.execute(&[file], link.params()) {
            Ok(outcomes) => matches!(outcomes.first(), Some(Some(o)) if o.continues),
            Err(e) => {
                tracing::debug!("Filter '{}' failed for {:?}: {}", link.runner.id, file.original_path, e);
                false
            }
        }
    }

    pub fn passes(&self, file: &FileRecord) -> bool {
        self.links.iter().all(|link| Self::keeps(link, file))
    }

    /// The first filter that rejects the file.
    pub fn blame(&self, file: &FileRecord) -> Option<&StepConfig> {
        self.links
            .iter()
            .find(|link| !Self::keeps(link, file))
            .map(|link| &link.step)
    }

    pub fn survivors<'f>(&self, files: &'f [FileRecord]) -> Vec<&'f FileRecord> {
        files.iter().filter(|f| self.passes(f)).collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// A file whose rename failed in a chain step; it keeps its previous name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameFailure {
    pub file_index: usize,
    pub step_id: String,
    pub error: RunnerError,
}

/// Ordered rename steps applied strictly in sequence.
#[derive(Debug, Clone)]
pub struct RenameChain<'r> {
    links: Vec<Link<'r>>,
}

impl<'r> RenameChain<'r> {
    pub fn new(steps: &[StepConfig], registry: &'r RunnerRegistry) -> Result<Self, ChainError> {
        Ok(Self {
            links: resolve(steps, registry, RunnerCategory::Rename)?,
        })
    }

    /// The rename steps of a mixed step list; other and unusable steps are left out.
    pub fn from_steps(steps: &[StepConfig], registry: &'r RunnerRegistry) -> Self {
        let renames = select(steps, registry, RunnerCategory::Rename);
        Self::new(&renames, registry).unwrap_or(Self { links: Vec::new() })
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Recomputes working names from the original names.
    pub fn apply(&self, files: &mut [FileRecord]) -> Vec<RenameFailure> {
        let mut failures = Vec::new();
        for file in files.iter_mut() {
            file.reset();
        }

        for link in &self.links {
            let results: Vec<Result<Option<_>, RunnerError>> = match link.runner.scope() {
                Scope::PerFile => files
                    .iter()
                    .map(|file| {
                        link.runner
                            .execute(&[file], link.params())
                            .map(|mut outcomes| outcomes.pop().flatten())
                    })
                    .collect(),
                Scope::WholeList => {
                    let batch: Vec<&FileRecord> = files.iter().collect();
                    match link.runner.execute(&batch, link.params()) {
                        Ok(outcomes) if outcomes.len() == files.len() => outcomes.into_iter().map(Ok).collect(),
                        Ok(outcomes) => {
                            let error = RunnerError::BatchMismatch {
                                expected: files.len(),
                                got: outcomes.len(),
                            };
                            vec![Err(error); files.len()]
                        }
                        Err(error) => vec![Err(error); files.len()],
                    }
                }
            };

            for (file_index, (file, result)) in files.iter_mut().zip(results).enumerate() {
                match result {
                    Ok(Some(outcome)) if !outcome.failed => {
                        if let Some(working) = outcome.rename {
                            file.set_working(working);
                        }
                    }
                    Ok(Some(outcome)) => failures.push(RenameFailure {
                        file_index,
                        step_id: link.step.id.clone(),
                        error: RunnerError::Rule(outcome.message),
                    }),
                    Ok(None) => {}
                    Err(error) => failures.push(RenameFailure {
                        file_index,
                        step_id: link.step.id.clone(),
                        error,
                    }),
                }
            }
        }
        failures
    }
}
