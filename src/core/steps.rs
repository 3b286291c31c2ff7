//! The user-ordered list of configured pipeline steps.

use crate::core::runner::{BoundParams, RunnerDefinition, RunnerRegistry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One configured step: a runner id plus the values bound to its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub id: String,
    pub label: String,
    pub runner_id: String,
    #[serde(default)]
    pub params: BoundParams,
}

impl StepConfig {
    pub fn new(label: impl Into<String>, runner_id: impl Into<String>, params: BoundParams) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            runner_id: runner_id.into(),
            params,
        }
    }

    /// A step bound to the runner's default parameter values.
    pub fn for_runner(runner: &RunnerDefinition) -> Self {
        Self::new(runner.label.clone(), runner.id.clone(), runner.default_params())
    }

    /// The same configuration under a fresh id.
    pub fn with_new_id(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }
}

/// An ordered list of steps, reordered only by adjacent swaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList {
    steps: Vec<StepConfig>,
}

impl StepList {
    pub fn new(steps: Vec<StepConfig>) -> Self {
        Self { steps }
    }

    /// Appends a step using the registry's default runner.
    pub fn add(&mut self, registry: &RunnerRegistry) -> &StepConfig {
        self.push(StepConfig::for_runner(registry.default_runner()))
    }

    /// Appends a step for the given runner, or `None` if the id is unknown.
    pub fn add_with(&mut self, runner_id: &str, registry: &RunnerRegistry) -> Option<&StepConfig> {
        let runner = registry.get(runner_id)?;
        Some(self.push(StepConfig::for_runner(runner)))
    }

    pub fn push(&mut self, step: StepConfig) -> &StepConfig {
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    /// Replaces a step's configuration while keeping its id and position.
    ///
    /// When the runner changes and no params are given, the new runner's
    /// defaults are bound.
    pub fn update(
        &mut self,
        id: &str,
        label: Option<String>,
        runner_id: &str,
        params: Option<BoundParams>,
        registry: &RunnerRegistry,
    ) -> bool {
        let Some(step) = self.steps.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        let runner_changed = step.runner_id != runner_id;
        let params = match (params, registry.get(runner_id)) {
            (Some(params), _) => params,
            (None, Some(runner)) if runner_changed => runner.default_params(),
            (None, _) => step.params.clone(),
        };
        let label = match (label, registry.get(runner_id)) {
            (Some(label), _) => label,
            (None, Some(runner)) if runner_changed => runner.label.clone(),
            (None, _) => step.label.clone(),
        };
        *step = StepConfig {
            id: step.id.clone(),
            label,
            runner_id: runner_id.to_string(),
            params,
        };
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<StepConfig> {
        let position = self.position(id)?;
        Some(self.steps.remove(position))
    }

    /// Swaps the steps at `index` and `index + 1`. Out of range is a no-op.
    pub fn swap(&mut self, index: usize) -> bool {
        if index + 1 >= self.steps.len() {
            return false;
        }
        self.steps.swap(index, index + 1);
        true
    }

    pub fn move_up(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(position) if position > 0 => self.swap(position - 1),
            _ => false,
        }
    }

    pub fn move_down(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(position) => self.swap(position),
            None => false,
        }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn as_slice(&self) -> &[StepConfig] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepConfig> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn into_vec(self) -> Vec<StepConfig> {
        self.steps
    }
}
