//! Responsible for transforming the `AppState` into a `UiState` view model.
//!
//! Labels are localized here, files are projected through the active view
//! mode, and every step is annotated with the problem that kept it from
//! running, if any.

use crate::config::flow::FlowInfo;
use crate::config::AppConfig;
use crate::core::runner::{BoundParams, ParamSpec, RunnerCategory, Scope};
use crate::core::{classify, counts, ClassCounts, FileFate, FileRecord, FilterChain, RenameChain, ViewMode};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

use super::i18n::tr;
use super::state::{AppState, ConfigIssue, Operation};

/// A serializable representation of the application state for the UI.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub config: AppConfig,
    pub runners: Vec<RunnerView>,
    pub steps: Vec<StepView>,
    pub files: Vec<FileView>,
    pub counts: ClassCounts,
    pub view_mode: ViewMode,
    pub in_operation: Option<Operation>,
    pub status_message: String,
    pub config_issue: Option<ConfigIssue>,
    pub flows: Vec<FlowInfo>,
    pub current_flow: Option<String>,
    pub rejected_runners: Vec<String>,
    pub failures: usize,
    pub last_apply_summary: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RunnerView {
    pub id: String,
    pub label: String,
    pub category: RunnerCategory,
    pub scope: Scope,
    pub params: Vec<ParamSpec>,
    pub desc: String,
    pub is_custom: bool,
    pub enabled: bool,
    pub error: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub id: String,
    pub label: String,
    pub runner_id: String,
    pub params: BoundParams,
    /// Why the step was skipped in the last run.
    pub issue: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    pub original_name: String,
    pub working_name: String,
    pub path: PathBuf,
    pub source_root: PathBuf,
    pub size: u64,
    pub fate: FileFate,
    pub message: Option<String>,
    pub steps_run: usize,
    /// For filtered files, the first filter step in the list that rejects the file.
    pub rejected_by: Option<String>,
    /// The name the rename steps alone produce over the whole list.
    pub rename_preview: String,
}

impl FileView {
    fn from_record(file: &FileRecord, rejected_by: Option<String>, rename_preview: Option<&String>) -> Self {
        Self {
            original_name: file.original_file_name(),
            working_name: file.working_file_name(),
            path: file.original_path.clone(),
            source_root: file.source_root.clone(),
            size: file.size,
            fate: file.fate(),
            message: file.last_result().map(|r| r.message.clone()),
            steps_run: file.history.len(),
            rejected_by,
            rename_preview: rename_preview.cloned().unwrap_or_else(|| file.original_file_name()),
        }
    }
}

/// Runs the rename steps on their own over a copy of all files, keyed by original path.
fn rename_previews(state: &AppState) -> HashMap<PathBuf, String> {
    let chain = RenameChain::from_steps(state.steps.as_slice(), &state.registry);
    if chain.is_empty() {
        return HashMap::new();
    }
    let mut files = state.files.clone();
    let failures = chain.apply(&mut files);
    if !failures.is_empty() {
        tracing::debug!("Rename preview kept {} names unchanged", failures.len());
    }
    files
        .into_iter()
        .map(|file| {
            let name = file.working_file_name();
            (file.original_path, name)
        })
        .collect()
}

/// Creates the complete `UiState` from the current `AppState`.
pub fn generate_ui_state(state: &AppState) -> UiState {
    let language = state.config.language;

    let runners = state
        .registry
        .all()
        .iter()
        .map(|runner| RunnerView {
            id: runner.id.clone(),
            label: tr(language, &runner.label),
            category: runner.category,
            scope: runner.scope,
            params: runner
                .params
                .iter()
                .map(|p| ParamSpec {
                    label: tr(language, &p.label),
                    ..p.clone()
                })
                .collect(),
            desc: runner.desc.clone(),
            is_custom: runner.is_custom(),
            enabled: runner.enabled,
            error: runner.error.clone(),
        })
        .collect();

    let steps = state
        .steps
        .iter()
        .map(|step| StepView {
            id: step.id.clone(),
            label: tr(language, &step.label),
            runner_id: step.runner_id.clone(),
            params: step.params.clone(),
            issue: state
                .last_pipeline
                .issues
                .iter()
                .find(|issue| issue.step_id == step.id)
                .map(|issue| issue.reason.clone()),
        })
        .collect();

    let files = if state.in_operation == Some(Operation::Scanning) {
        Vec::new()
    } else {
        let filters = FilterChain::from_steps(state.steps.as_slice(), &state.registry);
        let previews = rename_previews(state);
        classify(&state.files, state.view_mode)
            .into_iter()
            .map(|file| {
                let rejected_by = match file.fate() {
                    FileFate::Filtered => filters.blame(file).map(|step| tr(language, &step.label)),
                    _ => None,
                };
                FileView::from_record(file, rejected_by, previews.get(&file.original_path))
            })
            .collect()
    };

    let status_message = if state.status_message.is_empty() {
        tr(language, "status.ready")
    } else {
        state.status_message.clone()
    };

    UiState {
        config: state.config.clone(),
        runners,
        steps,
        files,
        counts: counts(&state.files),
        view_mode: state.view_mode,
        in_operation: state.in_operation,
        status_message,
        config_issue: state.config_issue.clone(),
        flows: state.flows.clone(),
        current_flow: state.current_flow.clone(),
        rejected_runners: state.rejected_runners.clone(),
        failures: state.last_pipeline.failures,
        last_apply_summary: state.last_apply.as_ref().map(|report| report.summary(5)),
    }
}
