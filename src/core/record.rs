//! The in-memory model of a discovered file and the history of steps run against it.

use crate::core::runner::RunnerCategory;
use crate::utils::naming::{join_file_name, split_file_name};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The working name of a file: a stem plus an extension without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingName {
    pub name: String,
    pub extension: String,
}

impl WorkingName {
    pub fn new(name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extension: extension.into(),
        }
    }

    /// Splits a full file name (`photo.jpg`) into its stem and extension.
    pub fn from_file_name(file_name: &str) -> Self {
        let (name, extension) = split_file_name(file_name);
        Self { name, extension }
    }

    /// Joins stem and extension back into a file name.
    pub fn file_name(&self) -> String {
        join_file_name(&self.name, &self.extension)
    }
}

/// The outcome of one step executed against one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub runner_id: String,
    /// Copied from the runner definition when the step ran.
    pub action: RunnerCategory,
    /// The working name after this step.
    pub snapshot: WorkingName,
    pub message: String,
    /// Set only by a step that routes the file to a destination folder.
    pub output_path: Option<PathBuf>,
    /// Whether the file is fed into the next step.
    pub continues: bool,
    /// The runner failed for this file rather than deciding to stop it.
    #[serde(default)]
    pub failed: bool,
}

/// Explicit view of where a file ended up after a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum FileFate {
    /// No step has run against the file yet.
    Pending,
    /// The last step let the file through.
    Flowing,
    /// A filter step rejected the file.
    Filtered,
    /// A step failed or stopped the file without routing it.
    Stalled(String),
    /// An output step routed the file to this folder.
    Output(PathBuf),
}

/// A single file discovered in a source folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub original_name: String,
    pub extension: String,
    pub original_path: PathBuf,
    /// The selected source folder that yielded this file.
    pub source_root: PathBuf,
    pub size: u64,
    pub working_name: String,
    pub working_extension: String,
    pub history: Vec<StepResult>,
}

impl FileRecord {
    pub fn new(original_path: PathBuf, source_root: PathBuf, size: u64) -> Self {
        let file_name = original_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let WorkingName { name, extension } = WorkingName::from_file_name(&file_name);
        Self {
            working_name: name.clone(),
            working_extension: extension.clone(),
            original_name: name,
            extension,
            original_path,
            source_root,
            size,
            history: Vec::new(),
        }
    }

    /// Builds a record for a path that does not need to exist, used by tests and previews.
    pub fn from_name(file_name: &str, size: u64) -> Self {
        let root = PathBuf::from("/source");
        Self::new(root.join(file_name), root, size)
    }

    pub fn original_file_name(&self) -> String {
        join_file_name(&self.original_name, &self.extension)
    }

    pub fn working(&self) -> WorkingName {
        WorkingName::new(self.working_name.clone(), self.working_extension.clone())
    }

    pub fn working_file_name(&self) -> String {
        join_file_name(&self.working_name, &self.working_extension)
    }

    pub(crate) fn set_working(&mut self, working: WorkingName) {
        self.working_name = working.name;
        self.working_extension = working.extension;
    }

    /// Clears history and reseeds the working name from the original one.
    pub(crate) fn reset(&mut self) {
        self.history.clear();
        self.working_name = self.original_name.clone();
        self.working_extension = self.extension.clone();
    }

    pub fn last_result(&self) -> Option<&StepResult> {
        self.history.last()
    }

    /// A file is eligible for the next step until a step stops it.
    pub fn is_eligible(&self) -> bool {
        self.last_result().map_or(true, |r| r.continues)
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.last_result().and_then(|r| r.output_path.as_deref())
    }

    /// The destination of the file once applied, if it reached an output step.
    pub fn destination(&self) -> Option<PathBuf> {
        self.output_path()
            .map(|dir| dir.join(self.working_file_name()))
    }

    pub fn fate(&self) -> FileFate {
        match self.last_result() {
            None => FileFate::Pending,
            Some(r) if r.continues => FileFate::Flowing,
            Some(r) => match &r.output_path {
                Some(path) => FileFate::Output(path.clone()),
                None if r.failed => FileFate::Stalled(r.message.clone()),
                None if r.action == RunnerCategory::Filter => FileFate::Filtered,
                None => FileFate::Stalled(r.message.clone()),
            },
        }
    }
}
