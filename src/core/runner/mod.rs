//! Runner definitions: the named, parameterized units of pipeline behaviour.
//!
//! A runner is resolved by id from the [`RunnerRegistry`] and executed against
//! either a single file (`Scope::PerFile`) or the whole eligible list
//! (`Scope::WholeList`). Built-in runners form a closed enum; user-authored
//! runners are declarative rules loaded from JSON.

pub mod builtin;
pub mod custom;
pub mod registry;

pub use builtin::BuiltinRunner;
pub use custom::CustomRule;
pub use registry::{RegistryError, RunnerRegistry};

use crate::core::record::{FileRecord, WorkingName};
use crate::utils::naming::validate_file_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Whether a runner sees one file at a time or the whole eligible list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    PerFile,
    WholeList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunnerCategory {
    PassThrough,
    Filter,
    Rename,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamType {
    String,
    Number,
    Select,
    FolderPath,
    Boolean,
}

/// A concrete parameter value bound by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl ParamValue {
    /// Renders the value as plain text, e.g. for template substitution.
    pub fn as_text(&self) -> String {
        match self {
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Number(n) => n.to_string(),
            ParamValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// Parameter values keyed by parameter id, as stored on a step.
pub type BoundParams = BTreeMap<String, ParamValue>;

/// The declaration of one runner parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub default: ParamValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl ParamSpec {
    fn build(id: &str, label: &str, kind: ParamType, default: ParamValue) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            kind,
            default,
            choices: Vec::new(),
            read_only: false,
        }
    }

    pub fn text(id: &str, label: &str, default: &str) -> Self {
        Self::build(id, label, ParamType::String, default.into())
    }

    pub fn number(id: &str, label: &str, default: i64) -> Self {
        Self::build(id, label, ParamType::Number, default.into())
    }

    pub fn flag(id: &str, label: &str, default: bool) -> Self {
        Self::build(id, label, ParamType::Boolean, default.into())
    }

    pub fn folder(id: &str, label: &str) -> Self {
        Self::build(id, label, ParamType::FolderPath, "".into())
    }

    pub fn select(id: &str, label: &str, default: &str, choices: &[&str]) -> Self {
        let mut spec = Self::build(id, label, ParamType::Select, default.into());
        spec.choices = choices.iter().map(|c| c.to_string()).collect();
        spec
    }
}

/// Default values for every declared parameter.
pub fn default_params(specs: &[ParamSpec]) -> BoundParams {
    specs
        .iter()
        .map(|spec| (spec.id.clone(), spec.default.clone()))
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("parameter '{0}' is not declared by this runner")]
    UnknownParam(String),

    #[error("parameter '{param}' is invalid: {reason}")]
    InvalidParam { param: String, reason: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("{0}")]
    InvalidName(String),

    #[error("runner returned {got} results for {expected} files")]
    BatchMismatch { expected: usize, got: usize },

    #[error("rule error: {0}")]
    Rule(String),
}

/// Typed access to a step's bound parameters, falling back to declared defaults.
///
/// Missing values take the declared default and extra values are ignored, so a
/// step saved against an older parameter set still runs.
pub struct Params<'a> {
    specs: &'a [ParamSpec],
    bound: &'a BoundParams,
}

impl<'a> Params<'a> {
    pub fn new(specs: &'a [ParamSpec], bound: &'a BoundParams) -> Self {
        Self { specs, bound }
    }

    fn spec(&self, id: &str) -> Result<&'a ParamSpec, RunnerError> {
        self.specs
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| RunnerError::UnknownParam(id.to_string()))
    }

    pub fn value(&self, id: &str) -> Result<&'a ParamValue, RunnerError> {
        let spec = self.spec(id)?;
        Ok(self.bound.get(id).unwrap_or(&spec.default))
    }

    pub fn text(&self, id: &str) -> Result<String, RunnerError> {
        match self.value(id)? {
            ParamValue::Text(s) => Ok(s.clone()),
            other => Ok(other.as_text()),
        }
    }

    pub fn number(&self, id: &str) -> Result<i64, RunnerError> {
        match self.value(id)? {
            ParamValue::Number(n) => Ok(*n),
            ParamValue::Text(s) => s.trim().parse().map_err(|_| RunnerError::InvalidParam {
                param: id.to_string(),
                reason: format!("'{s}' is not a whole number"),
            }),
            ParamValue::Bool(_) => Err(RunnerError::InvalidParam {
                param: id.to_string(),
                reason: "expected a number, got a boolean".to_string(),
            }),
        }
    }

    pub fn flag(&self, id: &str) -> Result<bool, RunnerError> {
        match self.value(id)? {
            ParamValue::Bool(b) => Ok(*b),
            ParamValue::Text(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            ParamValue::Text(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(RunnerError::InvalidParam {
                param: id.to_string(),
                reason: format!("expected a boolean, got '{}'", other.as_text()),
            }),
        }
    }

    /// A select value, which must be one of the declared choices.
    pub fn choice(&self, id: &str) -> Result<String, RunnerError> {
        let spec = self.spec(id)?;
        let value = self.text(id)?;
        if spec.choices.is_empty() || spec.choices.contains(&value) {
            Ok(value)
        } else {
            Err(RunnerError::InvalidParam {
                param: id.to_string(),
                reason: format!("'{value}' is not one of {:?}", spec.choices),
            })
        }
    }

    /// All parameters with their effective values.
    pub fn effective(&self) -> BoundParams {
        self.specs
            .iter()
            .map(|spec| {
                let value = self.bound.get(&spec.id).unwrap_or(&spec.default);
                (spec.id.clone(), value.clone())
            })
            .collect()
    }
}

/// What a runner decided for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub rename: Option<WorkingName>,
    pub continues: bool,
    pub output_path: Option<PathBuf>,
    pub failed: bool,
    pub message: String,
}

impl StepOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            rename: None,
            continues: true,
            output_path: None,
            failed: false,
            message: message.into(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            continues: false,
            ..Self::pass(message)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            continues: false,
            failed: true,
            ..Self::pass(message)
        }
    }

    pub fn output(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            continues: false,
            output_path: Some(path),
            ..Self::pass(message)
        }
    }

    /// A successful rename. Fails if the new name cannot be used as a file name.
    pub fn renamed(from: &FileRecord, to: WorkingName) -> Result<Self, RunnerError> {
        let new_name = to.file_name();
        validate_file_name(&new_name).map_err(RunnerError::InvalidName)?;
        let message = format!("{} -> {}", from.working_file_name(), new_name);
        Ok(Self {
            rename: Some(to),
            ..Self::pass(message)
        })
    }
}

/// How a definition's behaviour is implemented.
#[derive(Debug, Clone)]
pub enum RunnerKind {
    Builtin(BuiltinRunner),
    Custom(CustomRule),
}

/// The single interface the executor dispatches through.
pub trait Runner {
    fn scope(&self) -> Scope;

    fn parameters(&self) -> &[ParamSpec];

    /// Runs against a batch of files. Per-file runners are always called with a
    /// one-element batch. The result has one entry per input file; `None` means
    /// the runner appends nothing for that file.
    fn execute(
        &self,
        batch: &[&FileRecord],
        params: &BoundParams,
    ) -> Result<Vec<Option<StepOutcome>>, RunnerError>;
}

/// A registered runner: its metadata plus the behaviour behind it.
#[derive(Debug, Clone)]
pub struct RunnerDefinition {
    pub id: String,
    /// A localization key for built-ins, the literal label for user-authored runners.
    pub label: String,
    pub category: RunnerCategory,
    pub scope: Scope,
    pub params: Vec<ParamSpec>,
    pub desc: String,
    pub kind: RunnerKind,
    pub enabled: bool,
    /// Set for user-authored runners that failed to load; such runners never execute.
    pub error: Option<String>,
}

impl RunnerDefinition {
    pub fn builtin(
        id: &str,
        category: RunnerCategory,
        scope: Scope,
        params: Vec<ParamSpec>,
        desc: &str,
        runner: BuiltinRunner,
    ) -> Self {
        Self {
            id: id.to_string(),
            label: format!("runner.{id}"),
            category,
            scope,
            params,
            desc: desc.to_string(),
            kind: RunnerKind::Builtin(runner),
            enabled: true,
            error: None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, RunnerKind::Custom(_))
    }

    pub fn is_runnable(&self) -> bool {
        self.enabled && self.error.is_none()
    }

    pub fn default_params(&self) -> BoundParams {
        default_params(&self.params)
    }
}

impl Runner for RunnerDefinition {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn parameters(&self) -> &[ParamSpec] {
        &self.params
    }

    fn execute(
        &self,
        batch: &[&FileRecord],
        params: &BoundParams,
    ) -> Result<Vec<Option<StepOutcome>>, RunnerError> {
        let params = Params::new(&self.params, params);
        match &self.kind {
            RunnerKind::Builtin(runner) => runner.execute(batch, &params),
            RunnerKind::Custom(rule) => rule.execute(self.scope, batch, &params),
        }
    }
}
