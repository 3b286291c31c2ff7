//! Defines the central, mutable state of the application.

use crate::config::flow::{self, FlowInfo};
use crate::config::{settings, AppConfig, ConfigError};
use crate::core::runner::custom::{load_custom_runners, runners_directory};
use crate::core::runner::RegistryError;
use crate::core::{
    ApplyReport, FileRecord, PipelineExecutor, PipelineReport, RunnerRegistry, StepList, ViewMode,
};
use serde::Serialize;
use std::path::PathBuf;

/// The long-running operations; at most one runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Scanning,
    Applying,
}

/// A configuration problem the user has to resolve before continuing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub message: String,
}

/// Holds the complete, mutable state of the application.
///
/// Wrapped in an `Arc<Mutex<...>>` and shared between the event loop, the IPC
/// handlers and the scan/apply tasks.
pub struct AppState {
    pub config: AppConfig,
    pub config_dir: PathBuf,
    /// Built-ins merged with the user-authored runners that were accepted.
    pub registry: RunnerRegistry,
    /// User-authored runner ids rejected because they collide with another runner.
    pub rejected_runners: Vec<String>,
    pub steps: StepList,
    /// Files from all source folders, in scan order.
    pub files: Vec<FileRecord>,
    pub view_mode: ViewMode,
    pub last_pipeline: PipelineReport,
    pub last_apply: Option<ApplyReport>,
    pub in_operation: Option<Operation>,
    pub config_issue: Option<ConfigIssue>,
    pub status_message: String,
    pub flows: Vec<FlowInfo>,
    pub current_flow: Option<String>,
}

impl AppState {
    /// Creates the state around an already loaded configuration.
    pub fn new(config: AppConfig, config_dir: PathBuf) -> Result<Self, RegistryError> {
        let mut state = Self {
            config,
            config_dir,
            registry: RunnerRegistry::builtin()?,
            rejected_runners: Vec::new(),
            steps: StepList::default(),
            files: Vec::new(),
            view_mode: ViewMode::default(),
            last_pipeline: PipelineReport::default(),
            last_apply: None,
            in_operation: None,
            config_issue: None,
            status_message: String::new(),
            flows: Vec::new(),
            current_flow: None,
        };
        state.reload_custom_runners();
        state.refresh_flows();
        Ok(state)
    }

    /// Loads the configuration from `config_dir`, writing defaults on first launch.
    ///
    /// A configuration that exists but cannot be used leaves the defaults in
    /// memory and records a blocking `ConfigIssue`; the file is not touched.
    pub fn load(config_dir: PathBuf) -> Result<Self, RegistryError> {
        let (config, issue) = match settings::load_or_create_config(&config_dir) {
            Ok(config) => (config, None),
            Err(e) => {
                tracing::error!("Failed to load config: {}", e);
                (AppConfig::default(), Some(config_issue_from(&e)))
            }
        };
        let mut state = Self::new(config, config_dir)?;
        state.config_issue = issue;
        Ok(state)
    }

    pub fn is_busy(&self) -> bool {
        self.in_operation.is_some()
    }

    /// Marks `operation` as running. Fails with the running one if busy.
    pub fn begin_operation(&mut self, operation: Operation) -> Result<(), Operation> {
        match self.in_operation {
            Some(running) => Err(running),
            None => {
                self.in_operation = Some(operation);
                Ok(())
            }
        }
    }

    pub fn end_operation(&mut self) {
        self.in_operation = None;
    }

    /// Persists the configuration. Failures are logged and returned for the UI.
    ///
    /// Does nothing while a config issue is open so the broken file stays
    /// as the user left it.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        if self.config_issue.is_some() {
            tracing::info!("Not saving config while the settings file is unusable.");
            return Ok(());
        }
        settings::save_config(&self.config, &self.config_dir).inspect_err(|e| {
            tracing::warn!("Failed to save config: {}", e);
        })
    }

    /// Re-executes the step list against the current files.
    pub fn run_pipeline(&mut self) -> &PipelineReport {
        self.last_pipeline = PipelineExecutor::new(&self.registry).run(&mut self.files, self.steps.as_slice());
        &self.last_pipeline
    }

    /// Rebuilds the registry from the built-ins plus the runner files on disk.
    ///
    /// Returns the load error, if any; the built-ins are kept in that case.
    pub fn reload_custom_runners(&mut self) -> Option<String> {
        let builtin = self.registry.builtin_only();
        match load_custom_runners(&runners_directory(&self.config_dir)) {
            Ok(custom) => {
                let (registry, rejected) = builtin.with_custom(custom);
                tracing::info!("Runner registry holds {} runners", registry.len());
                self.registry = registry;
                self.rejected_runners = rejected;
                None
            }
            Err(e) => {
                tracing::error!("Failed to load user-authored runners: {:#}", e);
                self.registry = builtin;
                self.rejected_runners.clear();
                Some(format!("{e:#}"))
            }
        }
    }

    pub fn refresh_flows(&mut self) {
        self.flows = flow::list_flows(&self.config_dir).unwrap_or_else(|e| {
            tracing::warn!("Failed to list flows: {:#}", e);
            Vec::new()
        });
    }

    /// Drops all scanned files.
    pub fn clear_files(&mut self) {
        self.files.clear();
        self.last_pipeline = PipelineReport::default();
    }
}

pub fn config_issue_from(error: &ConfigError) -> ConfigIssue {
    ConfigIssue {
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runner::custom::{encode_rule, save_runner_file, CustomRunnerEntry, CustomRunnerFile};
    use crate::core::runner::{RunnerCategory, Scope};
    use std::fs;
    use tempfile::TempDir;

    fn entry(func: &str) -> CustomRunnerEntry {
        CustomRunnerEntry {
            label: "Mine".to_string(),
            scope: Scope::PerFile,
            params: Vec::new(),
            func: encode_rule(func),
            desc: String::new(),
            enabled: true,
        }
    }

    #[test]
    fn test_load_with_corrupt_config_records_issue() {
        let dir = TempDir::new().unwrap();
        fs::write(settings::get_config_file_path(dir.path()), "nope").unwrap();

        let state = AppState::load(dir.path().to_path_buf()).unwrap();

        assert!(state.config_issue.is_some());
        assert_eq!(state.config, AppConfig::default());
        assert_eq!(fs::read_to_string(settings::get_config_file_path(dir.path())).unwrap(), "nope");
    }

    #[test]
    fn test_save_is_skipped_while_config_issue_is_open() {
        let dir = TempDir::new().unwrap();
        let path = settings::get_config_file_path(dir.path());
        fs::write(&path, "{").unwrap();
        let mut state = AppState::load(dir.path().to_path_buf()).unwrap();

        state.config.recursive_scan = false;
        assert!(state.save_config().is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{");

        state.config_issue = None;
        state.save_config().unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("\"recursive_scan\": false"));
    }

    #[test]
    fn test_first_load_creates_config() {
        let dir = TempDir::new().unwrap();
        let state = AppState::load(dir.path().to_path_buf()).unwrap();
        assert!(state.config_issue.is_none());
        assert!(settings::get_config_file_path(dir.path()).exists());
    }

    #[test]
    fn test_operation_flag_rejects_second_operation() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState::new(AppConfig::default(), dir.path().to_path_buf()).unwrap();
        assert!(state.begin_operation(Operation::Scanning).is_ok());
        assert_eq!(state.begin_operation(Operation::Applying), Err(Operation::Scanning));
        state.end_operation();
        assert!(!state.is_busy());
    }

    #[test]
    fn test_reload_merges_custom_runners() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState::new(AppConfig::default(), dir.path().to_path_buf()).unwrap();
        let builtin_count = state.registry.len();

        let mut file = CustomRunnerFile::new();
        file.insert("only_raw".to_string(), entry(r"\.raw$"));
        file.insert("filter_regex".to_string(), entry("x"));
        save_runner_file(&runners_directory(dir.path()), RunnerCategory::Filter, &file).unwrap();

        assert_eq!(state.reload_custom_runners(), None);
        assert_eq!(state.registry.len(), builtin_count + 1);
        assert_eq!(state.rejected_runners, vec!["filter_regex".to_string()]);

        fs::write(runners_directory(dir.path()).join("filter.json"), "[").unwrap();
        assert!(state.reload_custom_runners().is_some());
        assert_eq!(state.registry.len(), builtin_count);
    }
}
