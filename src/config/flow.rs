//! Saved flows: a named step list plus optional transfer settings, one JSON
//! file per flow under `<config dir>/flow/`.

use crate::core::{StepConfig, StepList, TransferMode};
use crate::utils::naming::sanitize_file_name;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const FLOW_DIR: &str = "flow";
const FLOW_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// Settings a flow may carry along; unset values leave the app config alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_mode: Option<TransferMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursive_scan: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<FlowSettings>,
    pub tasks: Vec<StepConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowFile {
    pub info: FlowInfo,
    pub flow: FlowBody,
}

impl FlowFile {
    pub fn new(name: impl Into<String>, desc: Option<String>, steps: &StepList, settings: Option<FlowSettings>) -> Self {
        Self {
            info: FlowInfo {
                name: name.into(),
                desc,
            },
            flow: FlowBody {
                config: settings,
                tasks: steps.as_slice().to_vec(),
            },
        }
    }

    pub fn steps(&self) -> StepList {
        StepList::new(self.flow.tasks.clone())
    }

    /// The same flow with every step under a fresh id.
    pub fn with_new_step_ids(mut self) -> Self {
        self.flow.tasks = self.flow.tasks.iter().map(StepConfig::with_new_id).collect();
        self
    }
}

pub fn flow_directory(config_dir: &Path) -> PathBuf {
    config_dir.join(FLOW_DIR)
}

pub fn flow_file_path(config_dir: &Path, name: &str) -> PathBuf {
    flow_directory(config_dir).join(format!("{}.{FLOW_EXTENSION}", sanitize_file_name(name)))
}

fn read_flow(path: &Path) -> Result<FlowFile> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read flow file {path:?}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse flow file {path:?}"))
}

fn write_flow(flow: &FlowFile, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(flow)?)
        .with_context(|| format!("Failed to write flow file {path:?}"))
}

/// Saves a flow, replacing any flow of the same name. Returns the file path.
pub fn save_flow(config_dir: &Path, flow: &FlowFile) -> Result<PathBuf> {
    let path = flow_file_path(config_dir, &flow.info.name);
    write_flow(flow, &path)?;
    tracing::info!("Saved flow '{}' to {:?}", flow.info.name, path);
    Ok(path)
}

pub fn load_flow(config_dir: &Path, name: &str) -> Result<FlowFile> {
    read_flow(&flow_file_path(config_dir, name))
}

/// Lists the saved flows by name. Unreadable files are skipped with a warning.
pub fn list_flows(config_dir: &Path) -> Result<Vec<FlowInfo>> {
    let dir = flow_directory(config_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut flows = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(FLOW_EXTENSION) {
            continue;
        }
        match read_flow(&path) {
            Ok(flow) => flows.push(flow.info),
            Err(e) => tracing::warn!("Skipping flow file {:?}: {:#}", path, e),
        }
    }
    flows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(flows)
}

pub fn delete_flow(config_dir: &Path, name: &str) -> Result<()> {
    let path = flow_file_path(config_dir, name);
    fs::remove_file(&path).with_context(|| format!("Failed to delete flow file {path:?}"))?;
    tracing::info!("Deleted flow '{}'", name);
    Ok(())
}

pub fn export_flow(flow: &FlowFile, export_path: &Path) -> Result<()> {
    write_flow(flow, export_path)?;
    tracing::info!("Exported flow '{}' to {:?}", flow.info.name, export_path);
    Ok(())
}

/// Reads a flow from an arbitrary file. Step ids are re-issued so an imported
/// flow never shares ids with steps already in the session.
pub fn import_flow(import_path: &Path) -> Result<FlowFile> {
    let flow = read_flow(import_path)?.with_new_step_ids();
    tracing::info!("Imported flow '{}' from {:?}", flow.info.name, import_path);
    Ok(flow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunnerRegistry;
    use tempfile::TempDir;

    fn sample_steps() -> StepList {
        let registry = RunnerRegistry::builtin().unwrap();
        let mut steps = StepList::default();
        steps.add_with("filter_extension", &registry);
        steps.add_with("rename_serial", &registry);
        let id = steps.as_slice()[1].id.clone();
        let mut params = steps.as_slice()[1].params.clone();
        params.insert("start".into(), 7.into());
        steps.update(&id, None, "rename_serial", Some(params), &registry);
        steps
    }

    #[test]
    fn test_save_load_list_delete() {
        let dir = TempDir::new().unwrap();
        let flow = FlowFile::new("Holiday / 2024", Some("photos".into()), &sample_steps(), None);

        let path = save_flow(dir.path(), &flow).unwrap();
        assert_eq!(path.file_name().unwrap(), "Holiday _ 2024.json");
        assert_eq!(load_flow(dir.path(), "Holiday / 2024").unwrap(), flow);

        fs::write(flow_directory(dir.path()).join("broken.json"), "[").unwrap();
        let listed = list_flows(dir.path()).unwrap();
        assert_eq!(listed, vec![flow.info.clone()]);

        delete_flow(dir.path(), "Holiday / 2024").unwrap();
        assert!(list_flows(dir.path()).unwrap().is_empty());
        assert!(delete_flow(dir.path(), "Holiday / 2024").is_err());
    }

    #[test]
    fn test_export_import_keeps_runners_and_params() {
        let dir = TempDir::new().unwrap();
        let settings = FlowSettings {
            transfer_mode: Some(TransferMode::Move),
            recursive_scan: None,
        };
        let flow = FlowFile::new("Export me", None, &sample_steps(), Some(settings));
        let target = dir.path().join("shared").join("export.json");

        export_flow(&flow, &target).unwrap();
        let imported = import_flow(&target).unwrap();

        assert_eq!(imported.info, flow.info);
        assert_eq!(imported.flow.config, flow.flow.config);
        for (before, after) in flow.flow.tasks.iter().zip(&imported.flow.tasks) {
            assert_eq!(before.runner_id, after.runner_id);
            assert_eq!(before.params, after.params);
            assert_ne!(before.id, after.id);
        }
    }

    #[test]
    fn test_minimal_flow_json_is_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("min.json");
        fs::write(
            &path,
            r#"{"info":{"name":"min"},"flow":{"tasks":[{"id":"1","label":"x","runner_id":"default"}]}}"#,
        )
        .unwrap();
        let flow = import_flow(&path).unwrap();
        assert_eq!(flow.info.desc, None);
        assert_eq!(flow.flow.config, None);
        assert!(flow.flow.tasks[0].params.is_empty());
    }
}
