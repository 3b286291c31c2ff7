//! Integration tests for Bulk Flow Renamer.
//!
//! These drive the IPC entry point the frontend uses and observe the events
//! sent back, against real folders in temporary directories.

use bulk_flow_renamer::app::{
    self, events::UserEvent, file_dialog::DialogService, proxy::EventProxy, state::AppState, Services,
};
use bulk_flow_renamer::config::AppConfig;
use bulk_flow_renamer::utils::test_helpers::{setup_test_logging, write_tree};
use bulk_flow_renamer::core::{FileFate, LocalFileService, StepConfig, StepList, TransferMode};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Contains the test infrastructure.
mod helpers {
    use super::*;
    use std::fs;

    /// A test double for the `EventLoopProxy` using a tokio MPSC channel.
    #[derive(Clone)]
    pub struct TestEventProxy {
        pub sender: mpsc::UnboundedSender<UserEvent>,
    }

    impl EventProxy for TestEventProxy {
        fn send_event(&self, event: UserEvent) {
            if let Err(e) = self.sender.send(event) {
                panic!("Test receiver dropped: {}", e);
            }
        }
    }

    /// Dialogs are never expected in these tests.
    pub struct NoDialogs;

    impl DialogService for NoDialogs {
        fn pick_folder(&self, _title: &str, _start_dir: Option<&Path>) -> Option<PathBuf> {
            None
        }
        fn pick_flow_to_import(&self) -> Option<PathBuf> {
            None
        }
        fn export_flow_path(&self, _name: &str) -> Option<PathBuf> {
            None
        }
    }

    /// `TestHarness` sets up a complete, isolated environment for each test case.
    pub struct TestHarness {
        pub state: Arc<Mutex<AppState>>,
        pub proxy: TestEventProxy,
        pub event_rx: mpsc::UnboundedReceiver<UserEvent>,
        pub services: Services,
        pub source: PathBuf,
        pub output: PathBuf,
        pub config_dir: PathBuf,
        _temp_dir: TempDir,
    }

    impl TestHarness {
        pub fn new() -> Self {
            setup_test_logging();
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let source = temp_dir.path().join("source");
            let output = temp_dir.path().join("output");
            let config_dir = temp_dir.path().join("config");
            fs::create_dir_all(&source).unwrap();
            let (event_tx, event_rx) = mpsc::unbounded_channel();

            let config = AppConfig {
                last_output_directory: None,
                ..AppConfig::default()
            };
            let state = AppState::new(config, config_dir.clone()).expect("registry");

            Self {
                state: Arc::new(Mutex::new(state)),
                proxy: TestEventProxy { sender: event_tx },
                event_rx,
                services: Services {
                    dialog: Arc::new(NoDialogs),
                    files: Arc::new(LocalFileService),
                },
                source,
                output,
                config_dir,
                _temp_dir: temp_dir,
            }
        }

        pub fn create_file(&self, relative_path: &str, content: &str) {
            write_tree(&self.source, &[(relative_path, content)]).unwrap();
        }

        pub fn send(&self, command: &str, payload: serde_json::Value) {
            let message = serde_json::json!({ "command": command, "payload": payload }).to_string();
            app::handle_ipc_message(message, &self.services, self.proxy.clone(), self.state.clone());
        }

        /// Waits until an event matching `predicate` arrives, returning it.
        pub async fn wait_for<F>(&mut self, mut predicate: F) -> UserEvent
        where
            F: FnMut(&UserEvent) -> bool,
        {
            let deadline = Duration::from_secs(10);
            tokio::time::timeout(deadline, async {
                loop {
                    let event = self.event_rx.recv().await.expect("channel closed");
                    if predicate(&event) {
                        return event;
                    }
                }
            })
            .await
            .expect("Timed out waiting for event")
        }

        /// Waits for the state update that follows the end of a scan.
        pub async fn wait_for_scan(&mut self) {
            self.wait_for(|e| matches!(e, UserEvent::StateUpdate(ui) if ui.in_operation.is_none() && !ui.files.is_empty()))
                .await;
        }

        pub async fn wait_for_apply(&mut self) -> (String, bool) {
            match self.wait_for(|e| matches!(e, UserEvent::ApplyComplete { .. })).await {
                UserEvent::ApplyComplete { summary, clean } => (summary, clean),
                _ => unreachable!(),
            }
        }

        pub fn step_id(&self, index: usize) -> String {
            self.state.lock().unwrap().steps.as_slice()[index].id.clone()
        }

        /// Adds a step for `runner_id` and binds `params` to it.
        pub fn add_step(&self, runner_id: &str, params: serde_json::Value) -> String {
            self.send("addStep", serde_json::json!({ "runnerId": runner_id }));
            let index = self.state.lock().unwrap().steps.len() - 1;
            let id = self.step_id(index);
            self.send(
                "updateStep",
                serde_json::json!({ "id": id, "runnerId": runner_id, "params": params }),
            );
            id
        }
    }
}

use helpers::TestHarness;

#[tokio::test]
async fn test_scan_filter_rename_and_copy() {
    let mut harness = TestHarness::new();
    harness.create_file("holiday.jpg", "1");
    harness.create_file("notes.txt", "2");
    harness.create_file("nested/beach.JPG", "3");

    harness.send("addSourceFolder", serde_json::json!({ "path": harness.source }));
    harness.wait_for_scan().await;

    harness.add_step("filter_extension", serde_json::json!({ "extensions": "jpg" }));
    harness.add_step("rename_prefix", serde_json::json!({ "text": "2024_" }));
    harness.add_step(
        "output_path",
        serde_json::json!({ "output_path": harness.output.to_string_lossy() }),
    );

    {
        let state = harness.state.lock().unwrap();
        assert_eq!(state.files.len(), 3);
        let routed: Vec<_> = state
            .files
            .iter()
            .filter(|f| matches!(f.fate(), FileFate::Output(_)))
            .map(|f| f.working_file_name())
            .collect();
        assert_eq!(routed.len(), 2, "{routed:?}");
        let notes = state.files.iter().find(|f| f.original_file_name() == "notes.txt").unwrap();
        assert_eq!(notes.fate(), FileFate::Filtered);
    }

    harness.send("applyFiles", serde_json::Value::Null);
    let (summary, clean) = harness.wait_for_apply().await;

    assert!(clean, "{summary}");
    assert!(summary.starts_with("Copied 2 files"), "{summary}");
    assert!(harness.output.join("2024_holiday.jpg").exists());
    assert!(harness.output.join("2024_beach.JPG").exists());
    assert!(harness.source.join("holiday.jpg").exists());
}

#[tokio::test]
async fn test_move_mode_removes_moved_files_from_list() {
    let mut harness = TestHarness::new();
    harness.create_file("a.txt", "a");
    harness.create_file("b.txt", "b");
    harness.state.lock().unwrap().config.transfer_mode = TransferMode::Move;

    harness.send("addSourceFolder", serde_json::json!({ "path": harness.source }));
    harness.wait_for_scan().await;
    harness.add_step("filter_contains", serde_json::json!({ "text": "a" }));
    harness.add_step(
        "output_path",
        serde_json::json!({ "output_path": harness.output.to_string_lossy() }),
    );

    harness.send("applyFiles", serde_json::Value::Null);
    let (summary, clean) = harness.wait_for_apply().await;

    assert!(clean, "{summary}");
    assert!(summary.starts_with("Moved 1 files"), "{summary}");
    assert!(harness.output.join("a.txt").exists());
    assert!(!harness.source.join("a.txt").exists());
    let state = harness.state.lock().unwrap();
    assert_eq!(state.files.len(), 1);
    assert_eq!(state.files[0].original_file_name(), "b.txt");
    assert!(state.in_operation.is_none());
}

#[tokio::test]
async fn test_several_folders_in_one_request_are_all_kept() {
    let mut harness = TestHarness::new();
    harness.create_file("photos/a.jpg", "a");
    harness.create_file("scans/b.jpg", "b");
    let folders = vec![harness.source.join("photos"), harness.source.join("scans")];

    harness.send("addSourceFolder", serde_json::json!({ "paths": folders }));
    harness.wait_for_scan().await;

    let state = harness.state.lock().unwrap();
    assert_eq!(state.config.source_folders, folders);
    assert_eq!(state.files.len(), 2);
    assert!(state.in_operation.is_none());
}

#[tokio::test]
async fn test_existing_destination_is_reported_and_kept() {
    let mut harness = TestHarness::new();
    harness.create_file("a.txt", "new");
    std::fs::create_dir_all(&harness.output).unwrap();
    std::fs::write(harness.output.join("a.txt"), "old").unwrap();

    harness.send("addSourceFolder", serde_json::json!({ "path": harness.source }));
    harness.wait_for_scan().await;
    harness.add_step(
        "output_path",
        serde_json::json!({ "output_path": harness.output.to_string_lossy() }),
    );
    harness.send("applyFiles", serde_json::Value::Null);
    let (summary, clean) = harness.wait_for_apply().await;

    assert!(!clean);
    assert!(summary.contains("1 failed"), "{summary}");
    assert_eq!(std::fs::read_to_string(harness.output.join("a.txt")).unwrap(), "old");
}

#[tokio::test]
async fn test_apply_without_routed_files_is_rejected() {
    let mut harness = TestHarness::new();
    harness.create_file("a.txt", "a");
    harness.send("addSourceFolder", serde_json::json!({ "path": harness.source }));
    harness.wait_for_scan().await;

    harness.send("applyFiles", serde_json::Value::Null);
    let event = harness.wait_for(|e| matches!(e, UserEvent::ShowError(_))).await;

    assert!(matches!(event, UserEvent::ShowError(msg) if msg == "No file reached an output step."));
    assert!(!harness.state.lock().unwrap().is_busy());
}

#[tokio::test]
async fn test_ignore_patterns_and_non_recursive_scan() {
    let mut harness = TestHarness::new();
    harness.create_file("keep.txt", "1");
    harness.create_file("scratch.tmp", "2");
    harness.create_file(".git/config", "3");
    harness.create_file("sub/deep.txt", "4");

    harness.send("addSourceFolder", serde_json::json!({ "path": harness.source }));
    harness.wait_for_scan().await;
    {
        let state = harness.state.lock().unwrap();
        let mut names: Vec<_> = state.files.iter().map(|f| f.original_file_name()).collect();
        names.sort();
        assert_eq!(names, vec!["deep.txt", "keep.txt"]);
    }

    let mut config = harness.state.lock().unwrap().config.clone();
    config.recursive_scan = false;
    harness.send("updateConfig", serde_json::to_value(&config).unwrap());
    harness
        .wait_for(|e| matches!(e, UserEvent::StateUpdate(ui) if ui.in_operation.is_none() && ui.files.len() == 1))
        .await;

    let state = harness.state.lock().unwrap();
    let names: Vec<_> = state.files.iter().map(|f| f.original_file_name()).collect();
    assert_eq!(names, vec!["keep.txt"]);
}

#[tokio::test]
async fn test_flow_survives_restart() {
    let mut harness = TestHarness::new();
    harness.add_step("rename_case", serde_json::json!({ "mode": "upper" }));
    harness.send("saveFlow", serde_json::json!({ "name": "Shout", "includeSettings": true }));
    while harness.event_rx.try_recv().is_ok() {}

    let reloaded = AppState::load(harness.config_dir.clone()).unwrap();
    assert_eq!(reloaded.flows.len(), 1);
    assert_eq!(reloaded.flows[0].name, "Shout");

    harness.state.lock().unwrap().steps.clear();
    harness.send("loadFlow", serde_json::json!({ "name": "Shout" }));
    let state = harness.state.lock().unwrap();
    assert_eq!(state.steps.len(), 1);
    assert_eq!(state.steps.as_slice()[0].runner_id, "rename_case");
    assert_eq!(state.current_flow.as_deref(), Some("Shout"));
}

#[tokio::test]
async fn test_unknown_runner_step_is_skipped_and_flagged() {
    let mut harness = TestHarness::new();
    harness.create_file("a.txt", "a");
    harness.send("addSourceFolder", serde_json::json!({ "path": harness.source }));
    harness.wait_for_scan().await;

    harness.add_step("rename_suffix", serde_json::json!({ "text": "_x" }));
    let id = harness.step_id(0);
    // Simulates a flow referencing a runner that was removed since.
    {
        let mut state = harness.state.lock().unwrap();
        let suffix = state.steps.get(&id).cloned().unwrap();
        state.steps = StepList::new(vec![
            StepConfig::new("Gone", "deleted_runner", Default::default()),
            suffix,
        ]);
    }
    harness.send("runPipeline", serde_json::Value::Null);

    let event = harness
        .wait_for(|e| matches!(e, UserEvent::StateUpdate(ui) if ui.steps.len() == 2))
        .await;
    let UserEvent::StateUpdate(ui) = event else { unreachable!() };
    assert!(ui.steps[0].issue.is_some());
    assert!(ui.steps[1].issue.is_none());
    assert_eq!(ui.files[0].working_name, "a_x.txt");
}
