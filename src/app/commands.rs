//! Contains all the command handlers that are callable from the frontend via IPC.
//!
//! Each function corresponds to one `IpcMessage::command`. Handlers mutate the
//! `AppState`, re-run the pipeline where the result may have changed, and
//! notify the UI. Errors are logged and reported as localized `ShowError`s.

use super::events::UserEvent;
use super::helpers::{lock_state, notify, with_state_and_notify};
use super::i18n::{tr, tr_with};
use super::proxy::EventProxy;
use super::state::{config_issue_from, AppState};
use super::tasks::{start_apply, start_scan};
use super::Services;
use crate::config::flow::{self, FlowFile, FlowSettings};
use crate::config::{settings, AppConfig, CONFIG_VERSION};
use crate::core::runner::custom::{self, runners_directory, CustomRunnerFile};
use crate::core::runner::{BoundParams, RunnerCategory};
use crate::core::{StepList, ViewMode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Deserialize, Default)]
struct PathPayload {
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct SourceFoldersPayload {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    paths: Vec<PathBuf>,
}

#[derive(Deserialize)]
struct IdPayload {
    id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AddStepPayload {
    #[serde(default)]
    runner_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateStepPayload {
    id: String,
    #[serde(default)]
    label: Option<String>,
    runner_id: String,
    #[serde(default)]
    params: Option<BoundParams>,
}

#[derive(Deserialize)]
struct ViewModePayload {
    mode: ViewMode,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveFlowPayload {
    name: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    include_settings: bool,
}

#[derive(Deserialize)]
struct FlowNamePayload {
    name: String,
}

#[derive(Deserialize, Default)]
struct OptionalNamePayload {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RunnerFilePayload {
    category: RunnerCategory,
    #[serde(default)]
    entries: Option<CustomRunnerFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PickOutputPayload {
    step_id: String,
    param_id: String,
}

/// Deserializes a payload, reporting a localized error on failure.
fn parse_payload<T: DeserializeOwned, P: EventProxy>(
    command: &str,
    payload: serde_json::Value,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) -> Option<T> {
    // A missing payload means "no arguments".
    let payload = if payload.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        payload
    };
    match serde_json::from_value(payload) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            let language = lock_state(state).config.language;
            proxy.send_error(tr_with(
                language,
                "error.invalid_payload",
                &[("command", command), ("reason", &e.to_string())],
            ));
            None
        }
    }
}

fn report<P: EventProxy>(state: &AppState, proxy: &P, key: &str, args: &[(&str, &str)]) {
    proxy.send_error(tr_with(state.config.language, key, args));
}

/// Saves the config, reporting failures to the UI.
fn persist_config<P: EventProxy>(state: &AppState, proxy: &P) {
    if let Err(e) = state.save_config() {
        report(state, proxy, "error.config_save", &[("reason", &e.to_string())]);
    }
}

/// Rejects the command if a scan or apply is running.
fn ensure_idle<P: EventProxy>(state: &AppState, proxy: &P) -> bool {
    if state.is_busy() {
        report(state, proxy, "error.busy", &[]);
        return false;
    }
    true
}

/// Handles the initial request for state from the frontend when it loads.
pub fn initialize<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    let state_guard = lock_state(&state);
    notify(&state_guard, &proxy);
    if let Some(issue) = &state_guard.config_issue {
        proxy.send_event(UserEvent::ShowConfigError(tr_with(
            state_guard.config.language,
            "error.config_blocking",
            &[("reason", &issue.message)],
        )));
    }
}

/// Adds source folders, from the payload or a folder dialog, and rescans.
///
/// The payload carries either `path` or `paths`; a dropped file adds the
/// folder containing it.
pub fn add_source_folder<P: EventProxy>(
    payload: serde_json::Value,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    let SourceFoldersPayload { path, mut paths } = parse_payload("addSourceFolder", payload, &proxy, &state)?;
    paths.extend(path);
    if paths.is_empty() {
        let (title, start) = {
            let s = lock_state(&state);
            (
                tr(s.config.language, "dialog.pick_source"),
                s.config.source_folders.last().cloned(),
            )
        };
        match services.dialog.pick_folder(&title, start.as_deref()) {
            Some(path) => paths.push(path),
            None => {
                tracing::info!("User cancelled source folder selection.");
                return None;
            }
        }
    }
    add_source_folders(paths, services, proxy, state)
}

/// Adds all `paths` under one lock and starts a single scan.
///
/// Paths that are not folders are reported and skipped. Nothing is scanned
/// when none of them is usable.
pub fn add_source_folders<P: EventProxy>(
    paths: Vec<PathBuf>,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    {
        let mut s = lock_state(&state);
        if !ensure_idle(&s, &proxy) {
            return None;
        }
        let mut usable = 0;
        let mut added = false;
        for path in paths {
            let folder = if path.is_file() {
                path.parent().map(PathBuf::from).unwrap_or(path)
            } else {
                path
            };
            if !folder.is_dir() {
                let shown = folder.display().to_string();
                report(&s, &proxy, "error.not_a_directory", &[("path", &shown)]);
                continue;
            }
            usable += 1;
            if s.config.source_folders.contains(&folder) {
                tracing::info!("Source folder {:?} is already selected", folder);
            } else {
                tracing::info!("Adding source folder {:?}", folder);
                s.config.source_folders.push(folder);
                added = true;
            }
        }
        if added {
            persist_config(&s, &proxy);
        }
        if usable == 0 {
            return None;
        }
    }
    start_scan(services.files.clone(), proxy, state)
}

pub fn remove_source_folder<P: EventProxy>(
    payload: serde_json::Value,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    let PathPayload { path } = parse_payload("removeSourceFolder", payload, &proxy, &state)?;
    let path = path?;
    let remaining = {
        let mut s = lock_state(&state);
        if !ensure_idle(&s, &proxy) {
            return None;
        }
        s.config.source_folders.retain(|f| f != &path);
        persist_config(&s, &proxy);
        s.config.source_folders.len()
    };
    if remaining == 0 {
        with_state_and_notify(&state, &proxy, AppState::clear_files);
        return None;
    }
    start_scan(services.files.clone(), proxy, state)
}

/// Re-reads all source folders.
pub fn rescan<P: EventProxy>(services: &Services, proxy: P, state: Arc<Mutex<AppState>>) -> Option<JoinHandle<()>> {
    let has_folders = {
        let s = lock_state(&state);
        if !ensure_idle(&s, &proxy) {
            return None;
        }
        !s.config.source_folders.is_empty()
    };
    if !has_folders {
        with_state_and_notify(&state, &proxy, AppState::clear_files);
        return None;
    }
    start_scan(services.files.clone(), proxy, state)
}

pub fn clear_sources<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        if !ensure_idle(s, &proxy) {
            return;
        }
        s.config.source_folders.clear();
        s.clear_files();
        persist_config(s, &proxy);
    });
}

/// Appends a step, bound to the default runner unless `runnerId` is given.
pub fn add_step<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    let Some(AddStepPayload { runner_id }) = parse_payload("addStep", payload, &proxy, &state) else {
        return;
    };
    with_state_and_notify(&state, &proxy, |s| {
        let added = match &runner_id {
            None => Some(s.steps.add(&s.registry).id.clone()),
            Some(id) => s.steps.add_with(id, &s.registry).map(|step| step.id.clone()),
        };
        match added {
            Some(step_id) => {
                tracing::info!("Added step {}", step_id);
                s.run_pipeline();
            }
            None => {
                let id = runner_id.unwrap_or_default();
                report(s, &proxy, "error.unknown_runner", &[("id", &id)]);
            }
        }
    });
}

pub fn update_step<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    let Some(update) = parse_payload::<UpdateStepPayload, _>("updateStep", payload, &proxy, &state) else {
        return;
    };
    with_state_and_notify(&state, &proxy, |s| {
        if s.registry.get(&update.runner_id).is_none() {
            report(s, &proxy, "error.unknown_runner", &[("id", &update.runner_id)]);
            return;
        }
        if s
            .steps
            .update(&update.id, update.label, &update.runner_id, update.params, &s.registry)
        {
            s.run_pipeline();
        } else {
            report(s, &proxy, "error.unknown_step", &[]);
        }
    });
}

fn edit_step<P, F>(command: &str, payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>, edit: F)
where
    P: EventProxy,
    F: FnOnce(&mut StepList, &str) -> bool,
{
    let Some(IdPayload { id }) = parse_payload(command, payload, &proxy, &state) else {
        return;
    };
    with_state_and_notify(&state, &proxy, |s| {
        if s.steps.get(&id).is_none() {
            report(s, &proxy, "error.unknown_step", &[]);
        } else if edit(&mut s.steps, &id) {
            s.run_pipeline();
        }
    });
}

pub fn remove_step<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    edit_step("removeStep", payload, proxy, state, |steps, id| steps.remove(id).is_some());
}

pub fn move_step_up<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    edit_step("moveStepUp", payload, proxy, state, StepList::move_up);
}

pub fn move_step_down<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    edit_step("moveStepDown", payload, proxy, state, StepList::move_down);
}

pub fn run_pipeline<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        s.run_pipeline();
    });
}

pub fn set_view_mode<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    if let Some(ViewModePayload { mode }) = parse_payload("setViewMode", payload, &proxy, &state) {
        with_state_and_notify(&state, &proxy, |s| s.view_mode = mode);
    }
}

pub fn apply_files<P: EventProxy>(services: &Services, proxy: P, state: Arc<Mutex<AppState>>) -> Option<JoinHandle<()>> {
    start_apply(services.files.clone(), proxy, state)
}

/// Replaces the configuration and persists it.
///
/// Source folders are managed by their own commands and kept. Changing how
/// folders are scanned triggers a rescan.
pub fn update_config<P: EventProxy>(
    payload: serde_json::Value,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    let mut new_config: AppConfig = parse_payload("updateConfig", payload, &proxy, &state)?;
    let needs_rescan = {
        let mut s = lock_state(&state);
        if !ensure_idle(&s, &proxy) {
            return None;
        }
        new_config.version = CONFIG_VERSION.to_string();
        new_config.source_folders = s.config.source_folders.clone();
        let needs_rescan = new_config.recursive_scan != s.config.recursive_scan
            || new_config.ignore_patterns != s.config.ignore_patterns
            || new_config.max_file_count != s.config.max_file_count;
        s.config = new_config;
        persist_config(&s, &proxy);
        notify(&s, &proxy);
        needs_rescan && !s.config.source_folders.is_empty()
    };
    if needs_rescan {
        tracing::info!("Scan settings changed, rescanning.");
        return start_scan(services.files.clone(), proxy, state);
    }
    None
}

/// Applies a loaded flow: its steps replace the current ones and its
/// settings, if any, override the config. Returns whether a rescan is needed.
fn adopt_flow<P: EventProxy>(s: &mut AppState, proxy: &P, flow: FlowFile) -> bool {
    let mut needs_rescan = false;
    if let Some(settings) = &flow.flow.config {
        if let Some(mode) = settings.transfer_mode {
            s.config.transfer_mode = mode;
        }
        if let Some(recursive) = settings.recursive_scan {
            needs_rescan = recursive != s.config.recursive_scan;
            s.config.recursive_scan = recursive;
        }
        persist_config(s, proxy);
    }
    s.steps = flow.steps();
    s.current_flow = Some(flow.info.name);
    s.run_pipeline();
    needs_rescan && !s.config.source_folders.is_empty()
}

pub fn save_flow<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    let Some(request) = parse_payload::<SaveFlowPayload, _>("saveFlow", payload, &proxy, &state) else {
        return;
    };
    with_state_and_notify(&state, &proxy, |s| {
        let settings = request.include_settings.then(|| FlowSettings {
            transfer_mode: Some(s.config.transfer_mode),
            recursive_scan: Some(s.config.recursive_scan),
        });
        let flow = FlowFile::new(request.name, request.desc, &s.steps, settings);
        match flow::save_flow(&s.config_dir, &flow) {
            Ok(_) => {
                s.current_flow = Some(flow.info.name);
                s.refresh_flows();
            }
            Err(e) => report(s, &proxy, "error.flow", &[("reason", &format!("{e:#}"))]),
        }
    });
}

pub fn load_flow<P: EventProxy>(
    payload: serde_json::Value,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    let FlowNamePayload { name } = parse_payload("loadFlow", payload, &proxy, &state)?;
    let needs_rescan = with_state_and_notify(&state, &proxy, |s| {
        if !ensure_idle(s, &proxy) {
            return false;
        }
        match flow::load_flow(&s.config_dir, &name) {
            Ok(flow) => adopt_flow(s, &proxy, flow),
            Err(e) => {
                report(s, &proxy, "error.flow", &[("reason", &format!("{e:#}"))]);
                false
            }
        }
    });
    if needs_rescan {
        return start_scan(services.files.clone(), proxy, state);
    }
    None
}

pub fn delete_flow<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    let Some(FlowNamePayload { name }) = parse_payload("deleteFlow", payload, &proxy, &state) else {
        return;
    };
    with_state_and_notify(&state, &proxy, |s| {
        if let Err(e) = flow::delete_flow(&s.config_dir, &name) {
            report(s, &proxy, "error.flow", &[("reason", &format!("{e:#}"))]);
        }
        if s.current_flow.as_deref() == Some(name.as_str()) {
            s.current_flow = None;
        }
        s.refresh_flows();
    });
}

/// Exports the current steps and transfer settings to a user-chosen file.
pub fn export_flow<P: EventProxy>(
    payload: serde_json::Value,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let Some(OptionalNamePayload { name }) = parse_payload("exportFlow", payload, &proxy, &state) else {
        return;
    };
    let flow = {
        let s = lock_state(&state);
        let name = name
            .or_else(|| s.current_flow.clone())
            .unwrap_or_else(|| "flow".to_string());
        let settings = FlowSettings {
            transfer_mode: Some(s.config.transfer_mode),
            recursive_scan: Some(s.config.recursive_scan),
        };
        FlowFile::new(name, None, &s.steps, Some(settings))
    };
    let Some(path) = services.dialog.export_flow_path(&flow.info.name) else {
        tracing::info!("User cancelled flow export.");
        return;
    };
    match flow::export_flow(&flow, &path) {
        Ok(()) => proxy.send_event(UserEvent::FlowExported(true)),
        Err(e) => {
            tracing::error!("Failed to export flow: {:#}", e);
            proxy.send_event(UserEvent::FlowExported(false));
        }
    }
}

/// Imports a flow file into the flow library and makes it the active flow.
pub fn import_flow<P: EventProxy>(
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    let Some(path) = services.dialog.pick_flow_to_import() else {
        tracing::info!("User cancelled flow import.");
        return None;
    };
    let needs_rescan = with_state_and_notify(&state, &proxy, |s| {
        if !ensure_idle(s, &proxy) {
            return false;
        }
        let imported = flow::import_flow(&path).and_then(|flow| {
            flow::save_flow(&s.config_dir, &flow)?;
            Ok(flow)
        });
        match imported {
            Ok(flow) => {
                s.refresh_flows();
                adopt_flow(s, &proxy, flow)
            }
            Err(e) => {
                report(s, &proxy, "error.flow", &[("reason", &format!("{e:#}"))]);
                false
            }
        }
    });
    if needs_rescan {
        return start_scan(services.files.clone(), proxy, state);
    }
    None
}

pub fn reload_custom_runners<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        if let Some(reason) = s.reload_custom_runners() {
            report(s, &proxy, "error.custom_runners", &[("reason", &reason)]);
        }
        s.run_pipeline();
    });
}

/// Sends the stored entries of one user runner file to the editor.
pub fn read_runner_file<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    let Some(RunnerFilePayload { category, .. }) = parse_payload("readRunnerFile", payload, &proxy, &state) else {
        return;
    };
    let s = lock_state(&state);
    match custom::read_runner_file(&runners_directory(&s.config_dir), category) {
        Ok(entries) => proxy.send_event(UserEvent::RunnerFile { category, entries }),
        Err(e) => report(&s, &proxy, "error.custom_runners", &[("reason", &format!("{e:#}"))]),
    }
}

/// Replaces one user runner file, then reloads the registry and reruns the pipeline.
///
/// Entries whose rule does not validate are still written; they show up as
/// invalid runners after the reload.
pub fn save_runner_file<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    let Some(RunnerFilePayload { category, entries }) = parse_payload("saveRunnerFile", payload, &proxy, &state)
    else {
        return;
    };
    with_state_and_notify(&state, &proxy, |s| {
        let dir = runners_directory(&s.config_dir);
        if let Err(e) = custom::save_runner_file(&dir, category, &entries.unwrap_or_default()) {
            report(s, &proxy, "error.custom_runners", &[("reason", &format!("{e:#}"))]);
            return;
        }
        if let Some(reason) = s.reload_custom_runners() {
            report(s, &proxy, "error.custom_runners", &[("reason", &reason)]);
        }
        s.run_pipeline();
    });
}

/// Overwrites the settings file with the defaults, resolving a config issue.
pub fn reset_config<P: EventProxy>(proxy: P, state: Arc<Mutex<AppState>>) {
    with_state_and_notify(&state, &proxy, |s| {
        if !ensure_idle(s, &proxy) {
            return;
        }
        match settings::reset_config(&s.config_dir) {
            Ok(config) => {
                tracing::info!("Configuration reset to defaults.");
                s.config = config;
                s.config_issue = None;
                s.clear_files();
            }
            Err(e) => {
                tracing::error!("Failed to reset config: {}", e);
                s.config_issue = Some(config_issue_from(&e));
                report(s, &proxy, "error.config_save", &[("reason", &e.to_string())]);
            }
        }
    });
}

pub fn exit_app<P: EventProxy>(proxy: P) {
    tracing::info!("Exit requested by the UI.");
    proxy.send_event(UserEvent::Exit);
}

/// Opens a folder in the system file manager, by default the last output folder.
pub fn open_output_folder<P: EventProxy>(payload: serde_json::Value, proxy: P, state: Arc<Mutex<AppState>>) {
    let Some(PathPayload { path }) = parse_payload("openOutputFolder", payload, &proxy, &state) else {
        return;
    };
    let s = lock_state(&state);
    let Some(folder) = path.or_else(|| s.config.last_output_directory.clone()) else {
        return;
    };
    if let Err(e) = open::that(&folder) {
        let shown = folder.display().to_string();
        report(&s, &proxy, "error.open_folder", &[("path", &shown), ("reason", &e.to_string())]);
    }
}

/// Lets the user choose a folder for a step's folder parameter.
pub fn pick_output_folder<P: EventProxy>(
    payload: serde_json::Value,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let Some(request) = parse_payload::<PickOutputPayload, _>("pickOutputFolder", payload, &proxy, &state) else {
        return;
    };
    let (title, start) = {
        let s = lock_state(&state);
        (
            tr(s.config.language, "dialog.pick_output"),
            s.config.last_output_directory.clone(),
        )
    };
    let Some(folder) = services.dialog.pick_folder(&title, start.as_deref()) else {
        tracing::info!("User cancelled output folder selection.");
        return;
    };

    with_state_and_notify(&state, &proxy, |s| {
        let Some(step) = s.steps.get(&request.step_id).cloned() else {
            report(s, &proxy, "error.unknown_step", &[]);
            return;
        };
        let mut params = step.params;
        params.insert(request.param_id, folder.to_string_lossy().to_string().into());
        s.steps
            .update(&step.id, None, &step.runner_id, Some(params), &s.registry);
        s.config.last_output_directory = Some(folder);
        persist_config(s, &proxy);
        s.run_pipeline();
    });
}
