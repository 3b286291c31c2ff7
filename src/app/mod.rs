//! The WebView application shell: IPC dispatch into the command handlers and
//! delivery of backend events to the frontend.

pub mod commands;
pub mod events;
pub mod file_dialog;
pub mod helpers;
pub mod i18n;
pub mod proxy;
pub mod state;
pub mod tasks;
pub mod view_model;

use std::sync::{Arc, Mutex};
use wry::WebView;

use crate::core::{FileService, LocalFileService};
use events::{IpcMessage, UserEvent};
use file_dialog::{DialogService, NativeDialogService};
use proxy::EventProxy;
use state::AppState;

/// The replaceable side-effecting services the commands depend on.
#[derive(Clone)]
pub struct Services {
    pub dialog: Arc<dyn DialogService>,
    pub files: Arc<dyn FileService>,
}

impl Services {
    /// Native dialogs and the local filesystem.
    pub fn native() -> Self {
        Self {
            dialog: Arc::new(NativeDialogService),
            files: Arc::new(LocalFileService),
        }
    }
}

/// Parses an IPC message from the frontend and dispatches it to a command handler.
pub fn handle_ipc_message<P: EventProxy>(
    message: String,
    services: &Services,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    let msg: IpcMessage = match serde_json::from_str(&message) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!("Failed to parse IPC message: {} ({})", message, e);
            return;
        }
    };
    tracing::debug!("IPC command: {}", msg.command);

    match msg.command.as_str() {
        "initialize" => commands::initialize(proxy, state),
        "addSourceFolder" => {
            commands::add_source_folder(msg.payload, services, proxy, state);
        }
        "removeSourceFolder" => {
            commands::remove_source_folder(msg.payload, services, proxy, state);
        }
        "rescan" => {
            commands::rescan(services, proxy, state);
        }
        "clearSources" => commands::clear_sources(proxy, state),
        "addStep" => commands::add_step(msg.payload, proxy, state),
        "updateStep" => commands::update_step(msg.payload, proxy, state),
        "removeStep" => commands::remove_step(msg.payload, proxy, state),
        "moveStepUp" => commands::move_step_up(msg.payload, proxy, state),
        "moveStepDown" => commands::move_step_down(msg.payload, proxy, state),
        "runPipeline" => commands::run_pipeline(proxy, state),
        "setViewMode" => commands::set_view_mode(msg.payload, proxy, state),
        "applyFiles" => {
            commands::apply_files(services, proxy, state);
        }
        "updateConfig" => {
            commands::update_config(msg.payload, services, proxy, state);
        }
        "saveFlow" => commands::save_flow(msg.payload, proxy, state),
        "loadFlow" => {
            commands::load_flow(msg.payload, services, proxy, state);
        }
        "deleteFlow" => commands::delete_flow(msg.payload, proxy, state),
        "exportFlow" => commands::export_flow(msg.payload, services, proxy, state),
        "importFlow" => {
            commands::import_flow(services, proxy, state);
        }
        "reloadCustomRunners" => commands::reload_custom_runners(proxy, state),
        "readRunnerFile" => commands::read_runner_file(msg.payload, proxy, state),
        "saveRunnerFile" => commands::save_runner_file(msg.payload, proxy, state),
        "resetConfig" => commands::reset_config(proxy, state),
        "openOutputFolder" => commands::open_output_folder(msg.payload, proxy, state),
        "pickOutputFolder" => commands::pick_output_folder(msg.payload, services, proxy, state),
        "exitApp" => commands::exit_app(proxy),
        unknown => tracing::warn!("Received unknown IPC command: {}", unknown),
    }
}

fn to_js<T: serde::Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value)
        .inspect_err(|e| tracing::error!("Failed to serialize event payload: {}", e))
        .ok()
}

/// Forwards a backend event to the frontend by calling its `window.*` hooks.
pub fn handle_user_event(event: UserEvent, webview: &WebView) {
    let script = match event {
        UserEvent::StateUpdate(ui_state) => to_js(&*ui_state).map(|json| format!("window.render({json});")),
        UserEvent::ShowError(msg) => to_js(&msg).map(|json| format!("window.showError({json});")),
        UserEvent::ShowWarning(msg) => to_js(&msg).map(|json| format!("window.showWarning({json});")),
        UserEvent::ShowConfigError(msg) => to_js(&msg).map(|json| format!("window.showConfigError({json});")),
        UserEvent::ApplyProgress(progress) => {
            to_js(&progress).map(|json| format!("window.applyProgress({json});"))
        }
        UserEvent::ApplyComplete { summary, clean } => {
            to_js(&summary).map(|json| format!("window.applyComplete({json}, {clean});"))
        }
        UserEvent::FlowExported(success) => Some(format!("window.flowExported({success});")),
        UserEvent::RunnerFile { category, entries } => to_js(&category)
            .zip(to_js(&entries))
            .map(|(category, entries)| format!("window.showRunnerFile({category}, {entries});")),
        UserEvent::DragStateChanged(is_dragging) => Some(format!("window.setDragState({is_dragging});")),
        // Handled by the event loop itself.
        UserEvent::Exit => None,
    };

    if let Some(script) = script {
        if let Err(e) = webview.evaluate_script(&script) {
            tracing::error!("Failed to evaluate script in WebView: {}", e);
        }
    }
}
