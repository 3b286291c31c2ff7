//! Defines the event and message structures for communication between the backend and frontend.

use serde::Deserialize;

use super::view_model::UiState;
use crate::core::runner::custom::CustomRunnerFile;
use crate::core::runner::RunnerCategory;
use crate::core::ApplyProgress;

/// Events sent from the Rust backend to the WebView (UI thread).
///
/// Each variant except `Exit` corresponds to a `window.*` function in the frontend.
#[derive(Debug)]
pub enum UserEvent {
    /// A complete state update to re-render the UI.
    StateUpdate(Box<UiState>),
    /// An error message to be displayed to the user.
    ShowError(String),
    /// A non-blocking notice, e.g. a large scan.
    ShowWarning(String),
    /// The settings file is unusable; the UI offers reset or exit.
    ShowConfigError(String),
    ApplyProgress(ApplyProgress),
    ApplyComplete { summary: String, clean: bool },
    /// The result of a flow export.
    FlowExported(bool),
    /// The stored entries of one user runner file, for editing.
    RunnerFile {
        category: RunnerCategory,
        entries: CustomRunnerFile,
    },
    /// Indicates that a file is being dragged over the window.
    DragStateChanged(bool),
    /// Ends the event loop.
    Exit,
}

/// A message received from the WebView via the IPC channel.
#[derive(Deserialize, Debug)]
pub struct IpcMessage {
    /// The name of the command to execute.
    pub command: String,
    /// The payload associated with the command, as a JSON value.
    #[serde(default)]
    pub payload: serde_json::Value,
}
