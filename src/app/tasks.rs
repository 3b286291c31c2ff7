//! The long-running operations: scanning source folders and applying results.
//!
//! Both run as `tokio` tasks guarded by `AppState::in_operation`. The state
//! lock is never held across an `.await`.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use super::events::UserEvent;
use super::helpers::{lock_state, notify};
use super::i18n::{tr, tr_with};
use super::proxy::EventProxy;
use super::state::{AppState, Operation};
use crate::core::{apply, classify, CoreError, FileRecord, FileService, TransferMode, ViewMode};

fn busy_error<P: EventProxy>(state: &AppState, proxy: &P, running: Operation) {
    tracing::warn!("Rejected new operation while {:?} is running", running);
    proxy.send_error(tr(state.config.language, "error.busy"));
}

/// Re-reads all source folders, replacing the file list, then re-runs the pipeline.
///
/// Returns `None` if another operation is running.
pub fn start_scan<P: EventProxy>(
    files_service: Arc<dyn FileService>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    let (folders, config) = {
        let mut state_guard = lock_state(&state);
        if let Err(running) = state_guard.begin_operation(Operation::Scanning) {
            busy_error(&state_guard, &proxy, running);
            return None;
        }
        state_guard.status_message = tr(state_guard.config.language, "status.scanning");
        notify(&state_guard, &proxy);
        (state_guard.config.source_folders.clone(), state_guard.config.clone())
    };

    Some(tokio::spawn(async move {
        tracing::info!("Scanning {} source folders", folders.len());
        let mut all_files: Vec<FileRecord> = Vec::new();
        let mut failure: Option<CoreError> = None;
        for folder in &folders {
            match files_service.list_files(folder, &config.scan_options(all_files.len())).await {
                Ok(files) => all_files.extend(files),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let mut state_guard = lock_state(&state);
        state_guard.end_operation();
        let language = state_guard.config.language;

        if let Some(error) = failure {
            tracing::error!("Scan failed: {}", error);
            let message = match &error {
                CoreError::LimitExceeded { limit } => {
                    tr_with(language, "error.limit_exceeded", &[("limit", &limit.to_string())])
                }
                other => tr_with(language, "error.scan_failed", &[("reason", &other.to_string())]),
            };
            state_guard.clear_files();
            state_guard.status_message = message.clone();
            notify(&state_guard, &proxy);
            proxy.send_event(UserEvent::ShowError(message));
            return;
        }

        let count = all_files.len();
        if count > state_guard.config.warn_file_count {
            let threshold = state_guard.config.warn_file_count.to_string();
            proxy.send_event(UserEvent::ShowWarning(tr_with(
                language,
                "warn.many_files",
                &[("count", &count.to_string()), ("threshold", &threshold)],
            )));
        }
        state_guard.files = all_files;
        state_guard.run_pipeline();
        state_guard.status_message = tr_with(language, "status.scanned", &[("count", &count.to_string())]);
        notify(&state_guard, &proxy);
    }))
}

/// Copies or moves every file that reached an output step.
///
/// Returns `None` if another operation is running or nothing is routed.
pub fn start_apply<P: EventProxy>(
    files_service: Arc<dyn FileService>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) -> Option<JoinHandle<()>> {
    let (routed, mode) = {
        let mut state_guard = lock_state(&state);
        if let Err(running) = state_guard.begin_operation(Operation::Applying) {
            busy_error(&state_guard, &proxy, running);
            return None;
        }
        let routed: Vec<FileRecord> = classify(&state_guard.files, ViewMode::ReachedOutput)
            .into_iter()
            .cloned()
            .collect();
        if routed.is_empty() {
            state_guard.end_operation();
            proxy.send_error(tr(state_guard.config.language, "error.nothing_to_apply"));
            return None;
        }
        state_guard.status_message = tr(state_guard.config.language, "status.applying");
        notify(&state_guard, &proxy);
        (routed, state_guard.config.transfer_mode)
    };

    Some(tokio::spawn(async move {
        let progress_proxy = proxy.clone();
        let report = apply(&*files_service, &routed, mode, move |progress| {
            progress_proxy.send_event(UserEvent::ApplyProgress(progress));
        })
        .await;

        let open_target: Option<PathBuf> = report
            .succeeded
            .first()
            .and_then(|f| f.destination.parent().map(PathBuf::from));

        let mut state_guard = lock_state(&state);
        state_guard.end_operation();
        if mode == TransferMode::Move {
            // Moved files are gone from their source folders.
            let moved: HashSet<&PathBuf> =
                report.succeeded.iter().map(|f| &f.source).collect();
            state_guard.files.retain(|f| !moved.contains(&f.original_path));
            state_guard.run_pipeline();
        }
        let summary = report.summary(5);
        let clean = report.is_clean();
        state_guard.status_message = summary.lines().next().unwrap_or_default().to_string();
        let open_after = state_guard.config.open_output_after_apply;
        state_guard.last_apply = Some(report);
        notify(&state_guard, &proxy);
        drop(state_guard);

        proxy.send_event(UserEvent::ApplyComplete { summary, clean });
        if let (true, Some(folder)) = (open_after, open_target) {
            if let Err(e) = open::that(&folder) {
                tracing::warn!("Failed to open output folder {:?}: {}", folder, e);
            }
        }
    }))
}
