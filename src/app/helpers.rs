//! Contains helper functions to reduce boilerplate code in other `app` modules.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::events::UserEvent;
use super::proxy::EventProxy;
use super::state::AppState;
use super::view_model::generate_ui_state;

/// Locks the state. A panic in another holder does not leave the state
/// half-written, so a poisoned lock is recovered.
pub fn lock_state(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn notify<P: EventProxy>(state: &AppState, proxy: &P) {
    proxy.send_event(UserEvent::StateUpdate(Box::new(generate_ui_state(state))));
}

/// Locks the `AppState`, performs a mutation and then sends a `StateUpdate`
/// event to the UI.
pub fn with_state_and_notify<F, R, P: EventProxy>(
    state: &Arc<Mutex<AppState>>,
    proxy: &P,
    update_fn: F,
) -> R
where
    F: FnOnce(&mut AppState) -> R,
{
    let mut state_guard = lock_state(state);
    let result = update_fn(&mut state_guard);
    notify(&state_guard, proxy);
    result
}
