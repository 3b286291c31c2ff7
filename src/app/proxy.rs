//! Defines an abstraction over the event sending mechanism.

use super::events::UserEvent;
use tao::event_loop::EventLoopProxy;

/// Fire-and-forget delivery of `UserEvent`s to the UI thread.
///
/// The production implementation wraps the `tao` proxy; tests use a channel.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: UserEvent);

    fn send_error(&self, message: String) {
        tracing::error!("{}", message);
        self.send_event(UserEvent::ShowError(message));
    }
}

impl EventProxy for EventLoopProxy<UserEvent> {
    fn send_event(&self, event: UserEvent) {
        // Fails only once the event loop is gone.
        if let Err(e) = EventLoopProxy::send_event(self, event) {
            tracing::warn!("Failed to send event to event loop: {}", e);
        }
    }
}
