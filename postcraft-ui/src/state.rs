//! Shared application state for the UI server.

use std::sync::Arc;

use postcraft::{WorkflowController, WorkflowEvent};
use tokio::sync::{Mutex, MutexGuard, broadcast};

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single workflow this server drives. Held for the whole duration of
    /// an action, including its service call.
    controller: Arc<Mutex<WorkflowController>>,
    /// Controller notifications, forwarded to SSE clients.
    pub event_tx: broadcast::Sender<WorkflowEvent>,
}

impl AppState {
    pub fn new(controller: WorkflowController) -> Self {
        let event_tx = controller.event_sender();
        Self {
            controller: Arc::new(Mutex::new(controller)),
            event_tx,
        }
    }

    /// Claim the controller, or `None` while another action is in flight.
    pub fn try_claim(&self) -> Option<MutexGuard<'_, WorkflowController>> {
        self.controller.try_lock().ok()
    }
}
