//! Button input loop. Debouncing and long-press timing happen in the
//! hardware layer; this just drains edges onto the session controller.

use std::sync::Arc;

use capsule_core::hal::Button;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::session::SessionController;

/// Consumes button edges until the channel closes.
pub async fn run(mut edges: mpsc::Receiver<Button>, session: Arc<Mutex<SessionController>>) {
    while let Some(edge) = edges.recv().await {
        debug!(edge = ?edge, "button edge");
        session.lock().await.handle_button_edge(edge);
    }
}
