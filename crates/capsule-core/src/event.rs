//! The button-edge type the session state machine reacts to, independent of
//! the UI poller task that produces it.

use crate::hal::Button;

/// A debounced button press, as delivered by the UI poller task.
pub type ButtonEdge = Button;
