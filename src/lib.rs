//! Badge firmware core: wires the sample pipeline, the session state
//! machine, and the framed egress protocol into a runnable process.

pub mod ble;
pub mod session;
pub mod sim;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
