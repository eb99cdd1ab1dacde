//! Core types shared across the capsule badge firmware.
//!
//! This crate is platform-agnostic: it defines the on-disk storage format,
//! the session state machine, the sample sanitizer, the hardware-abstraction
//! traits the outer crates/binary implement, and configuration loading. None
//! of it depends on any concrete transport, filesystem, or audio backend.

pub mod config;
pub mod event;
pub mod hal;
pub mod header;
pub mod sanitize;
pub mod state;

pub use config::{Config, ConfigManager};
pub use event::ButtonEdge;
pub use hal::{Advertiser, Button, Clock, Led};
pub use header::{RecordingHeader, SampleRecord, HEADER_LEN, MAGIC, RECORD_LEN, SAMPLE_RATE_HZ};
pub use sanitize::{sanitize, SanitizerCounters};
pub use state::{SessionAction, SessionContext, SessionState, StatusCode, SubscriptionMask};

/// Application name.
pub const APP_NAME: &str = "capsule";

/// Default log level, read as a fallback for `CAPSULE_LOG`.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Firmware format version, written to every recording header.
pub const FORMAT_VERSION: u32 = 1;
