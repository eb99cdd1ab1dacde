//! Real-time audio capture and storage for the capsule badge firmware.
//!
//! This crate owns everything between the analog front-end and the
//! recording file on storage: sanitization happens in `capsule-core`, but
//! the signal conditioner, the bounded sample queue, the storage writer,
//! the audio pipeline controller, and the file catalog all live here.

pub mod catalog;
pub mod conditioner;
pub mod pipeline;
pub mod queue;
pub mod sampler;
pub mod writer;

pub use catalog::{
    file_count, find_latest, next_sequential_name, resolve_name, select_by_index, CatalogError,
};
pub use conditioner::SignalConditioner;
pub use pipeline::{AudioPipelineController, PipelineError};
pub use queue::{QueueConsumer, QueueProducer};
pub use sampler::{AnalogSource, Sampler};
pub use writer::{StorageWriter, WriterError};
