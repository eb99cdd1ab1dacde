//! Framed file-egress protocol, worker, and command surface data types for
//! the capsule badge firmware.

pub mod command;
pub mod protocol;
pub mod transport;
pub mod worker;

pub use command::{parse_command, CommandError, ParsedCommand};
pub use protocol::{build_chunks, payload_budget, Chunk, CHUNK_HEADER_LEN, MAX_CHUNK};
pub use transport::{Transport, TransportError};
pub use worker::{Command, EgressWorker, FileSource, StatusSink};
