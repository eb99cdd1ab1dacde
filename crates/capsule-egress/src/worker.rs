//! Egress worker: the single long-lived task that streams a recording file
//! to the peer over the framed protocol, paced by a small credit pool and
//! retrying transient notification failures with back-off.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use capsule_core::state::StatusCode;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::protocol::{build_chunks, Chunk};
use crate::transport::{Transport, TransportError};

/// How many chunks may be in flight (submitted but not yet confirmed
/// transmitted) at once.
const MAX_IN_FLIGHT: usize = 3;
/// How long to wait for a credit before giving up on the transfer.
const CREDIT_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(200);
/// Retry ceiling for one chunk's notification submission.
const MAX_RETRIES: u32 = 8;
/// Back-off schedule for retried submissions.
const BACKOFF_START: Duration = Duration::from_millis(10);
const BACKOFF_CAP: Duration = Duration::from_millis(100);
/// Spacing between successive chunk sends, to avoid saturating the link.
const CHUNK_PACING: Duration = Duration::from_millis(4);

/// Resolves which file an egress transfer should read. The root crate wires
/// this to the file catalog and the session's last-selected filename.
pub trait FileSource: Send + Sync {
    fn resolve(&self) -> Option<PathBuf>;
}

/// Commands the worker's single command queue accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Pause,
    Resume,
}

/// Emits a status code for the peer to observe on the Status characteristic.
pub trait StatusSink: Send + Sync {
    fn emit(&self, code: StatusCode);
}

pub struct EgressWorker {
    transport: Arc<dyn Transport>,
    file_source: Arc<dyn FileSource>,
    status_sink: Arc<dyn StatusSink>,
    command_rx: mpsc::Receiver<Command>,
    active: bool,
    paused: bool,
}

impl EgressWorker {
    pub fn new(
        transport: Arc<dyn Transport>,
        file_source: Arc<dyn FileSource>,
        status_sink: Arc<dyn StatusSink>,
    ) -> (Self, mpsc::Sender<Command>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                transport,
                file_source,
                status_sink,
                command_rx: rx,
                active: false,
                paused: false,
            },
            tx,
        )
    }

    /// Runs until the command sender is dropped.
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            self.apply(cmd).await;
        }
    }

    async fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Start => self.handle_start().await,
            Command::Stop => self.handle_stop(),
            Command::Pause => {
                if self.active {
                    self.paused = true;
                    self.status_sink.emit(StatusCode::Paused);
                }
            }
            Command::Resume => {
                if self.active {
                    self.paused = false;
                }
            }
        }
    }

    fn handle_stop(&mut self) {
        if self.active {
            self.active = false;
            self.status_sink.emit(StatusCode::StoppedByHost);
        }
    }

    /// Drains commands already queued without blocking, applying Stop/Pause/
    /// Resume so a long-running transfer can be interrupted mid-loop.
    fn poll_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            match cmd {
                Command::Stop => {
                    self.active = false;
                    self.status_sink.emit(StatusCode::StoppedByHost);
                }
                Command::Pause => self.paused = true,
                Command::Resume => self.paused = false,
                Command::Start => {
                    // Already transferring; a second Start is ignored.
                    self.status_sink.emit(StatusCode::AlreadyRunning);
                }
            }
        }
    }

    async fn handle_start(&mut self) {
        if self.active {
            self.status_sink.emit(StatusCode::AlreadyRunning);
            return;
        }

        let subscription = self.transport.subscription();
        if !subscription.is_complete() {
            self.status_sink.emit(StatusCode::SubscriptionRequired);
            return;
        }

        let Some(path) = self.file_source.resolve() else {
            self.status_sink.emit(StatusCode::NoFile);
            return;
        };

        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to open file for egress");
                self.status_sink.emit(StatusCode::FileOpenFailed);
                return;
            }
        };

        let mut data = Vec::new();
        if let Err(e) = file.read_to_end(&mut data) {
            warn!(error = %e, "failed to read recording file");
            self.status_sink.emit(StatusCode::FileReadFailed);
            return;
        }
        drop(file);

        let chunks = build_chunks(&data, self.transport.mtu());
        self.active = true;
        self.paused = false;
        self.status_sink.emit(StatusCode::Started);
        info!(chunks = chunks.len(), bytes = data.len(), "egress transfer started");

        let credits = Arc::new(Semaphore::new(MAX_IN_FLIGHT));

        for chunk in chunks {
            loop {
                self.poll_commands();
                if !self.active {
                    return;
                }
                if self.paused {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    continue;
                }
                break;
            }

            if !self.transport.is_connected() {
                self.active = false;
                self.status_sink.emit(StatusCode::NoConn);
                return;
            }

            match tokio::time::timeout(CREDIT_ACQUIRE_TIMEOUT, credits.clone().acquire_owned())
                .await
            {
                Ok(Ok(permit)) => {
                    if !self.send_with_retry(&chunk).await {
                        self.active = false;
                        return;
                    }
                    drop(permit);
                }
                _ => {
                    warn!("timed out waiting for an egress credit");
                    self.active = false;
                    self.status_sink.emit(StatusCode::NotifyFailed);
                    return;
                }
            }

            tokio::time::sleep(CHUNK_PACING).await;
        }

        if self.active {
            self.active = false;
            self.status_sink.emit(StatusCode::Complete);
            info!("egress transfer complete");
        }
    }

    /// Submits one chunk, retrying transient failures with exponential
    /// back-off. Returns `false` if the transfer should be aborted.
    async fn send_with_retry(&self, chunk: &Chunk) -> bool {
        let encoded = chunk.encode();
        let mut delay = BACKOFF_START;

        for attempt in 0..=MAX_RETRIES {
            match self.transport.notify_data(&encoded).await {
                Ok(()) => return true,
                Err(TransportError::Transient(reason)) => {
                    if attempt == MAX_RETRIES {
                        warn!(reason = %reason, "egress chunk exhausted retries");
                        self.status_sink.emit(StatusCode::NotifyFailed);
                        return false;
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(BACKOFF_CAP);
                }
                Err(TransportError::Fatal(reason)) => {
                    warn!(reason = %reason, "egress chunk submission failed fatally");
                    self.status_sink.emit(StatusCode::NotifyFailed);
                    return false;
                }
            }
        }
        false
    }
}
