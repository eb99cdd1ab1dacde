//! Session orchestrator: wires the session state machine to the audio
//! pipeline and the egress worker's command queue. This is the one place
//! that turns a [`SessionAction`] into an actual side effect.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use capsule_audio::{next_sequential_name, AnalogSource, AudioPipelineController};
use capsule_core::hal::{Advertiser, Button};
use capsule_core::state::{SessionAction, SessionContext, SessionState, StatusCode};
use capsule_egress::Command as EgressCommand;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::error;

/// Shared, cross-task view of which file an egress transfer should read.
/// The session task owns [`SessionContext::selected_file`] for bookkeeping;
/// this cell is what the egress worker actually reads from, since the two
/// live on different tasks.
pub type SharedSelection = Arc<Mutex<Option<PathBuf>>>;

pub struct SessionController {
    ctx: SessionContext,
    pipeline: AudioPipelineController,
    egress_tx: mpsc::Sender<EgressCommand>,
    advertiser: Arc<dyn Advertiser>,
    recordings_dir: PathBuf,
    advertiser_quiesce_timeout: Duration,
    selection: SharedSelection,
    source_factory: Box<dyn Fn() -> Box<dyn AnalogSource> + Send>,
}

impl SessionController {
    pub fn new(
        pipeline: AudioPipelineController,
        egress_tx: mpsc::Sender<EgressCommand>,
        advertiser: Arc<dyn Advertiser>,
        recordings_dir: PathBuf,
        advertiser_quiesce_timeout: Duration,
        selection: SharedSelection,
        source_factory: Box<dyn Fn() -> Box<dyn AnalogSource> + Send>,
    ) -> Self {
        Self {
            ctx: SessionContext::new(),
            pipeline,
            egress_tx,
            advertiser,
            recordings_dir,
            advertiser_quiesce_timeout,
            selection,
            source_factory,
        }
    }

    pub fn state(&self) -> SessionState {
        self.ctx.state()
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    pub fn set_selected_file(&mut self, path: PathBuf) {
        self.ctx.selected_file = Some(path.clone());
        *self.selection.lock() = Some(path);
    }

    pub fn handle_button_edge(&mut self, edge: Button) {
        let action = self.ctx.on_button_edge(edge);
        self.apply_local_action(action);
    }

    /// Returns a status code to notify the peer with, if the state machine
    /// refused the request instead of enqueuing work.
    pub async fn handle_peer_start(&mut self) -> Option<StatusCode> {
        let action = self
            .ctx
            .on_peer_start(self.advertiser.as_ref(), self.advertiser_quiesce_timeout);
        match action {
            SessionAction::EgressEnqueueStart => {
                self.egress_tx.send(EgressCommand::Start).await.ok();
                None
            }
            SessionAction::ReplyStatus(code) => Some(code),
            _ => None,
        }
    }

    pub async fn handle_peer_stop(&mut self) -> Option<StatusCode> {
        let action = self.ctx.on_peer_stop(self.advertiser.as_ref());
        match action {
            SessionAction::EgressAbort => {
                self.egress_tx.send(EgressCommand::Stop).await.ok();
                None
            }
            SessionAction::ReplyStatus(code) => Some(code),
            _ => None,
        }
    }

    /// Passes Pause/Resume straight through; they don't affect the Idle /
    /// Recording / Transferring state.
    pub async fn forward_egress_command(&self, cmd: EgressCommand) {
        self.egress_tx.send(cmd).await.ok();
    }

    pub fn handle_egress_final_ack(&mut self) {
        self.ctx.on_egress_final_ack(self.advertiser.as_ref());
    }

    pub fn handle_disconnect(&mut self) {
        let action = self.ctx.on_disconnect(self.advertiser.as_ref());
        if action == SessionAction::EgressAbort {
            let _ = self.egress_tx.try_send(EgressCommand::Stop);
        }
    }

    fn apply_local_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::PipelineStart => {
                let name = next_sequential_name(&self.recordings_dir);
                let path = self.recordings_dir.join(name);
                let source = (self.source_factory)();
                match self.pipeline.start(source, path.clone()) {
                    Ok(()) => self.ctx.recording_filename = Some(path),
                    Err(e) => error!(error = ?e, "failed to start recording"),
                }
            }
            SessionAction::PipelineStop => {
                self.pipeline.stop();
                self.ctx.recording_filename = None;
            }
            SessionAction::None | SessionAction::ReplyStatus(_) | SessionAction::EgressEnqueueStart | SessionAction::EgressAbort => {}
        }
    }
}

/// Resolves which file the egress worker should stream: the last file the
/// peer selected, or the most recently modified recording otherwise.
pub struct CatalogFileSource {
    recordings_dir: PathBuf,
    selection: SharedSelection,
}

impl CatalogFileSource {
    pub fn new(recordings_dir: PathBuf, selection: SharedSelection) -> Self {
        Self { recordings_dir, selection }
    }
}

impl capsule_egress::FileSource for CatalogFileSource {
    fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = self.selection.lock().clone() {
            return Some(path);
        }
        capsule_audio::find_latest(&self.recordings_dir).ok()
    }
}
