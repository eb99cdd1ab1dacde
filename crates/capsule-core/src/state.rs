//! Session state machine: arbitrates Idle / Recording / Transferring and is
//! the single place session state is mutated. Peer command handlers never
//! mutate state directly; they call into this module and act on the
//! returned [`SessionAction`].

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::event::ButtonEdge;
use crate::hal::Advertiser;

/// The three mutually-exclusive modes of the badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Transferring,
}

/// Single-byte status codes written to the peer STATUS characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Started,
    Complete,
    StoppedByHost,
    FileOpenFailed,
    NotifyFailed,
    FileReadFailed,
    BadCommand,
    AlreadyRunning,
    Busy,
    NoConn,
    Paused,
    SubscriptionRequired,
    NoFile,
    ListReady,
    FileSelected,
    InvalidIndex,
}

impl StatusCode {
    pub fn to_byte(self) -> u8 {
        match self {
            StatusCode::Started => 0x01,
            StatusCode::Complete => 0x02,
            StatusCode::StoppedByHost => 0x03,
            StatusCode::FileOpenFailed => 0x10,
            StatusCode::NotifyFailed => 0x11,
            StatusCode::FileReadFailed => 0x13,
            StatusCode::BadCommand => 0x20,
            StatusCode::AlreadyRunning => 0x21,
            StatusCode::Busy => 0x22,
            StatusCode::NoConn => 0x23,
            StatusCode::Paused => 0x30,
            StatusCode::SubscriptionRequired => 0x40,
            StatusCode::NoFile => 0x50,
            StatusCode::ListReady => 0x60,
            StatusCode::FileSelected => 0x61,
            StatusCode::InvalidIndex => 0x62,
        }
    }

    /// Reverses [`StatusCode::to_byte`]. Returns `None` for a byte that
    /// doesn't correspond to any defined status code.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => StatusCode::Started,
            0x02 => StatusCode::Complete,
            0x03 => StatusCode::StoppedByHost,
            0x10 => StatusCode::FileOpenFailed,
            0x11 => StatusCode::NotifyFailed,
            0x13 => StatusCode::FileReadFailed,
            0x20 => StatusCode::BadCommand,
            0x21 => StatusCode::AlreadyRunning,
            0x22 => StatusCode::Busy,
            0x23 => StatusCode::NoConn,
            0x30 => StatusCode::Paused,
            0x40 => StatusCode::SubscriptionRequired,
            0x50 => StatusCode::NoFile,
            0x60 => StatusCode::ListReady,
            0x61 => StatusCode::FileSelected,
            0x62 => StatusCode::InvalidIndex,
            _ => return None,
        })
    }

    /// Whether this status marks the egress worker as done with the current
    /// transfer attempt (succeeded, stopped, or failed) rather than still in
    /// progress.
    pub fn ends_transfer(self) -> bool {
        matches!(
            self,
            StatusCode::Complete
                | StatusCode::StoppedByHost
                | StatusCode::NoConn
                | StatusCode::NotifyFailed
                | StatusCode::FileOpenFailed
                | StatusCode::FileReadFailed
                | StatusCode::SubscriptionRequired
                | StatusCode::NoFile
        )
    }
}

/// Two-bit subscription vector: has the peer enabled notifications on DATA
/// and STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionMask {
    pub data: bool,
    pub status: bool,
}

impl SubscriptionMask {
    /// Both DATA and STATUS must be subscribed before START is honored.
    pub fn is_complete(&self) -> bool {
        self.data && self.status
    }

    pub fn clear(&mut self) {
        self.data = false;
        self.status = false;
    }
}

/// What the caller must do in response to a session event. The state
/// machine performs its own bookkeeping (and advertiser start/stop, since
/// that's part of its invariant) and hands back exactly one follow-up
/// action for the async orchestrator to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Nothing further to do (includes ignored transitions).
    None,
    /// Reply on the STATUS characteristic without changing any other state.
    ReplyStatus(StatusCode),
    /// Start the audio pipeline (sampler + writer).
    PipelineStart,
    /// Stop the audio pipeline.
    PipelineStop,
    /// Enqueue a Start command to the egress worker.
    EgressEnqueueStart,
    /// Tell the egress worker to abort the current transfer.
    EgressAbort,
}

/// The process-wide session context, held explicitly rather than as
/// module-level statics. Owned by one orchestrator; mutated only through
/// the methods below.
#[derive(Debug)]
pub struct SessionContext {
    state: SessionState,
    pub recording_filename: Option<PathBuf>,
    pub selected_file: Option<PathBuf>,
    pub connection_id: Option<u64>,
    pub subscription_mask: SubscriptionMask,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            recording_filename: None,
            selected_file: None,
            connection_id: None,
            subscription_mask: SubscriptionMask::default(),
        }
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Advertising must be enabled iff state is Idle.
    pub fn advertising_enabled(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Button edge: toggles recording from Idle/Recording, ignored while
    /// Transferring.
    pub fn on_button_edge(&mut self, edge: ButtonEdge) -> SessionAction {
        if edge == ButtonEdge::LongPress {
            // Reserved for a future remount gesture; currently a no-op.
            return SessionAction::None;
        }

        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Recording;
                info!(state = ?self.state, "session transition");
                SessionAction::PipelineStart
            }
            SessionState::Recording => {
                self.state = SessionState::Idle;
                info!(state = ?self.state, "session transition");
                SessionAction::PipelineStop
            }
            SessionState::Transferring => SessionAction::None,
        }
    }

    /// Peer START command: begins a transfer from Idle, and reports Busy or
    /// AlreadyRunning otherwise.
    pub fn on_peer_start(&mut self, advertiser: &dyn Advertiser, timeout: Duration) -> SessionAction {
        match self.state {
            SessionState::Idle => {
                advertiser.stop(timeout);
                self.state = SessionState::Transferring;
                info!(state = ?self.state, "session transition");
                SessionAction::EgressEnqueueStart
            }
            SessionState::Recording => SessionAction::ReplyStatus(StatusCode::Busy),
            SessionState::Transferring => SessionAction::ReplyStatus(StatusCode::AlreadyRunning),
        }
    }

    /// Peer STOP command. Outside Transferring there is no active transfer
    /// to stop, so it is a silent no-op (decision recorded in DESIGN.md).
    pub fn on_peer_stop(&mut self, advertiser: &dyn Advertiser) -> SessionAction {
        match self.state {
            SessionState::Transferring => {
                self.state = SessionState::Idle;
                advertiser.start();
                info!(state = ?self.state, "session transition");
                SessionAction::EgressAbort
            }
            _ => SessionAction::None,
        }
    }

    /// The egress worker reported the final chunk acknowledged and closed
    /// the file.
    pub fn on_egress_final_ack(&mut self, advertiser: &dyn Advertiser) -> SessionAction {
        if self.state == SessionState::Transferring {
            self.state = SessionState::Idle;
            advertiser.start();
            info!(state = ?self.state, "session transition");
        }
        SessionAction::None
    }

    /// Peer disconnected: force-abort egress if a transfer was in flight,
    /// clear the subscription mask, return to Idle.
    pub fn on_disconnect(&mut self, advertiser: &dyn Advertiser) -> SessionAction {
        self.connection_id = None;
        self.subscription_mask.clear();
        if self.state == SessionState::Transferring {
            self.state = SessionState::Idle;
            advertiser.start();
            info!(state = ?self.state, "session transition");
            return SessionAction::EgressAbort;
        }
        SessionAction::None
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::test_support::FakeAdvertiser;
    use super::*;

    #[test]
    fn boots_idle_with_advertising_enabled() {
        let ctx = SessionContext::new();
        assert_eq!(ctx.state(), SessionState::Idle);
        assert!(ctx.advertising_enabled());
    }

    #[test]
    fn button_toggles_idle_and_recording() {
        let mut ctx = SessionContext::new();
        assert_eq!(
            ctx.on_button_edge(ButtonEdge::ShortPress),
            SessionAction::PipelineStart
        );
        assert_eq!(ctx.state(), SessionState::Recording);
        assert!(!ctx.advertising_enabled());

        assert_eq!(
            ctx.on_button_edge(ButtonEdge::ShortPress),
            SessionAction::PipelineStop
        );
        assert_eq!(ctx.state(), SessionState::Idle);
        assert!(ctx.advertising_enabled());
    }

    #[test]
    fn long_press_is_always_a_no_op() {
        let mut ctx = SessionContext::new();
        assert_eq!(
            ctx.on_button_edge(ButtonEdge::LongPress),
            SessionAction::None
        );
        assert_eq!(ctx.state(), SessionState::Idle);
    }

    #[test]
    fn button_edge_ignored_while_transferring() {
        let advertiser = FakeAdvertiser::new_idle();
        let mut ctx = SessionContext::new();
        ctx.on_peer_start(&advertiser, Duration::from_millis(200));
        assert_eq!(ctx.state(), SessionState::Transferring);

        assert_eq!(
            ctx.on_button_edge(ButtonEdge::ShortPress),
            SessionAction::None
        );
        assert_eq!(ctx.state(), SessionState::Transferring);
    }

    #[test]
    fn peer_start_while_idle_stops_advertiser_and_enqueues() {
        let advertiser = FakeAdvertiser::new_idle();
        let mut ctx = SessionContext::new();
        let action = ctx.on_peer_start(&advertiser, Duration::from_millis(200));
        assert_eq!(action, SessionAction::EgressEnqueueStart);
        assert_eq!(ctx.state(), SessionState::Transferring);
        assert!(!advertiser.is_advertising());
    }

    #[test]
    fn peer_start_while_recording_replies_busy_without_changing_state() {
        let advertiser = FakeAdvertiser::new_idle();
        let mut ctx = SessionContext::new();
        ctx.on_button_edge(ButtonEdge::ShortPress);
        let action = ctx.on_peer_start(&advertiser, Duration::from_millis(200));
        assert_eq!(action, SessionAction::ReplyStatus(StatusCode::Busy));
        assert_eq!(ctx.state(), SessionState::Recording);
    }

    #[test]
    fn peer_start_while_transferring_replies_already_running() {
        let advertiser = FakeAdvertiser::new_idle();
        let mut ctx = SessionContext::new();
        ctx.on_peer_start(&advertiser, Duration::from_millis(200));
        let action = ctx.on_peer_start(&advertiser, Duration::from_millis(200));
        assert_eq!(
            action,
            SessionAction::ReplyStatus(StatusCode::AlreadyRunning)
        );
        assert_eq!(ctx.state(), SessionState::Transferring);
    }

    #[test]
    fn peer_stop_returns_to_idle_and_resumes_advertising() {
        let advertiser = FakeAdvertiser::new_idle();
        let mut ctx = SessionContext::new();
        ctx.on_peer_start(&advertiser, Duration::from_millis(200));
        let action = ctx.on_peer_stop(&advertiser);
        assert_eq!(action, SessionAction::EgressAbort);
        assert_eq!(ctx.state(), SessionState::Idle);
        assert!(advertiser.is_advertising());
    }

    #[test]
    fn disconnect_force_aborts_and_clears_subscription() {
        let advertiser = FakeAdvertiser::new_idle();
        let mut ctx = SessionContext::new();
        ctx.subscription_mask = SubscriptionMask {
            data: true,
            status: true,
        };
        ctx.on_peer_start(&advertiser, Duration::from_millis(200));

        let action = ctx.on_disconnect(&advertiser);
        assert_eq!(action, SessionAction::EgressAbort);
        assert_eq!(ctx.state(), SessionState::Idle);
        assert!(!ctx.subscription_mask.is_complete());
        assert!(advertiser.is_advertising());
    }

    #[test]
    fn final_ack_returns_to_idle() {
        let advertiser = FakeAdvertiser::new_idle();
        let mut ctx = SessionContext::new();
        ctx.on_peer_start(&advertiser, Duration::from_millis(200));
        ctx.on_egress_final_ack(&advertiser);
        assert_eq!(ctx.state(), SessionState::Idle);
        assert!(advertiser.is_advertising());
    }

    #[test]
    fn status_code_byte_round_trips() {
        let codes = [
            StatusCode::Started,
            StatusCode::Complete,
            StatusCode::StoppedByHost,
            StatusCode::FileOpenFailed,
            StatusCode::NotifyFailed,
            StatusCode::FileReadFailed,
            StatusCode::BadCommand,
            StatusCode::AlreadyRunning,
            StatusCode::Busy,
            StatusCode::NoConn,
            StatusCode::Paused,
            StatusCode::SubscriptionRequired,
            StatusCode::NoFile,
            StatusCode::ListReady,
            StatusCode::FileSelected,
            StatusCode::InvalidIndex,
        ];
        for code in codes {
            assert_eq!(StatusCode::from_byte(code.to_byte()), Some(code));
        }
        assert_eq!(StatusCode::from_byte(0xFF), None);
    }

    #[test]
    fn ends_transfer_matches_terminal_codes_only() {
        assert!(StatusCode::Complete.ends_transfer());
        assert!(StatusCode::StoppedByHost.ends_transfer());
        assert!(StatusCode::NoConn.ends_transfer());
        assert!(!StatusCode::Started.ends_transfer());
        assert!(!StatusCode::Paused.ends_transfer());
        assert!(!StatusCode::AlreadyRunning.ends_transfer());
    }
}
