//! The wireless transport contract the egress worker depends on: DATA/STATUS
//! notifications, connection liveness, subscription state, and negotiated
//! MTU. The concrete GAP/GATT link layer lives outside this crate — only
//! this boundary is defined here.

use async_trait::async_trait;
use capsule_core::state::SubscriptionMask;
use thiserror::Error;

/// Errors a notification submission can fail with.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// Controller-busy / out-of-memory notification: worth retrying.
    #[error("transient transport failure: {0}")]
    Transient(String),
    /// Anything else: abort the transfer.
    #[error("transport failure: {0}")]
    Fatal(String),
}

/// What the egress worker needs from the wireless stack.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one framed chunk on the DATA characteristic. Completion of this
    /// call stands in for the stack's asynchronous "notify transmitted"
    /// event: the credit borrowed to call this is returned when it resolves.
    async fn notify_data(&self, chunk: &[u8]) -> Result<(), TransportError>;

    /// Send one status byte on the STATUS characteristic.
    async fn notify_status(&self, code: u8) -> Result<(), TransportError>;

    /// Whether the peer connection is still alive.
    fn is_connected(&self) -> bool;

    /// The peer's current DATA/STATUS subscription state.
    fn subscription(&self) -> SubscriptionMask;

    /// Negotiated MTU (preferred value is 185).
    fn mtu(&self) -> u16;
}
