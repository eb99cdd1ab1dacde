//! Host-runnable stand-ins for the badge's hardware collaborators: a real
//! wall clock, logging advertiser/LED, a synthetic analog front-end, and a
//! transport that notifies over a channel instead of a radio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use capsule_audio::AnalogSource;
use capsule_core::hal::{Advertiser, Clock, Led};
use capsule_core::state::SubscriptionMask;
use capsule_egress::{Transport, TransportError};
use tracing::info;

/// Milliseconds since the Unix epoch, used as the monotonic timestamp
/// source. Good enough for a host simulation; real firmware would read a
/// hardware tick counter.
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { boot: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_else(|_| self.boot.elapsed().as_millis() as u64)
    }
}

/// Logs advertising state transitions instead of driving a radio.
#[derive(Default)]
pub struct LoggingAdvertiser {
    advertising: AtomicBool,
}

impl Advertiser for LoggingAdvertiser {
    fn stop(&self, _timeout: Duration) -> bool {
        self.advertising.store(false, Ordering::SeqCst);
        info!("advertising stopped");
        true
    }

    fn start(&self) {
        self.advertising.store(true, Ordering::SeqCst);
        info!("advertising resumed");
    }
}

/// Logs LED state instead of driving a GPIO pin.
#[derive(Default)]
pub struct LoggingLed;

impl Led for LoggingLed {
    fn set(&self, on: bool) {
        info!(on, "led");
    }
}

/// A deterministic synthetic analog front-end: a slow sine wave riding on a
/// small amount of pseudo-noise, scaled into the sanitizer's raw domain.
pub struct SyntheticSource {
    phase: f64,
    seed: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self { phase: 0.0, seed: 0x2545_f491_4f6c_dd1d }
    }

    fn next_noise(&mut self) -> f64 {
        // xorshift64, purely for repeatable jitter — not a CSPRNG.
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 7;
        self.seed ^= self.seed << 17;
        (self.seed % 1000) as f64 / 1000.0 - 0.5
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalogSource for SyntheticSource {
    fn sample(&mut self) -> u16 {
        self.phase += std::f64::consts::TAU / 16_000.0 * 220.0;
        let wave = (self.phase.sin() + 1.0) / 2.0;
        let noise = self.next_noise() * 0.02;
        let value = ((wave + noise).clamp(0.0, 1.0) * 4095.0) as u16;
        value
    }
}

/// A transport that notifies over an in-process channel instead of a BLE
/// stack, always connected and subscribed unless told otherwise.
pub struct ChannelTransport {
    mtu: u16,
    connected: AtomicBool,
    data_tx: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    status_tx: tokio::sync::mpsc::UnboundedSender<u8>,
}

impl ChannelTransport {
    pub fn new(
        mtu: u16,
        data_tx: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
        status_tx: tokio::sync::mpsc::UnboundedSender<u8>,
    ) -> Self {
        Self {
            mtu,
            connected: AtomicBool::new(true),
            data_tx,
            status_tx,
        }
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn notify_data(&self, chunk: &[u8]) -> Result<(), TransportError> {
        self.data_tx
            .send(chunk.to_vec())
            .map_err(|e| TransportError::Fatal(e.to_string()))
    }

    async fn notify_status(&self, code: u8) -> Result<(), TransportError> {
        self.status_tx
            .send(code)
            .map_err(|e| TransportError::Fatal(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscription(&self) -> SubscriptionMask {
        SubscriptionMask { data: true, status: true }
    }

    fn mtu(&self) -> u16 {
        self.mtu
    }
}
