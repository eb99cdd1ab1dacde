//! capsule - Wearable audio-capture badge firmware core.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use capsule::ble::{self, TransportStatusSink};
use capsule::session::{CatalogFileSource, SessionController, SharedSelection};
use capsule::sim::{ChannelTransport, LoggingAdvertiser, LoggingLed, SyntheticSource, SystemClock};
use capsule::ui;
use capsule_audio::AudioPipelineController;
use capsule_core::sanitize::SanitizerCounters;
use capsule_core::{Config, ConfigManager, DEFAULT_LOG_LEVEL};
use capsule_egress::EgressWorker;
use capsule_core::hal::Button;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CAPSULE_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .init();

    let config_manager = ConfigManager::new()?;
    let config: Config = config_manager.load()?;
    config_manager.save(&config)?;

    let recordings_dir = config.recordings_dir();
    std::fs::create_dir_all(&recordings_dir)
        .with_context(|| format!("failed to create recordings directory at {recordings_dir:?}"))?;

    let clock = Arc::new(SystemClock::new());
    let advertiser = Arc::new(LoggingAdvertiser::default());
    let led = Arc::new(LoggingLed);
    let counters = Arc::new(SanitizerCounters::new());

    let advertiser_quiesce_timeout = Duration::from_millis(config.advertiser_quiesce_timeout_ms);
    let stop_quiescence = Duration::from_millis(config.stop_quiescence_ms);

    let pipeline = AudioPipelineController::new(
        clock,
        advertiser.clone(),
        led,
        counters,
        advertiser_quiesce_timeout,
        stop_quiescence,
    );

    let (data_tx, mut data_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<u8>();
    let transport = Arc::new(ChannelTransport::new(config.preferred_mtu, data_tx, status_tx));

    tokio::spawn(async move {
        while let Some(chunk) = data_rx.recv().await {
            info!(bytes = chunk.len(), "peer received data chunk");
        }
    });

    let selection: SharedSelection = Arc::new(Mutex::new(None));
    let file_source = Arc::new(CatalogFileSource::new(recordings_dir.clone(), selection.clone()));
    let status_sink = Arc::new(TransportStatusSink(transport.clone()));

    let (worker, egress_tx) = EgressWorker::new(transport.clone(), file_source, status_sink);
    tokio::spawn(worker.run());

    let session = Arc::new(tokio::sync::Mutex::new(SessionController::new(
        pipeline,
        egress_tx,
        advertiser,
        recordings_dir,
        advertiser_quiesce_timeout,
        selection,
        Box::new(|| Box::new(SyntheticSource::new())),
    )));

    tokio::spawn({
        let session = session.clone();
        async move {
            while let Some(byte) = status_rx.recv().await {
                info!(code = format!("{byte:#04x}"), "peer received status");
                if let Some(code) = capsule_core::StatusCode::from_byte(byte) {
                    if code.ends_transfer() {
                        session.lock().await.handle_egress_final_ack();
                    }
                }
            }
        }
    });

    let (button_tx, button_rx) = mpsc::channel(8);
    tokio::spawn(ui::run(button_rx, session.clone()));

    info!(device_name = %config.device_name, mtu = config.preferred_mtu, "capsule ready");
    info!("type 'b' for a button press, 'd' to simulate a disconnect, a hex command like '01', or 'q' to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            break;
        } else if line.eq_ignore_ascii_case("b") {
            button_tx.send(Button::ShortPress).await.ok();
        } else if line.eq_ignore_ascii_case("l") {
            button_tx.send(Button::LongPress).await.ok();
        } else if line.eq_ignore_ascii_case("d") {
            transport.disconnect();
            session.lock().await.handle_disconnect();
        } else if !line.is_empty() {
            match hex_decode(line) {
                Ok(bytes) => {
                    let mut session = session.lock().await;
                    ble::dispatch(&bytes, &mut session, &*dummy_status_sink()).await;
                }
                Err(e) => error!(error = %e, "invalid hex command"),
            }
        }
    }

    Ok(())
}

fn hex_decode(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        anyhow::bail!("odd-length hex string");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).context("invalid hex digit"))
        .collect()
}

/// A throwaway status sink for commands typed directly at the console; the
/// worker's own status sink (wired to the transport) still receives every
/// status the egress worker itself emits.
fn dummy_status_sink() -> Box<dyn capsule_egress::StatusSink> {
    struct LoggingSink;
    impl capsule_egress::StatusSink for LoggingSink {
        fn emit(&self, code: capsule_core::StatusCode) {
            info!(code = ?code, "status");
        }
    }
    Box::new(LoggingSink)
}
