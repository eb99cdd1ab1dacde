//! Audio pipeline controller: starts/stops the sampler and writer together,
//! and coordinates with the wireless advertiser since the radio and analog
//! front-end share a noise-coupling budget.

use std::path::PathBuf;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use capsule_core::hal::{Advertiser, Clock, Led};
use capsule_core::sanitize::SanitizerCounters;
use thiserror::Error;
use tracing::{error, info};

use crate::queue::{self, RecvOutcome};
use crate::sampler::{AnalogSource, Sampler};
use crate::writer::{StorageWriter, WriterError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open recording file")]
    Writer(#[from] WriterError),
    #[error("a recording is already in progress")]
    AlreadyRecording,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Wait time for the consumer's bounded dequeue.
const QUEUE_RECV_TIMEOUT: Duration = Duration::from_millis(100);

struct ActiveSession {
    sampler: Sampler,
    writer_thread: JoinHandle<()>,
}

/// Composes the sampler and storage writer, owning the pipeline's
/// `recording` flag and the cross-session sample sequence counter.
pub struct AudioPipelineController {
    clock: Arc<dyn Clock>,
    advertiser: Arc<dyn Advertiser>,
    led: Arc<dyn Led>,
    counters: Arc<SanitizerCounters>,
    sequence: Arc<AtomicU32>,
    advertiser_quiesce_timeout: Duration,
    stop_quiescence: Duration,
    sample_period: Duration,
    active: Option<ActiveSession>,
}

impl AudioPipelineController {
    pub fn new(
        clock: Arc<dyn Clock>,
        advertiser: Arc<dyn Advertiser>,
        led: Arc<dyn Led>,
        counters: Arc<SanitizerCounters>,
        advertiser_quiesce_timeout: Duration,
        stop_quiescence: Duration,
    ) -> Self {
        Self {
            clock,
            advertiser,
            led,
            counters,
            sequence: Arc::new(AtomicU32::new(0)),
            advertiser_quiesce_timeout,
            stop_quiescence,
            sample_period: Sampler::nominal_period(),
            active: None,
        }
    }

    #[cfg(test)]
    pub fn with_sample_period(mut self, period: Duration) -> Self {
        self.sample_period = period;
        self
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Start protocol. Caller has already confirmed session state was Idle
    /// before invoking this.
    pub fn start(&mut self, source: Box<dyn AnalogSource>, path: PathBuf) -> Result<()> {
        if self.active.is_some() {
            return Err(PipelineError::AlreadyRecording);
        }

        self.advertiser.stop(self.advertiser_quiesce_timeout);

        let mut writer = StorageWriter::new();
        if let Err(e) = writer.start(&path, self.clock.now_ms() as u32) {
            error!(error = ?e, "failed to start storage writer");
            self.advertiser.start();
            return Err(e.into());
        }

        let (producer, consumer) = queue::channel();
        let counters = self.counters.clone();
        let clock = self.clock.clone();
        let writer_thread = thread::spawn(move || {
            run_writer_loop(writer, consumer, &counters, clock.as_ref());
        });

        let sampler = Sampler::start(
            source,
            producer,
            self.clock.clone(),
            self.counters.clone(),
            self.sequence.clone(),
            self.sample_period,
        );

        self.active = Some(ActiveSession {
            sampler,
            writer_thread,
        });
        self.led.set(true);
        info!("audio pipeline started");
        Ok(())
    }

    /// Stop protocol. The caller must have already moved session state to
    /// Idle before invoking this, so the producer observes recording-over
    /// and the writer drains in order.
    pub fn stop(&mut self) {
        let Some(session) = self.active.take() else {
            return;
        };

        session.sampler.stop();
        thread::sleep(self.stop_quiescence);
        session.writer_thread.join().ok();

        self.led.set(false);
        self.advertiser.start();
        info!("audio pipeline stopped");
    }
}

fn run_writer_loop(
    mut writer: StorageWriter,
    consumer: queue::QueueConsumer,
    counters: &SanitizerCounters,
    clock: &dyn Clock,
) {
    loop {
        match consumer.recv_timeout(QUEUE_RECV_TIMEOUT) {
            RecvOutcome::Record(record) => {
                if let Err(e) = writer.append(
                    record.value,
                    record.timestamp_ms,
                    record.sequence_no,
                    counters,
                ) {
                    error!(error = ?e, "failed to append sample record");
                }
            }
            RecvOutcome::Timeout => continue,
            RecvOutcome::Closed => break,
        }
    }

    for record in consumer.drain() {
        if let Err(e) = writer.append(
            record.value,
            record.timestamp_ms,
            record.sequence_no,
            counters,
        ) {
            error!(error = ?e, "failed to append trailing sample record");
        }
    }

    if let Err(e) = writer.stop(clock.now_ms() as u32) {
        error!(error = ?e, "failed to finalize recording header");
    }
}
