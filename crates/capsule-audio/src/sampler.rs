//! Sampler task: samples the analog front-end at a fixed cadence and offers
//! sanitized records to the sample queue, never blocking.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use capsule_core::hal::Clock;
use capsule_core::header::{SampleRecord, SAMPLE_RATE_HZ};
use capsule_core::sanitize::{sanitize, SanitizerCounters};
use tracing::debug;

use crate::queue::QueueProducer;

/// The analog front-end contract: one raw 16-bit reading per call.
pub trait AnalogSource: Send {
    fn sample(&mut self) -> u16;
}

/// Owns the sampler thread for one recording session.
pub struct Sampler {
    recording: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Sampler {
    /// Spawns the sampler thread. `sequence` is shared across sessions — it
    /// is a globally monotonic counter of samples persisted since boot, so
    /// it is not reset here.
    pub fn start(
        mut source: Box<dyn AnalogSource>,
        producer: QueueProducer,
        clock: Arc<dyn Clock>,
        counters: Arc<SanitizerCounters>,
        sequence: Arc<AtomicU32>,
        period: Duration,
    ) -> Self {
        let recording = Arc::new(AtomicBool::new(true));
        let recording_for_thread = recording.clone();

        let handle = thread::spawn(move || {
            while recording_for_thread.load(Ordering::Acquire) {
                let raw = source.sample();
                let value = sanitize(raw, &counters);
                let timestamp_ms = clock.now_ms() as u32;
                let sequence_no = sequence.fetch_add(1, Ordering::Relaxed);

                if !producer.try_send(SampleRecord {
                    value,
                    timestamp_ms,
                    sequence_no,
                }) {
                    debug!(sequence_no, "sample queue full, dropping sample");
                }

                thread::sleep(period);
            }
            // Dropping `producer` here closes the channel, signalling the
            // writer task that no more samples are coming.
        });

        Self {
            recording,
            handle: Some(handle),
        }
    }

    /// The nominal per-sample period at the fixed sample rate.
    pub fn nominal_period() -> Duration {
        Duration::from_secs_f64(1.0 / SAMPLE_RATE_HZ as f64)
    }

    /// Signals the sampler thread to stop and joins it. The recording flag
    /// must flip before the writer begins finalizing.
    pub fn stop(mut self) {
        self.recording.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::AnalogSource;

    /// Always returns a fixed value; useful for deterministic tests.
    pub struct ConstantSource(pub u16);

    impl AnalogSource for ConstantSource {
        fn sample(&mut self) -> u16 {
            self.0
        }
    }

    /// Cycles through a fixed sequence of values, repeating the last one.
    pub struct ScriptedSource {
        values: Vec<u16>,
        index: usize,
    }

    impl ScriptedSource {
        pub fn new(values: Vec<u16>) -> Self {
            Self { values, index: 0 }
        }
    }

    impl AnalogSource for ScriptedSource {
        fn sample(&mut self) -> u16 {
            let v = *self.values.get(self.index).unwrap_or(
                self.values
                    .last()
                    .expect("ScriptedSource requires at least one value"),
            );
            if self.index + 1 < self.values.len() {
                self.index += 1;
            }
            v
        }
    }
}
