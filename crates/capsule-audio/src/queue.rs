//! Bounded single-producer/single-consumer sample queue.
//!
//! The producer (sampler task) never blocks: a full queue means the sample
//! is dropped, silently, and observed only as a gap in `total_samples`
//! versus the expected rate. The consumer (writer task) blocks with a
//! bounded wait so it can periodically re-check liveness.

use std::time::Duration;

use capsule_core::header::SampleRecord;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Fixed queue depth.
pub const QUEUE_CAPACITY: usize = 2048;

/// Non-blocking producer half, owned by the sampler thread.
pub struct QueueProducer {
    tx: Sender<SampleRecord>,
}

impl QueueProducer {
    /// Offer a record to the queue. Returns `true` if enqueued, `false` if
    /// the queue was full and the sample was dropped.
    pub fn try_send(&self, record: SampleRecord) -> bool {
        self.tx.try_send(record).is_ok()
    }
}

/// Blocking-with-timeout consumer half, owned by the writer thread.
pub struct QueueConsumer {
    rx: Receiver<SampleRecord>,
}

/// Outcome of a bounded dequeue attempt.
pub enum RecvOutcome {
    /// A record was dequeued.
    Record(SampleRecord),
    /// The bounded wait elapsed with nothing to dequeue; re-check liveness.
    Timeout,
    /// Every producer has been dropped and the queue is empty: no more
    /// samples will ever arrive.
    Closed,
}

impl QueueConsumer {
    pub fn recv_timeout(&self, timeout: Duration) -> RecvOutcome {
        match self.rx.recv_timeout(timeout) {
            Ok(record) => RecvOutcome::Record(record),
            Err(RecvTimeoutError::Timeout) => RecvOutcome::Timeout,
            Err(RecvTimeoutError::Disconnected) => RecvOutcome::Closed,
        }
    }

    /// Drains whatever is buffered without blocking, used to flush residual
    /// entries once the producer side is known to be gone.
    pub fn drain(&self) -> Vec<SampleRecord> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(record) => out.push(record),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}

/// Creates a fresh bounded queue of the fixed capacity.
pub fn channel() -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = bounded(QUEUE_CAPACITY);
    (QueueProducer { tx }, QueueConsumer { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: u32) -> SampleRecord {
        SampleRecord {
            value: 100,
            timestamp_ms: 0,
            sequence_no: seq,
        }
    }

    #[test]
    fn enqueue_and_dequeue_preserve_order() {
        let (producer, consumer) = channel();
        for i in 0..10 {
            assert!(producer.try_send(record(i)));
        }
        for i in 0..10 {
            match consumer.recv_timeout(Duration::from_millis(100)) {
                RecvOutcome::Record(r) => assert_eq!(r.sequence_no, i),
                _ => panic!("expected a record"),
            }
        }
    }

    #[test]
    fn full_queue_drops_silently() {
        let (producer, _consumer) = channel();
        for i in 0..QUEUE_CAPACITY as u32 {
            assert!(producer.try_send(record(i)));
        }
        assert!(!producer.try_send(record(9999)));
    }

    #[test]
    fn timeout_when_empty() {
        let (_producer, consumer) = channel();
        match consumer.recv_timeout(Duration::from_millis(10)) {
            RecvOutcome::Timeout => {}
            _ => panic!("expected timeout"),
        }
    }

    #[test]
    fn closed_once_producer_dropped_and_drained() {
        let (producer, consumer) = channel();
        producer.try_send(record(0));
        drop(producer);
        match consumer.recv_timeout(Duration::from_millis(10)) {
            RecvOutcome::Record(r) => assert_eq!(r.sequence_no, 0),
            _ => panic!("expected the buffered record first"),
        }
        match consumer.recv_timeout(Duration::from_millis(10)) {
            RecvOutcome::Closed => {}
            _ => panic!("expected closed"),
        }
    }
}
