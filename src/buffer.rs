use crate::config::PipelineConfig;
use crate::context::StageContext;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{Stage, StageRunner};
use crate::stream::{stream, Stream, StreamSender};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Fixed-capacity FIFO between a ring-buffer stage's feeder and drain.
///
/// The writing half is a plain bounded sender, so a full buffer blocks the
/// feeder rather than dropping anything. Dropping every sender closes the
/// buffer; the drain still yields the queued values before it stops.
#[derive(Debug)]
pub(crate) struct RingBuffer<T> {
    queue: Receiver<T>,
    capacity: usize,
    release_delay: Duration,
}

impl<T> RingBuffer<T> {
    /// Create a buffer and its writing half
    pub(crate) fn new(capacity: usize, release_delay: Duration) -> (Sender<T>, Self) {
        let (tx, queue) = bounded(capacity);
        (
            tx,
            Self {
                queue,
                capacity,
                release_delay,
            },
        )
    }

    /// Get the current size of the buffer
    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Get the capacity of the buffer
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the utilization of the buffer as a percentage (0-100)
    pub(crate) fn utilization(&self) -> u32 {
        if self.capacity == 0 {
            return 0;
        }
        ((self.len() * 100) / self.capacity).min(100) as u32
    }

    /// Release buffered values oldest-first, waiting `release_delay` before
    /// each one, until the buffer is closed and empty.
    ///
    /// Stops early only if `output`'s reader has gone away. Returns the number
    /// of values released.
    pub(crate) fn drain_into(self, output: StreamSender<T>, metrics: &StageMetrics) -> u64 {
        let mut released = 0;
        for value in self.queue.iter() {
            thread::sleep(self.release_delay);
            trace!(
                buffered = self.len(),
                capacity = self.capacity(),
                utilization = self.utilization(),
                "releasing buffered value"
            );
            if output.send(value).is_err() {
                debug!("ring buffer output reader dropped, abandoning drain");
                break;
            }
            metrics.record_released();
            released += 1;
        }
        released
    }
}

/// Terminal stage that decouples arrival rate from release rate.
///
/// Activation starts two workers joined only by a [`RingBuffer`]: a feeder
/// that forwards every input value into the buffer (blocking while it is
/// full), and a drain that releases buffered values with a fixed per-item
/// delay. The drain does not watch the cancellation signal. Cancellation
/// stops the feeder, which closes the buffer, and the drain then flushes
/// whatever was already buffered before closing the output stream.
#[derive(Debug)]
pub struct RingBufferStage {
    name: String,
    capacity: usize,
    release_delay: Duration,
    metrics: StageMetrics,
}

impl RingBufferStage {
    /// Create a ring-buffer stage
    pub fn new(name: impl Into<String>, capacity: usize, release_delay: Duration) -> Self {
        let name = name.into();
        info!(
            stage = %name,
            capacity,
            release_delay_ms = release_delay.as_millis() as u64,
            "creating ring buffer stage"
        );
        Self {
            name,
            capacity,
            release_delay,
            metrics: StageMetrics::new(),
        }
    }

    /// Create a ring-buffer stage from configured capacity and delay
    pub fn from_config(name: impl Into<String>, config: &PipelineConfig) -> Self {
        Self::new(name, config.buffer_capacity, config.release_delay())
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the per-item release delay
    pub fn release_delay(&self) -> Duration {
        self.release_delay
    }
}

impl<T: Send + 'static> Stage<T> for RingBufferStage {
    fn activate(&self, ctx: &StageContext, input: Stream<T>) -> Stream<T> {
        let (buffer_tx, buffer) = RingBuffer::new(self.capacity, self.release_delay);
        let (output, next) = stream();

        let feeder = StageRunner::new(
            self.name.as_str(),
            ctx.cancellation().clone(),
            input,
            buffer_tx,
            self.metrics.clone(),
        );
        ctx.spawn(format!("{} feeder", self.name), move || {
            feeder.run(Some);
        });

        let label = self.name.clone();
        let metrics = self.metrics.clone();
        ctx.spawn(format!("{} drain", self.name), move || {
            let released = buffer.drain_into(output, &metrics);
            debug!(stage = %label, released, "ring buffer drain finished");
        });

        next
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(PipelineError::Config(format!(
                "ring buffer stage '{}' needs a capacity of at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;

    #[test]
    fn test_buffer_is_fifo() {
        let (tx, buffer) = RingBuffer::new(4, Duration::ZERO);
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        drop(tx);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.utilization(), 100);

        let (out_tx, out_rx) = crossbeam::channel::unbounded();
        let released = buffer.drain_into(out_tx, &StageMetrics::new());
        assert_eq!(released, 4);
        assert_eq!(out_rx.iter().collect::<Vec<i32>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_full_buffer_blocks_writer() {
        let (tx, buffer) = RingBuffer::new(2, Duration::ZERO);
        assert!(tx.try_send(1).is_ok());
        assert!(tx.try_send(2).is_ok());
        assert!(tx.try_send(3).is_err());
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.utilization(), 100);
    }

    #[test]
    fn test_drain_stops_when_reader_drops() {
        let (tx, buffer) = RingBuffer::new(3, Duration::ZERO);
        for i in 0..3 {
            tx.send(i).unwrap();
        }
        drop(tx);

        let (out_tx, out_rx) = crossbeam::channel::unbounded::<i32>();
        drop(out_rx);
        assert_eq!(buffer.drain_into(out_tx, &StageMetrics::new()), 0);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let stage = RingBufferStage::new("ring", 0, Duration::ZERO);
        assert!(matches!(
            Stage::<i64>::validate(&stage),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_stage_spawns_feeder_and_drain() {
        let ctx = StageContext::new(CancellationToken::new());
        let stage = RingBufferStage::new("ring", 2, Duration::from_millis(1));
        let (input, rx) = stream::<i64>();
        let output = stage.activate(&ctx, rx);
        assert_eq!(ctx.worker_count(), 2);

        let producer = thread::spawn(move || {
            for v in 0..10 {
                input.send(v).unwrap();
            }
        });

        let values: Vec<i64> = output.iter().collect();
        producer.join().unwrap();
        ctx.join().unwrap();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
        assert_eq!(Stage::<i64>::metrics(&stage).total_released(), 10);
    }
}
