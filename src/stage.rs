use crate::cancel::CancellationToken;
use crate::context::StageContext;
use crate::error::Result;
use crate::metrics::StageMetrics;
use crate::stream::{stream, Stream, StreamSender};
use crossbeam::channel::select;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// A pipeline stage template.
///
/// A stage holds no running state. Activating it binds it to the run's
/// context and a concrete input stream, spawns its worker(s) and returns the
/// freshly allocated output stream without waiting for any value. Activating
/// the same template twice yields two independent workers and streams.
pub trait Stage<T>: Send + Sync {
    /// Start the stage's worker(s) reading from `input`
    fn activate(&self, ctx: &StageContext, input: Stream<T>) -> Stream<T>;

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }

    /// Counters shared by every activation of this template
    fn metrics(&self) -> &StageMetrics;

    /// Check the stage's settings before the pipeline is built
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Why a stage worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The cancellation signal fired
    Cancelled,
    /// The input stream closed and was fully drained
    InputClosed,
    /// The reader of the output stream went away
    OutputClosed,
}

/// Runs one stage worker: pulls from the input stream, applies a step to each
/// value and pushes whatever the step keeps to the output stream.
pub struct StageRunner<T> {
    label: String,
    cancel: CancellationToken,
    input: Stream<T>,
    output: StreamSender<T>,
    metrics: StageMetrics,
}

impl<T: Send> StageRunner<T> {
    /// Create a new stage runner
    pub fn new(
        label: impl Into<String>,
        cancel: CancellationToken,
        input: Stream<T>,
        output: StreamSender<T>,
        metrics: StageMetrics,
    ) -> Self {
        Self {
            label: label.into(),
            cancel,
            input,
            output,
            metrics,
        }
    }

    /// Run the worker loop until cancellation, input closure or output
    /// closure. The output stream is closed on every path.
    ///
    /// `step` returns `Some` to forward a value and `None` to discard it.
    pub fn run<F>(self, mut step: F) -> WorkerExit
    where
        F: FnMut(T) -> Option<T>,
    {
        let StageRunner {
            label,
            cancel,
            input,
            output,
            metrics,
        } = self;
        let signal = cancel.signal();

        let exit = 'run: loop {
            select! {
                recv(signal) -> _ => break 'run WorkerExit::Cancelled,
                recv(input) -> msg => {
                    let value = match msg {
                        Ok(value) => value,
                        Err(_) => break 'run WorkerExit::InputClosed,
                    };
                    // Both arms may be ready at once; cancellation wins.
                    if cancel.is_cancelled() {
                        break 'run WorkerExit::Cancelled;
                    }
                    metrics.record_received();
                    trace!(stage = %label, "filtering value");

                    match step(value) {
                        Some(value) => {
                            if cancel.is_cancelled() {
                                break 'run WorkerExit::Cancelled;
                            }
                            select! {
                                send(output, value) -> sent => match sent {
                                    Ok(()) => metrics.record_forwarded(),
                                    Err(_) => break 'run WorkerExit::OutputClosed,
                                },
                                recv(signal) -> _ => break 'run WorkerExit::Cancelled,
                            }
                        }
                        None => metrics.record_discarded(),
                    }
                },
            }
        };

        drop(output);
        debug!(stage = %label, reason = ?exit, "stage worker finished");
        exit
    }
}

/// Spawn a runner for `input` on the context and return its output stream
fn spawn_runner<T, F>(
    ctx: &StageContext,
    label: &str,
    metrics: &StageMetrics,
    input: Stream<T>,
    step: F,
) -> Stream<T>
where
    T: Send + 'static,
    F: FnMut(T) -> Option<T> + Send + 'static,
{
    let (output, next) = stream();
    let runner = StageRunner::new(
        label,
        ctx.cancellation().clone(),
        input,
        output,
        metrics.clone(),
    );
    ctx.spawn(label, move || {
        runner.run(step);
    });
    next
}

/// A filtering stage that passes through values matching a predicate
pub struct FilterStage<F> {
    name: String,
    predicate: Arc<F>,
    metrics: StageMetrics,
}

impl<F> FilterStage<F> {
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        let name = name.into();
        info!(stage = %name, "creating filter stage");
        Self {
            name,
            predicate: Arc::new(predicate),
            metrics: StageMetrics::new(),
        }
    }
}

impl<T, F> Stage<T> for FilterStage<F>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    fn activate(&self, ctx: &StageContext, input: Stream<T>) -> Stream<T> {
        let predicate = Arc::clone(&self.predicate);
        spawn_runner(ctx, &self.name, &self.metrics, input, move |value| {
            predicate(&value).then_some(value)
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

/// Build a filter stage bound to a named predicate
pub fn make_stage<T, F>(name: impl Into<String>, predicate: F) -> FilterStage<F>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    FilterStage::new(name, predicate)
}

/// A mapping stage that transforms each value
pub struct MapStage<F> {
    name: String,
    mapper: Arc<F>,
    metrics: StageMetrics,
}

impl<F> MapStage<F> {
    /// Create a new map stage
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        let name = name.into();
        info!(stage = %name, "creating map stage");
        Self {
            name,
            mapper: Arc::new(mapper),
            metrics: StageMetrics::new(),
        }
    }
}

impl<T, F> Stage<T> for MapStage<F>
where
    T: Send + 'static,
    F: Fn(T) -> T + Send + Sync + 'static,
{
    fn activate(&self, ctx: &StageContext, input: Stream<T>) -> Stream<T> {
        let mapper = Arc::clone(&self.mapper);
        spawn_runner(ctx, &self.name, &self.metrics, input, move |value| {
            Some(mapper(value))
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}

/// A stage that forwards every value unchanged
#[derive(Debug, Default)]
pub struct PassthroughStage {
    metrics: StageMetrics,
}

impl PassthroughStage {
    /// Create a new passthrough stage
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + 'static> Stage<T> for PassthroughStage {
    fn activate(&self, ctx: &StageContext, input: Stream<T>) -> Stream<T> {
        spawn_runner(ctx, "passthrough", &self.metrics, input, Some)
    }

    fn name(&self) -> &str {
        "passthrough"
    }

    fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }
}
