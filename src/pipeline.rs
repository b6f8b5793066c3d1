use crate::buffer::RingBufferStage;
use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::context::StageContext;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{FilterStage, MapStage, Stage};
use crate::stream::Stream;
use std::time::Duration;
use tracing::info;

/// Chain `stages` into one end-to-end stream.
///
/// The first stage reads `input`, every later stage reads the output of the
/// one before it, and the last stage's output is returned. All stages share
/// `ctx`'s cancellation token. Every stage is validated before any of them
/// is activated, so an invalid chain spawns no workers.
pub fn assemble<T: Send + 'static>(
    stages: &[Box<dyn Stage<T>>],
    ctx: &StageContext,
    input: Stream<T>,
) -> Result<Stream<T>> {
    let (first, rest) = stages.split_first().ok_or(PipelineError::NoStages)?;
    for stage in stages {
        stage.validate()?;
    }

    let mut pipe = first.activate(ctx, input);
    for stage in rest {
        pipe = stage.activate(ctx, pipe);
    }
    Ok(pipe)
}

/// Builder for constructing pipelines
pub struct PipelineBuilder<T> {
    stages: Vec<Box<dyn Stage<T>>>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append any stage
    pub fn add_stage(mut self, stage: impl Stage<T> + 'static) -> Self {
        info!(stage = stage.name(), position = self.stages.len(), "adding stage");
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a stage that keeps values matching `predicate`
    pub fn filter<F>(self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.add_stage(FilterStage::new(name, predicate))
    }

    /// Append a stage that transforms every value
    pub fn map<F>(self, name: impl Into<String>, mapper: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.add_stage(MapStage::new(name, mapper))
    }

    /// Append a ring-buffer stage
    pub fn ring_buffer(
        self,
        name: impl Into<String>,
        capacity: usize,
        release_delay: Duration,
    ) -> Self {
        self.add_stage(RingBufferStage::new(name, capacity, release_delay))
    }

    /// Append a ring-buffer stage sized from `config`
    pub fn ring_buffer_from_config(self, name: impl Into<String>, config: &PipelineConfig) -> Self {
        self.add_stage(RingBufferStage::from_config(name, config))
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline<T>> {
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        for stage in &self.stages {
            stage.validate()?;
        }
        Ok(Pipeline {
            stages: self.stages,
        })
    }
}

impl<T: Send + 'static> Default for PipelineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A non-empty, linear chain of stage templates.
///
/// A pipeline holds no running state; each [`Pipeline::run`] activates every
/// stage once against a fresh cancellation token.
pub struct Pipeline<T> {
    stages: Vec<Box<dyn Stage<T>>>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Activate every stage against `ctx`, reading from `input`
    pub fn activate(&self, ctx: &StageContext, input: Stream<T>) -> Result<Stream<T>> {
        assemble(&self.stages, ctx, input)
    }

    /// Start a run with its own cancellation token
    pub fn run(&self, input: Stream<T>) -> Result<RunningPipeline<T>> {
        self.run_with(CancellationToken::new(), input)
    }

    /// Start a run bound to an existing cancellation token
    pub fn run_with(
        &self,
        cancel: CancellationToken,
        input: Stream<T>,
    ) -> Result<RunningPipeline<T>> {
        let context = StageContext::new(cancel);
        let output = self.activate(&context, input)?;
        info!(
            stages = self.stages.len(),
            workers = context.worker_count(),
            "pipeline running"
        );
        Ok(RunningPipeline { output, context })
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: a built pipeline has at least one stage
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in chain order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Get metrics for a specific stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.stages.get(index).map(|s| s.metrics())
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (i, stage) in self.stages.iter().enumerate() {
            summary.push_str(&format!(
                "  Stage {} ({}): {}\n",
                i,
                stage.name(),
                stage.metrics().snapshot().format()
            ));
        }
        summary
    }
}

/// One activation of a pipeline
pub struct RunningPipeline<T> {
    output: Stream<T>,
    context: StageContext,
}

impl<T: Send + 'static> RunningPipeline<T> {
    /// The final stream of the chain
    pub fn output(&self) -> &Stream<T> {
        &self.output
    }

    /// The token shared by every stage of this run
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.context.cancellation()
    }

    /// Fire the run's cancellation signal
    pub fn cancel(&self) -> bool {
        self.context.cancellation().cancel()
    }

    /// Wait for every worker to exit on its own.
    ///
    /// The output stream is dropped first, so a drain with nobody reading
    /// stops instead of blocking. Workers still waiting on a live, open input
    /// keep running until that input closes; use [`RunningPipeline::shutdown`]
    /// to stop them.
    pub fn join(self) -> Result<()> {
        let RunningPipeline { output, context } = self;
        drop(output);
        context.join()
    }

    /// Cancel the run and wait for every worker to exit
    pub fn shutdown(self) -> Result<()> {
        self.cancel();
        self.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::PassthroughStage;
    use crate::stream::stream;

    #[test]
    fn test_pipeline_builder() {
        let pipeline = PipelineBuilder::<i64>::new()
            .filter("non-negative", |v| *v >= 0)
            .ring_buffer("ring", 5, Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.stage_names(), vec!["non-negative", "ring"]);
    }

    #[test]
    fn test_no_stages_error() {
        let result = PipelineBuilder::<i64>::new().build();
        assert!(matches!(result, Err(PipelineError::NoStages)));
    }

    #[test]
    fn test_assemble_empty_list() {
        let ctx = StageContext::new(CancellationToken::new());
        let (_tx, rx) = stream::<i64>();
        let result = assemble(&[], &ctx, rx);
        assert!(matches!(result, Err(PipelineError::NoStages)));
        assert_eq!(ctx.worker_count(), 0);
    }

    #[test]
    fn test_assemble_rejects_invalid_stage_before_spawning() {
        let stages: Vec<Box<dyn Stage<i64>>> = vec![
            Box::new(FilterStage::new("even", |v: &i64| v % 2 == 0)),
            Box::new(RingBufferStage::new("ring", 0, Duration::ZERO)),
        ];
        let ctx = StageContext::new(CancellationToken::new());
        let (_tx, rx) = stream::<i64>();

        let result = assemble(&stages, &ctx, rx);
        assert!(matches!(result, Err(PipelineError::Config(_))));
        assert_eq!(ctx.worker_count(), 0);
    }

    #[test]
    fn test_assemble_spawns_one_worker_per_stage() {
        let stages: Vec<Box<dyn Stage<i64>>> = vec![
            Box::new(PassthroughStage::new()),
            Box::new(FilterStage::new("even", |v: &i64| v % 2 == 0)),
            Box::new(RingBufferStage::new("ring", 3, Duration::ZERO)),
        ];
        let ctx = StageContext::new(CancellationToken::new());
        let (tx, rx) = stream();
        let output = assemble(&stages, &ctx, rx).unwrap();
        assert_eq!(ctx.worker_count(), 4);

        drop(tx);
        assert!(output.recv().is_err());
        ctx.join().unwrap();
    }

    #[test]
    fn test_invalid_ring_buffer_rejected() {
        let result = PipelineBuilder::<i64>::new()
            .ring_buffer("ring", 0, Duration::ZERO)
            .build();
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_metrics_summary_lists_stages() {
        let pipeline = PipelineBuilder::<i64>::new()
            .map("double", |v| v * 2)
            .build()
            .unwrap();
        let summary = pipeline.metrics_summary();
        assert!(summary.contains("Stage 0 (double)"));
        assert!(pipeline.stage_metrics(0).is_some());
        assert!(pipeline.stage_metrics(1).is_none());
    }
}
