//! A cancellable, multi-stage filtering pipeline built on threads and channels.
//!
//! Each stage runs on its own worker thread, reading from one stream and
//! writing to the next. All stages of a run share one cancellation token; a
//! stage stops either when its input closes or when the token fires, and
//! closes its output on the way out, so closure propagates down the chain.
//! The terminal ring-buffer stage decouples arrival rate from release rate
//! with a bounded FIFO and a fixed per-item delay, and flushes what it has
//! buffered even after cancellation.
//!
//! # Features
//!
//! - Unbuffered crossbeam channels as single-producer, single-consumer streams
//! - One-shot broadcast cancellation usable inside `select!`
//! - Filter, map and passthrough stages from a single `Stage` trait
//! - Bounded ring-buffer stage with a separate feeder and drain
//! - Per-stage counters
//!
//! # Example
//!
//! ```no_run
//! use staged_pipeline::{stream, PipelineBuilder};
//! use std::time::Duration;
//!
//! let pipeline = PipelineBuilder::<i64>::new()
//!     .filter("non-negative", |v| *v >= 0)
//!     .filter("multiple of three", |v| *v != 0 && v % 3 == 0)
//!     .ring_buffer("ring buffer", 5, Duration::from_millis(100))
//!     .build()?;
//!
//! let (input, source) = stream();
//! let running = pipeline.run(source)?;
//!
//! std::thread::spawn(move || {
//!     for v in [-3, -2, 0, 3, 4, 6, 9] {
//!         input.send(v).ok();
//!     }
//! });
//!
//! let output: Vec<i64> = running.output().iter().collect();
//! assert_eq!(output, vec![3, 6, 9]);
//! running.join()?;
//! # Ok::<(), staged_pipeline::PipelineError>(())
//! ```

pub mod buffer;
pub mod cancel;
pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod stage;
pub mod stream;

// Re-exports for convenience
pub use buffer::RingBufferStage;
pub use cancel::CancellationToken;
pub use config::PipelineConfig;
pub use console::{spawn_line_source, ConsoleSink};
pub use context::StageContext;
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{assemble, Pipeline, PipelineBuilder, RunningPipeline};
pub use stage::{make_stage, FilterStage, MapStage, PassthroughStage, Stage, StageRunner, WorkerExit};
pub use stream::{stream, Stream, StreamSender};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
