//! Reads integers from stdin, keeps the positive multiples of three and
//! prints them through a delayed ring buffer.
//!
//! Usage: staged-pipeline [--capacity N] [--delay-ms MS]
//!        (type one integer per line; any other line ends the input)

use anyhow::Result;
use clap::Parser;
use staged_pipeline::{
    spawn_line_source, CancellationToken, ConsoleSink, PipelineBuilder, PipelineConfig, StageContext,
};
use std::io::{self, BufReader};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ring buffer capacity (overrides the config file)
    #[arg(long)]
    capacity: Option<usize>,

    /// Per-item release delay in milliseconds (overrides the config file)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config = config.with_buffer_capacity(capacity);
    }
    if let Some(delay_ms) = args.delay_ms {
        config = config.with_release_delay_ms(delay_ms);
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("staged_pipeline={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = load_config(&args)?;
    info!(?config, "starting pipeline");

    let pipeline = PipelineBuilder::<i64>::new()
        .filter("drop negative values", |v| *v >= 0)
        .filter("keep non-zero multiples of three", |v| *v != 0 && v % 3 == 0)
        .ring_buffer_from_config("ring buffer", &config)
        .build()?;

    let ctx = StageContext::new(CancellationToken::new());
    let source = spawn_line_source(BufReader::new(io::stdin()), &ctx);
    let output = pipeline.activate(&ctx, source)?;

    let mut sink = ConsoleSink::new(io::stdout().lock());
    sink.drain(&output)?;

    ctx.cancellation().cancel();
    drop(output);
    ctx.join()?;

    info!("{}", pipeline.metrics_summary().trim_end());
    Ok(())
}
