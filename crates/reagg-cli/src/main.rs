//! reagg CLI - Command line interface for reactive sliding-window aggregation

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use reagg_runtime::aggregation::Count;
use reagg_runtime::{
    AggregatorConfig, ConsoleSink, Event, EventGenerator, EventId, FileSink, GeneratorMode,
    MultiSink, Operator, OperatorKind, ReactiveAggregator, ResultSink, WindowError,
    WindowedAggregation,
};

use reagg_cli::config::{Config, LoggingConfig, OutputConfig};
use reagg_cli::{describe_operator, ConfiguredOperator};

#[derive(Parser)]
#[command(name = "reagg")]
#[command(version)]
#[command(
    about = "reagg - Reactive sliding-window aggregation over a flat aggregation tree",
    long_about = None
)]
struct Cli {
    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, global = true, env = "REAGG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a generated event stream over a sliding window
    Run {
        /// Aggregation operator (count, sum, avg, min, max, arg_max)
        #[arg(short, long)]
        operator: Option<OperatorKind>,

        /// Field to aggregate
        #[arg(short, long)]
        field: Option<String>,

        /// Window size in milliseconds
        #[arg(long)]
        size_ms: Option<u64>,

        /// Slide interval in milliseconds
        #[arg(long)]
        slide_ms: Option<u64>,

        /// Generated events per second
        #[arg(long)]
        rate: Option<u32>,

        /// Generator mode (random, incremental)
        #[arg(long)]
        mode: Option<GeneratorMode>,

        /// Generator seed
        #[arg(long)]
        seed: Option<u64>,

        /// Run time in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Append results as JSON lines to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a short demo with a small, fast-sliding window
    Demo {
        /// Duration in seconds (default: 10)
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Aggregation operator
        #[arg(short, long, default_value = "avg")]
        operator: OperatorKind,
    },

    /// Print the aggregation tree after a few inserts and evictions as Graphviz
    Dot {
        /// Events to insert
        #[arg(long, default_value = "6")]
        events: usize,

        /// Oldest events to evict afterwards
        #[arg(long, default_value = "2")]
        evict: usize,
    },

    /// Generate example configuration file
    ConfigGen {
        /// Output format (yaml, toml)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Run {
            operator,
            field,
            size_ms,
            slide_ms,
            rate,
            mode,
            seed,
            duration,
            json,
            output,
        } => {
            if let Some(operator) = operator {
                config.aggregator.operator = operator;
            }
            if let Some(field) = field {
                config.aggregator.field = field;
            }
            if let Some(size_ms) = size_ms {
                config.window.size_ms = size_ms;
            }
            if let Some(slide_ms) = slide_ms {
                config.window.slide_ms = slide_ms;
            }
            if let Some(rate) = rate {
                config.generator.events_per_second = rate;
            }
            if let Some(mode) = mode {
                config.generator.mode = mode;
            }
            if seed.is_some() {
                config.generator.seed = seed;
            }
            if let Some(duration) = duration {
                config.generator.duration_secs = duration;
            }
            if json {
                config.output.format = "json".to_string();
            }
            if output.is_some() {
                config.output.file = output;
            }
            config.validate()?;
            init_logging(&config.logging)?;

            run(&config).await?;
        }

        Commands::Demo { duration, operator } => {
            config.window.size_ms = 2_000;
            config.window.slide_ms = 500;
            config.aggregator.operator = operator;
            config.generator.events_per_second = 200;
            config.generator.mode = GeneratorMode::Incremental;
            config.generator.duration_secs = duration;
            config.validate()?;
            init_logging(&config.logging)?;

            println!("reagg sliding-window demo");
            println!("=========================");
            println!("Operator: {}", describe_operator(&config.aggregator));
            println!(
                "Window: {} ms, sliding every {} ms",
                config.window.size_ms, config.window.slide_ms
            );
            println!(
                "Input: {} events/s ({}) for {} seconds",
                config.generator.events_per_second, config.generator.mode, duration
            );
            println!();

            run(&config).await?;
        }

        Commands::Dot { events, evict } => {
            config.validate()?;
            init_logging(&config.logging)?;
            let aggregator = ReactiveAggregator::new(
                Count,
                AggregatorConfig {
                    initial_capacity: config.aggregator.initial_capacity,
                    min_capacity: config.aggregator.min_capacity,
                },
            )?;

            let ids: Vec<EventId> = (0..events).map(|_| EventId::new()).collect();
            for (k, id) in ids.iter().enumerate() {
                let event = Event::new("Sample").with_field("value", k as i64);
                aggregator.on_insert(&event, *id)?;
            }
            for id in ids.iter().take(evict) {
                aggregator.on_evict(*id)?;
            }
            println!("{}", aggregator.to_dot());
        }

        Commands::ConfigGen { format, output } => {
            let content = match format.to_lowercase().as_str() {
                "yaml" | "yml" => Config::example_yaml(),
                "toml" => Config::example_toml(),
                _ => anyhow::bail!("Unsupported format: {}. Use 'yaml' or 'toml'", format),
            };

            if let Some(path) = output {
                std::fs::write(&path, &content)?;
                println!("Configuration written to: {}", path.display());
            } else {
                println!("{}", content);
            }
        }
    }

    Ok(())
}

/// Install the global tracing subscriber described by `config`.
///
/// Logs go to stderr so stdout only carries window results.
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown log level: {}", config.level))?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn build_sink(output: &OutputConfig) -> Result<Arc<dyn ResultSink>> {
    let console = if output.format == "json" {
        ConsoleSink::new("console").compact()
    } else {
        ConsoleSink::new("console")
    };

    match &output.file {
        Some(path) => {
            let file = FileSink::new("file", path.clone())?;
            info!("Writing results to {}", path.display());
            Ok(Arc::new(
                MultiSink::new("output")
                    .add(Box::new(console))
                    .add(Box::new(file)),
            ))
        }
        None => Ok(Arc::new(console)),
    }
}

async fn run(config: &Config) -> Result<()> {
    let sink = build_sink(&config.output)?;
    match ConfiguredOperator::from_section(&config.aggregator) {
        ConfiguredOperator::Count(op) => run_pipeline(op, config, sink).await,
        ConfiguredOperator::Sum(op) => run_pipeline(op, config, sink).await,
        ConfiguredOperator::Avg(op) => run_pipeline(op, config, sink).await,
        ConfiguredOperator::Min(op) => run_pipeline(op, config, sink).await,
        ConfiguredOperator::Max(op) => run_pipeline(op, config, sink).await,
        ConfiguredOperator::ArgMax(op) => run_pipeline(op, config, sink).await,
    }
}

/// Feed generated events into a windowed aggregation until the configured
/// duration elapses, the generator stops, or Ctrl-C.
async fn run_pipeline<O: Operator>(
    operator: O,
    config: &Config,
    sink: Arc<dyn ResultSink>,
) -> Result<()> {
    let pipeline = WindowedAggregation::start(operator, config.pipeline(), sink)?;
    let mut generator = EventGenerator::new(config.generator());
    let (event_tx, mut event_rx) = mpsc::channel(1000);
    let producer = tokio::spawn(async move { generator.run(event_tx, None).await });

    let started = Instant::now();
    let deadline = tokio::time::sleep(Duration::from_secs(config.generator.duration_secs));
    tokio::pin!(deadline);

    let mut inserted = 0u64;
    let mut bus_closed = false;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, shutting down");
                break;
            }
            event = event_rx.recv() => match event {
                Some(event) => match pipeline.insert(event).await {
                    Ok(_) => inserted += 1,
                    Err(WindowError::BusClosed) => {
                        bus_closed = true;
                        break;
                    }
                    Err(e) => return Err(e.into()),
                },
                None => break,
            }
        }
    }

    // Dropping the receiver stops the generator at its next send.
    drop(event_rx);
    let generated = producer.await?;

    if bus_closed {
        // Prefer the worker's error over the bus error.
        pipeline.shutdown().await?;
        anyhow::bail!("Aggregator worker stopped after {} inserts", inserted);
    }

    let stats = pipeline.aggregator().stats();
    let summary = pipeline.shutdown().await?;
    let elapsed = started.elapsed();

    info!(
        "Generated {} events, inserted {} in {:.1}s",
        generated,
        inserted,
        elapsed.as_secs_f64()
    );
    println!();
    println!(
        "Processed {} inserts, {} evictions, {} triggers in {:.1}s ({:.0} events/s)",
        summary.inserts,
        summary.evictions,
        summary.triggers,
        elapsed.as_secs_f64(),
        inserted as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!(
        "Buffer: capacity {}, {} live, {} resizes, {} compactions, {} shrinks",
        stats.capacity, stats.num_tuples, stats.resizes, stats.compactions, stats.shrinks
    );
    Ok(())
}
