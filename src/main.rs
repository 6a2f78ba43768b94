use anyhow::Result;
use clap::Parser;
use perfwatch::{
    default_introspector, EnvReducedMotion, IntervalFrameClock, PerfEvent, PerformanceMetrics,
    PerformanceMonitor, PerfwatchConfig, QualityDirective, QualityProvider, ReducedMotionFlag,
    ReducedMotionSource,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "perfwatch")]
#[command(about = "Adaptive rendering performance monitor")]
#[command(version)]
#[command(long_about = "Drives the performance monitor from a synthetic render loop running at a \
fixed frame rate and reports the measured FPS, device tier and the resulting quality directive \
after every sampling window. Useful for tuning tier thresholds and scaling multipliers.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "perfwatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Frame rate of the synthetic render loop
    #[arg(long, default_value_t = 60.0, help = "Frames per second produced by the simulated renderer")]
    fps: f64,

    /// How long to run, in seconds (0 runs until Ctrl+C)
    #[arg(long, default_value_t = 10, help = "Run time in seconds, 0 to run until interrupted")]
    duration: u64,

    /// Baseline particle count fed to the quality provider
    #[arg(long, default_value_t = 1000)]
    base_particles: u32,

    /// Baseline animation duration in milliseconds
    #[arg(long, default_value_t = 300.0)]
    base_duration_ms: f64,

    /// Force the reduced motion preference on
    #[arg(long, help = "Treat the platform reduced-motion preference as set")]
    reduced_motion: bool,

    /// Emit one JSON object per sample instead of text
    #[arg(long)]
    json: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<String>,
}

/// One line of output per sampling window
#[derive(Debug, Serialize)]
struct Report {
    metrics: PerformanceMetrics,
    directive: QualityDirective,
    particles: u32,
    animation_ms: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting perfwatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match PerfwatchConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let reduced_motion: Arc<dyn ReducedMotionSource> = if args.reduced_motion {
        Arc::new(ReducedMotionFlag::new(true))
    } else {
        Arc::new(EnvReducedMotion::default())
    };

    let mut monitor = PerformanceMonitor::start(
        config,
        IntervalFrameClock::new(args.fps),
        default_introspector(),
        reduced_motion,
    )
    .await
    .map_err(|e| {
        error!("Failed to start monitor: {}", e);
        e
    })?;

    run(&args, &monitor).await?;

    monitor.stop().await;
    info!("perfwatch finished");
    Ok(())
}

/// Print a report per sample until the run time elapses or Ctrl+C arrives
async fn run(args: &Args, monitor: &PerformanceMonitor) -> Result<()> {
    let mut events = monitor.subscribe();
    let quality = monitor.quality();

    let deadline = async {
        if args.duration == 0 {
            std::future::pending::<()>().await
        } else {
            tokio::time::sleep(Duration::from_secs(args.duration)).await
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("Run time elapsed");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT signal (Ctrl+C)");
                break;
            }
            event = events.recv() => match event {
                Ok(PerfEvent::FpsSampled { .. }) => {
                    print_report(args, monitor.metrics(), &quality)?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    warn!("Report loop lagged behind by {} events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    Ok(())
}

fn print_report(args: &Args, metrics: PerformanceMetrics, quality: &QualityProvider) -> Result<()> {
    let report = Report {
        directive: quality.directive(),
        particles: quality.particle_count(args.base_particles),
        animation_ms: quality.animation_duration(args.base_duration_ms),
        metrics,
    };

    if args.json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }

    let memory = report
        .metrics
        .memory
        .map(|m| format!(" heap={:.1}MiB", m.used_bytes as f64 / (1024.0 * 1024.0)))
        .unwrap_or_default();

    println!(
        "{:>6.1} fps  tier={:<6} particles={:<6} animation={:.0}ms reduce_motion={}{}",
        report.metrics.fps.unwrap_or_default(),
        report.directive.tier,
        report.particles,
        report.animation_ms,
        report.directive.reduce_motion,
        memory
    );

    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("perfwatch={}", log_level)));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    // Logs go to stderr so stdout stays clean for reports
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };
    layers.push(fmt_layer);

    let guard = match args.log_file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Log file path has no file name: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Perfwatch Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Environment overrides use PERFWATCH_<SECTION>__<KEY>, e.g. PERFWATCH_TIERS__HIGH_FPS=55");
    println!();
    print!("{}", PerfwatchConfig::default().to_toml()?);
    Ok(())
}
