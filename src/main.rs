mod keyboard;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use midiloom::{
    CancelToken, Clock, Composition, LogSink, MidirSink, Plan, PlayerConfig, Scheduler, Session,
    SessionReport, SinkHandle, SystemClock, VirtualClock, list_output_ports,
};
use tracing::{info, warn};

use keyboard::{KeyListener, TerminalWriter};

/// Play generated note sequences through a MIDI output
#[derive(Parser)]
#[command(name = "midiloom")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available MIDI output ports
    Ports(PortsArgs),

    /// Play a composition (Esc, q or Ctrl-C to stop)
    Play(PlayArgs),

    /// Build a composition's timeline and print a summary without playing
    Check(CheckArgs),
}

#[derive(Args)]
struct PortsArgs {
    /// Player config (RON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct PlayArgs {
    /// Composition file (RON)
    composition: PathBuf,

    /// Output port index or name substring
    #[arg(short, long)]
    port: Option<String>,

    /// Player config (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print messages instead of sending them, without waiting
    #[arg(long)]
    dry_run: bool,

    /// Number of passes; 0 repeats until stopped
    #[arg(long, default_value_t = 1)]
    loops: u32,
}

#[derive(Args)]
struct CheckArgs {
    /// Composition file (RON)
    composition: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(|| TerminalWriter(io::stderr()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ports(args) => ports(args),
        Commands::Play(args) => play(args),
        Commands::Check(args) => check(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<PlayerConfig> {
    match path {
        Some(path) => PlayerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PlayerConfig::default()),
    }
}

fn load_composition(path: &Path) -> Result<Composition> {
    Composition::load(path)
        .with_context(|| format!("Failed to load composition {}", path.display()))
}

fn ports(args: PortsArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let names = list_output_ports(&config.client_name)?;

    if names.is_empty() {
        println!("No MIDI output ports found.");
        return Ok(());
    }

    println!("Available MIDI outputs:");
    for (i, name) in names.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    Ok(())
}

fn check(args: CheckArgs) -> Result<()> {
    let composition = load_composition(&args.composition)?;
    let session = Session::from_composition(&composition)?;
    let timeline = session.timeline();
    let plan = Plan::build(timeline);

    println!("{} ({} bpm)", composition.name, composition.bpm);
    for part in &composition.parts {
        let program = part
            .program
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!("  {:<12} channel {:>2}  program {:>3}", part.name, part.channel, program);
    }
    println!("Notes:     {}", timeline.len());
    println!("Messages:  {}", plan.len());
    println!("Deferred:  {}", plan.deferred);
    println!("Duration:  {:.2}s", timeline.duration());
    Ok(())
}

fn play(args: PlayArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.port.is_some() {
        config.port = args.port;
    }

    let composition = load_composition(&args.composition)?;
    info!("Loaded '{}'", composition.name);

    if args.dry_run {
        // a virtual clock never waits, so an endless dry run would never end
        let loops = args.loops.max(1);
        let session = Session::from_composition(&composition)?.loops(loops);
        let clock = VirtualClock::new();
        let sink = SinkHandle::new(LogSink::with_clock(clock.clone()));
        let mut scheduler = scheduler_for(clock, &config);
        let report = session.run(&mut scheduler, &sink, &CancelToken::new())?;
        summarize(&report);
        return Ok(());
    }

    let session = Session::from_composition(&composition)?.loops(args.loops);
    let sink = MidirSink::connect(&config.client_name, config.port.as_deref())?;
    info!("Output: {}", sink.port_name());
    let sink = SinkHandle::new(sink);

    let cancel = CancelToken::new();
    let listener = match KeyListener::spawn(cancel.clone()) {
        Ok(listener) => Some(listener),
        Err(e) => {
            warn!("Keyboard control unavailable: {}", e);
            None
        }
    };

    let mut scheduler = scheduler_for(SystemClock::new(), &config);
    let result = session.run(&mut scheduler, &sink, &cancel);
    drop(listener);

    sink.into_inner().close();
    summarize(&result?);
    Ok(())
}

fn scheduler_for<C: Clock>(clock: C, config: &PlayerConfig) -> Scheduler<C> {
    Scheduler::with_clock(clock)
        .retry_delay(config.retry_delay())
        .panic_on_cancel(config.panic_on_cancel)
}

fn summarize(report: &SessionReport) {
    let dropped = report.dropped();
    info!(
        "{} after {} pass(es), {:.2}s: {} messages sent, {} retried, {} dropped",
        if report.cancelled { "Stopped" } else { "Done" },
        report.passes,
        report.elapsed.as_secs_f64(),
        report.dispatched,
        report.warnings.len() - dropped,
        dropped
    );
}
