use chronogo_cli::{load, repl::Repl};
use chronogo_debugger::DebugSession;
use chronogo_recorder::Event;
use chronogo_replay::Replayer;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chrono")]
#[command(about = "ChronoGo Time-Travel Debugger", long_about = None)]
struct Cli {
    /// Path to the events file
    #[arg(long, short, default_value = "chronogo.events")]
    events: PathBuf,

    /// Run in replay mode only (no execution)
    #[arg(long)]
    replay: bool,

    /// Target program to debug (ignored with --replay)
    target: Option<PathBuf>,
}

fn init_telemetry() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chronogo=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_telemetry();

    // Argument misuse exits 2 via clap before we get here.
    let cli = Cli::parse();

    println!("ChronoGo Time-Travel Debugger");
    println!("-----------------------------");

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("chrono: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.replay {
        anyhow::ensure!(
            cli.events.exists(),
            "cannot find events file '{}' for replay",
            cli.events.display()
        );
        replay_from(&cli.events)?;
        return Ok(ExitCode::SUCCESS);
    }

    // A populated events file takes precedence over launching a target:
    // the recording already happened, so go straight to replay. An empty
    // or all-garbage file is treated like a missing one.
    if cli.events.exists() {
        println!("Found events file: {}", cli.events.display());
        let events = load::load_events(&cli.events)?;
        if !events.is_empty() {
            enter_replay(events)?;
            return Ok(ExitCode::SUCCESS);
        }
        println!("Events file exists but contains no valid events.");
    }

    match &cli.target {
        Some(target) => {
            // The live-debugger adapter is an external collaborator; the
            // core ships without one. Without a recording there is nothing
            // to drive.
            anyhow::bail!(
                "no recorded events at '{}'; record '{}' with an instrumented build first",
                cli.events.display(),
                target.display()
            )
        }
        None => {
            // No recording and no target is operator misuse.
            eprintln!(
                "chrono: no recorded events at '{}' and no target given; see 'chrono --help'",
                cli.events.display()
            );
            Ok(ExitCode::from(2))
        }
    }
}

fn replay_from(path: &std::path::Path) -> anyhow::Result<()> {
    println!("Loading events from: {}", path.display());
    let events = load::load_events(path)?;
    anyhow::ensure!(!events.is_empty(), "no events found in '{}'", path.display());
    enter_replay(events)
}

fn enter_replay(events: Vec<Event>) -> anyhow::Result<()> {
    println!("Loaded {} events. Entering replay mode...", events.len());

    let mut replayer = Replayer::new();
    replayer.load(events);
    let session = DebugSession::new(replayer);

    let mut repl = Repl::new(session);
    repl.run()?;
    Ok(())
}
