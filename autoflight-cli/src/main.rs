//! Autoflight CLI - runs the flight-control supervisor against a
//! simulator bridge.

mod run;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Autonomous flight-control supervisor for flight simulators.
#[derive(Debug, Parser)]
#[command(name = "autoflight", version = autoflight::VERSION)]
struct Args {
    /// WebSocket URL of the simulator bridge.
    #[arg(long, default_value = "ws://127.0.0.1:8765")]
    bridge_url: String,

    /// Path to an aircraft profile JSON file (built-in trainer profile
    /// when omitted).
    #[arg(long)]
    profile: Option<std::path::PathBuf>,

    /// Pilot-override cooldown in seconds.
    #[arg(long, default_value_t = 30)]
    override_cooldown_secs: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(error) = run::run(args.bridge_url, args.profile, args.override_cooldown_secs) {
        eprintln!("autoflight: {error}");
        std::process::exit(1);
    }
}
