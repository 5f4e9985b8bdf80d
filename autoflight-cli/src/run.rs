//! Daemon runner: connect the bridge, start the supervisor, wait for
//! Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use autoflight::{AircraftProfile, BridgeConfig, BridgeDaemon, QueueConfig, Supervisor, SyncBus};

/// Errors surfaced to the CLI user.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("profile: {0}")]
    Profile(#[from] autoflight::ProfileError),

    #[error("bridge: {0}")]
    Bridge(#[from] autoflight::BridgeError),

    #[error("runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Load the profile, connect, and run until interrupted.
pub fn run(
    bridge_url: String,
    profile_path: Option<PathBuf>,
    override_cooldown_secs: u64,
) -> Result<(), CliError> {
    let profile = match profile_path {
        Some(path) => {
            let profile = AircraftProfile::from_json_file(&path)?;
            info!(profile = %profile.name, path = %path.display(), "Profile loaded");
            profile
        }
        None => AircraftProfile::trainer(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let (daemon, handles) =
            BridgeDaemon::connect(&BridgeConfig::new(bridge_url.as_str())).await?;

        println!("Autoflight v{}", autoflight::VERSION);
        println!("Bridge:  {bridge_url}");
        println!("Profile: {}", profile.name);
        println!();

        let bridge_shutdown = CancellationToken::new();
        let bridge_task = tokio::spawn(daemon.run(bridge_shutdown.clone()));

        let queue_config = QueueConfig::default()
            .with_override_cooldown(Duration::from_secs(override_cooldown_secs));
        let supervisor = Supervisor::start(Arc::new(profile), queue_config, handles, SyncBus::new());

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received"),
            Err(err) => error!(%err, "Failed to listen for interrupt"),
        }

        supervisor.shutdown().await;
        bridge_shutdown.cancel();
        let _ = bridge_task.await;
        Ok(())
    })
}
