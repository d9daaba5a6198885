//! One-shot game server status watcher, meant to be run from a scheduler.

pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod models;
pub mod notifier;
pub mod probe;
pub mod store;

pub use config::{Cli, MonitorConfig};
pub use engine::{CheckOutcome, Monitor};
pub use error::{Result, WatchError};

/// Run a single check cycle for the configured target.
pub async fn run(config: &MonitorConfig) -> Result<CheckOutcome> {
    tracing::debug!(
        "Checking {} with {:?}, state file {}",
        config.target,
        config.probe,
        config.state_path.display()
    );
    Monitor::from_config(config)?.check().await
}
