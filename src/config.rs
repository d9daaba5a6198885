use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::Level;

use crate::error::{Result, WatchError};
use crate::models::Target;
use crate::probe::api::DEFAULT_API_BASE;
use crate::probe::{query, tcp, CapacityPolicy};
use crate::store::DEFAULT_STATE_FILE;

#[derive(Debug, Parser)]
#[command(name = "status-watch")]
#[command(about = "Check a game server once and post to a webhook when its status changes")]
#[command(version)]
pub struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask the mcsrvstat.us status API
    Api(ApiArgs),
    /// Speak the Minecraft status protocol to the server directly
    Query(QueryArgs),
    /// Only check that a TCP port accepts connections
    Tcp(TcpArgs),
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Webhook that receives `{"content": "..."}` on every status change
    #[arg(long, env = "STATUS_WATCH_WEBHOOK_URL")]
    pub webhook_url: String,

    /// JSON file holding the last known status per server
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    pub state_file: PathBuf,
}

#[derive(Debug, Args)]
pub struct ApiArgs {
    /// Server hostname, optionally with `:port`
    #[arg(long)]
    pub address: String,

    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Server hostname, optionally with `:port`
    #[arg(long)]
    pub address: String,

    #[arg(long, default_value_t = query::default_timeout())]
    pub timeout_ms: u64,

    /// Count servers reporting zero max players as online
    #[arg(long)]
    pub ignore_zero_capacity: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct TcpArgs {
    #[arg(long)]
    pub ip: String,

    #[arg(long)]
    pub port: u16,

    #[arg(long, default_value_t = tcp::default_timeout())]
    pub timeout_ms: u64,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// How the target is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeConfig {
    Api {
        base_url: String,
    },
    Query {
        timeout_ms: u64,
        capacity: CapacityPolicy,
    },
    TcpPort {
        timeout_ms: u64,
    },
}

/// Everything one run needs, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub target: Target,
    pub webhook_url: String,
    pub state_path: PathBuf,
    pub probe: ProbeConfig,
}

impl MonitorConfig {
    pub fn from_command(command: Command) -> Result<Self> {
        let (target, probe, common) = match command {
            Command::Api(args) => (
                host_target(args.address)?,
                ProbeConfig::Api {
                    base_url: args.api_base,
                },
                args.common,
            ),
            Command::Query(args) => (
                host_target(args.address)?,
                ProbeConfig::Query {
                    timeout_ms: args.timeout_ms,
                    capacity: if args.ignore_zero_capacity {
                        CapacityPolicy::Ignore
                    } else {
                        CapacityPolicy::ZeroIsOffline
                    },
                },
                args.common,
            ),
            Command::Tcp(args) => {
                let ip = args.ip.trim().to_string();
                if ip.is_empty() {
                    return Err(WatchError::Config("--ip must not be empty".into()));
                }
                (
                    Target::Endpoint { ip, port: args.port },
                    ProbeConfig::TcpPort {
                        timeout_ms: args.timeout_ms,
                    },
                    args.common,
                )
            }
        };

        validate_webhook(&common.webhook_url)?;

        Ok(Self {
            target,
            webhook_url: common.webhook_url,
            state_path: common.state_file,
            probe,
        })
    }
}

fn host_target(address: String) -> Result<Target> {
    let address = address.trim();
    if address.is_empty() {
        return Err(WatchError::Config("--address must not be empty".into()));
    }
    Ok(Target::Host(address.to_string()))
}

fn validate_webhook(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| WatchError::Config(format!("invalid webhook URL {:?}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(WatchError::Config(format!(
            "webhook URL must be http or https, got {:?}",
            other
        ))),
    }
}
