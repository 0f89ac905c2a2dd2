//! Storage gateway binary.
//!
//! Configuration is layered: built-in defaults, then `SG_*` environment
//! variables, then command-line flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use storage_gateway::domain::config::ConfigError;
use storage_gateway::ports::ChainConnector;
use storage_gateway::{
    parse_decimal_u256, run_demo, GatewayConfig, GatewayService, RpcConnector, SimulatedChain,
};

#[derive(Debug, Parser)]
#[command(name = "storage-gateway", version, about)]
struct Args {
    /// Chain node host
    #[arg(long)]
    host: Option<String>,

    /// Chain node JSON-RPC port
    #[arg(long)]
    port: Option<u16>,

    /// HTTP listen port
    #[arg(long = "listen-port", alias = "listen_port")]
    listen_port: Option<u16>,

    /// Talk to the node over this IPC socket instead of HTTP
    #[arg(long)]
    ipc_path: Option<PathBuf>,

    /// Keystore v3 file used instead of the built-in account
    #[arg(long)]
    keystore: Option<PathBuf>,

    /// Keystore password
    #[arg(long, env = "SG_KEYSTORE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use the in-process simulated chain
    #[arg(long)]
    simulated: bool,

    /// Gas limit for deployment and set transactions
    #[arg(long)]
    gas_limit: Option<u64>,

    /// Serve /health and /metrics on the admin port
    #[arg(long)]
    admin: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP gateway (default)
    Serve,
    /// Deploy, set, get and summarize once, then exit
    Demo {
        /// Value to store
        #[arg(long, default_value = "100")]
        value: String,
    },
}

fn load_config(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    config.apply_env(|key| std::env::var(key).ok());

    if let Some(host) = &args.host {
        config.node.host = host.clone();
    }
    if let Some(port) = args.port {
        config.node.port = port;
    }
    if let Some(port) = args.listen_port {
        config.http.port = port;
    }
    if let Some(path) = &args.ipc_path {
        config.node.ipc_path = Some(path.clone());
    }
    if let Some(path) = &args.keystore {
        config.credential.keystore =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Keystore {
                path: path.clone(),
                reason: e.to_string(),
            })?;
    }
    if let Some(password) = &args.password {
        config.credential.password = password.clone();
    }
    if let Some(gas_limit) = args.gas_limit {
        config.contract.gas_limit = gas_limit;
    }
    config.node.simulated |= args.simulated;
    config.admin.enabled |= args.admin;

    Ok(config)
}

fn connector(config: &GatewayConfig) -> Arc<dyn ChainConnector> {
    if config.node.simulated {
        info!("Using simulated chain");
        Arc::new(SimulatedChain::new())
    } else {
        Arc::new(RpcConnector::new(config.timeouts.chain_call))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let config = load_config(&args).context("Failed to load configuration")?;
    let connector = connector(&config);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let service = GatewayService::new(config, connector)?;
            info!(version = storage_gateway::VERSION, "Storage gateway starting. Press Ctrl+C to stop.");
            service
                .run(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
        Command::Demo { value } => {
            let value = parse_decimal_u256(&value)
                .with_context(|| format!("Invalid demo value: {}", value))?;
            let service = GatewayService::new(config, connector)?;
            let report = run_demo(&service.context(), value).await?;
            info!(stored = %report.get, "Demo finished");
        }
    }

    Ok(())
}
