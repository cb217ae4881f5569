use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, trace};
use tracing_subscriber::EnvFilter;

use pod_node::config::{default_data_dir, CONFIG_FILE_NAME};
use pod_node::{bootstrap, BootstrapError, RawConfig, RunningCommand, TomlConfigWriter};

#[derive(Parser, Debug)]
#[command(name = "pod", version, about = "pod peer-to-peer node")]
struct Cli {
    /// Configuration file, defaults to pod.toml in the data directory
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    datadir: Option<PathBuf>,

    /// mainnet (m), testnet (t), regtestnet (r) or simnet (s)
    #[arg(long)]
    network: Option<String>,

    /// Pick free ports for every listener
    #[arg(long)]
    autoports: bool,

    /// Listen on every routable interface address
    #[arg(long)]
    autolisten: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Full node
    Node,
    /// Wallet server
    Wallet,
    /// Mining worker
    Kopach,
}

impl From<Command> for RunningCommand {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Node => RunningCommand::Node,
            Command::Wallet => RunningCommand::Wallet,
            Command::Kopach => RunningCommand::Kopach,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<RawConfig> {
    let path = match (&cli.config, &cli.datadir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => dir.join(CONFIG_FILE_NAME),
        (None, None) => default_data_dir().join(CONFIG_FILE_NAME),
    };
    let mut config = RawConfig::load(&path)?;
    config.apply_env_overrides();

    if let Some(dir) = &cli.datadir {
        config.set_data_dir(dir.clone());
    }
    if let Some(network) = &cli.network {
        config.network = network.clone();
    }
    if cli.autoports {
        config.auto_ports = true;
    }
    if cli.autolisten {
        config.auto_listen = true;
    }
    Ok(config)
}

fn init_logging(config_level: &str) {
    // POD_LOG, then RUST_LOG, then the configured level
    let filter = std::env::var("POD_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| config_level.to_string());
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pod: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);
    let command = RunningCommand::from(cli.command);
    info!(command = command.name(), version = env!("CARGO_PKG_VERSION"), "pod starting up");

    match serde_json::to_string_pretty(&config.redacted()) {
        Ok(dump) => trace!(config = %dump, "raw configuration"),
        Err(e) => trace!(err = %e, "could not render configuration"),
    }

    let ctx = match bootstrap(config, command, &TomlConfigWriter) {
        Ok(ctx) => ctx,
        Err(BootstrapError::Unrecoverable(e)) => {
            eprintln!("pod: unrecoverable configuration error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!(err = %e, "bootstrap failed");
            std::process::exit(1);
        }
    };

    info!(
        network = ctx.params.name,
        testnet = ctx.is_testnet,
        p2p = ?ctx.listeners.p2p,
        rpc = ?ctx.listeners.rpc,
        wallet_rpc = ?ctx.listeners.wallet_rpc,
        tls = ctx.tls.is_some(),
        min_relay_tx_fee = %ctx.min_relay_tx_fee,
        "node context ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(err = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
