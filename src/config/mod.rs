//! Node Configuration
//!
//! The raw, operator-supplied configuration the bootstrap pipeline consumes.
//! It is loaded from a TOML file, overlaid with environment variables, and
//! written back when the pipeline decides the resolved values must persist.

pub mod amount;

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "pod.toml";

/// Every flag the bootstrap pipeline reads. The pipeline takes ownership and
/// only rewrites listener lists and a handful of disable flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Network token: mainnet, testnet, regtestnet, simnet or an alias
    pub network: String,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,

    /// LAN test mode (no public discovery)
    pub lan: bool,
    /// Solo mining test mode
    pub solo: bool,

    pub client_tls: bool,
    pub server_tls: bool,
    /// Generate a fresh key each start instead of requiring one on disk
    pub one_time_tls_key: bool,
    pub rpc_cert: PathBuf,
    pub rpc_key: PathBuf,
    pub ca_file: PathBuf,

    /// Port for the profiling HTTP server, empty when disabled
    pub profile: String,

    /// Peers to try in addition to discovered ones
    pub add_peers: Vec<String>,
    /// Peers to connect to exclusively
    pub connect_peers: Vec<String>,

    pub p2p_listeners: Vec<String>,
    pub p2p_connect: Vec<String>,
    pub rpc_listeners: Vec<String>,
    pub wallet_rpc_listeners: Vec<String>,

    pub disable_listen: bool,
    pub disable_dns_seed: bool,
    pub disable_rpc: bool,

    pub relay_non_std: bool,
    pub reject_non_std: bool,

    pub username: String,
    pub password: String,
    pub limit_user: String,
    pub limit_pass: String,

    pub user_agent_comments: Vec<String>,
    pub min_relay_tx_fee: String,
    pub rpc_max_concurrent_reqs: i64,

    /// Derive P2P listeners from the host's routable interfaces
    pub auto_listen: bool,
    /// Replace every listener port with a free kernel-assigned port
    pub auto_ports: bool,

    pub proxy_address: String,
    pub proxy_user: String,
    pub proxy_pass: String,
    pub onion_proxy_address: String,
    pub onion_proxy_user: String,
    pub onion_proxy_pass: String,
    pub tor_isolation: bool,
    pub onion_enabled: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            network: "mainnet".to_string(),
            config_file: data_dir.join(CONFIG_FILE_NAME),
            log_dir: data_dir.clone(),
            log_level: "info".to_string(),
            lan: false,
            solo: false,
            client_tls: false,
            server_tls: false,
            one_time_tls_key: false,
            rpc_cert: data_dir.join("rpc.cert"),
            rpc_key: data_dir.join("rpc.key"),
            ca_file: data_dir.join("ca.cert"),
            profile: String::new(),
            add_peers: Vec::new(),
            connect_peers: Vec::new(),
            p2p_listeners: vec!["0.0.0.0:11047".to_string()],
            p2p_connect: Vec::new(),
            rpc_listeners: vec!["127.0.0.1:11048".to_string()],
            wallet_rpc_listeners: vec!["127.0.0.1:11046".to_string()],
            disable_listen: false,
            disable_dns_seed: false,
            disable_rpc: false,
            relay_non_std: false,
            reject_non_std: false,
            username: String::new(),
            password: String::new(),
            limit_user: String::new(),
            limit_pass: String::new(),
            user_agent_comments: Vec::new(),
            min_relay_tx_fee: "0.00001".to_string(),
            rpc_max_concurrent_reqs: 20,
            auto_listen: false,
            auto_ports: false,
            proxy_address: String::new(),
            proxy_user: String::new(),
            proxy_pass: String::new(),
            onion_proxy_address: String::new(),
            onion_proxy_user: String::new(),
            onion_proxy_pass: String::new(),
            tor_isolation: false,
            onion_enabled: true,
            data_dir,
        }
    }
}

impl RawConfig {
    /// Defaults rooted at `data_dir` instead of the platform data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            config_file: data_dir.join(CONFIG_FILE_NAME),
            log_dir: data_dir.clone(),
            rpc_cert: data_dir.join("rpc.cert"),
            rpc_key: data_dir.join("rpc.key"),
            ca_file: data_dir.join("ca.cert"),
            data_dir,
            ..Self::default()
        }
    }

    /// Load from a TOML file. A missing file yields defaults pointing at it,
    /// so the pipeline will later write it out.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            let mut config = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => Self::with_data_dir(dir),
                _ => Self::default(),
            };
            config.config_file = path.to_path_buf();
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let mut config: RawConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config {}: {}", path.display(), e))?;
        config.config_file = path.to_path_buf();

        tracing::info!(path = %path.display(), network = %config.network, "Loaded configuration");
        Ok(config)
    }

    /// Move to another data directory. Paths that lived under the old one
    /// (TLS files, log dir) follow; paths configured elsewhere are kept.
    pub fn set_data_dir(&mut self, data_dir: impl Into<PathBuf>) {
        let data_dir = data_dir.into();
        let old = std::mem::replace(&mut self.data_dir, data_dir.clone());
        for path in [
            &mut self.rpc_cert,
            &mut self.rpc_key,
            &mut self.ca_file,
            &mut self.log_dir,
        ] {
            if let Ok(rest) = path.strip_prefix(&old) {
                let moved = data_dir.join(rest);
                *path = moved;
            }
        }
    }

    /// Overlay selected settings from the environment.
    pub fn apply_env_overrides(&mut self) {
        // POD_NETWORK
        if let Ok(val) = env::var("POD_NETWORK") {
            self.network = val.trim().to_string();
        }

        // POD_PROXY
        if let Ok(val) = env::var("POD_PROXY") {
            self.proxy_address = val.trim().to_string();
        }

        // POD_ONION_PROXY
        if let Ok(val) = env::var("POD_ONION_PROXY") {
            self.onion_proxy_address = val.trim().to_string();
        }

        // POD_AUTOPORTS
        if let Ok(val) = env::var("POD_AUTOPORTS") {
            self.auto_ports = env_flag(&val);
        }

        // POD_AUTOLISTEN
        if let Ok(val) = env::var("POD_AUTOLISTEN") {
            self.auto_listen = env_flag(&val);
        }
    }

    /// Copy safe for logging: credentials are masked.
    pub fn redacted(&self) -> Self {
        let mask = |s: &str| {
            if s.is_empty() {
                String::new()
            } else {
                "********".to_string()
            }
        };
        Self {
            password: mask(&self.password),
            limit_pass: mask(&self.limit_pass),
            proxy_pass: mask(&self.proxy_pass),
            onion_proxy_pass: mask(&self.onion_proxy_pass),
            ..self.clone()
        }
    }
}

fn env_flag(val: &str) -> bool {
    let val = val.trim();
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Platform data directory for the node, `./pod` when none is known.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("pod"))
        .unwrap_or_else(|| PathBuf::from("pod"))
}

/// The subcommand the process was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunningCommand {
    Node,
    Wallet,
    /// Detached mining worker, always run from an externally supplied config
    Kopach,
}

impl RunningCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RunningCommand::Node => "node",
            RunningCommand::Wallet => "wallet",
            RunningCommand::Kopach => "kopach",
        }
    }

    pub fn is_mining_worker(&self) -> bool {
        matches!(self, RunningCommand::Kopach)
    }
}

/// Writes a resolved configuration back to disk.
pub trait ConfigWriter {
    fn write_config(&self, config: &RawConfig, path: &Path) -> anyhow::Result<()>;
}

/// Production writer: TOML, parent directory created on demand.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlConfigWriter;

impl ConfigWriter for TomlConfigWriter {
    fn write_config(&self, config: &RawConfig, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = toml::to_string_pretty(config)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
        fs::write(path, content)
            .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
        Ok(())
    }
}
