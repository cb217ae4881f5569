//! Bootstrap Pipeline
//!
//! Turns a raw configuration into the `NodeContext` every long-lived service
//! is started with. Stages run strictly in order, once per process:
//!
//!   Start -> NetworkResolved -> CredentialsReady -> PortsResolved
//!         -> TransportReady -> Validated -> Persisted -> Ready
//!
//! Any error moves the pipeline to `Failed` and is returned to the caller,
//! which is expected to exit. Nothing is retried or rolled back beyond the
//! TLS provisioner's own cleanup.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::chain::{check_test_modes, select_network, ChainParams};
use crate::config::amount::Amount;
use crate::config::{ConfigWriter, RawConfig, RunningCommand};
use crate::error::BootstrapError;
use crate::p2p::routeable::routable_addresses;
use crate::p2p::{apply_auto_listen, apply_auto_ports, ListenerSet};
use crate::tls::{self, TlsMaterial};
use crate::transport::{compose, TransportOptions, TransportSet};
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BootstrapStage {
    Start,
    NetworkResolved,
    CredentialsReady,
    PortsResolved,
    TransportReady,
    Validated,
    Persisted,
    Ready,
    Failed,
}

impl BootstrapStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapStage::Start => "start",
            BootstrapStage::NetworkResolved => "network-resolved",
            BootstrapStage::CredentialsReady => "credentials-ready",
            BootstrapStage::PortsResolved => "ports-resolved",
            BootstrapStage::TransportReady => "transport-ready",
            BootstrapStage::Validated => "validated",
            BootstrapStage::Persisted => "persisted",
            BootstrapStage::Ready => "ready",
            BootstrapStage::Failed => "failed",
        }
    }
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised once when bootstrap completes. Services that start before it
/// treat the node as not yet initialised.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns true only for the call that actually raised the signal.
    pub fn raise(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so this only returns once raised.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

/// Everything downstream services need from bootstrap. Built once.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub params: &'static ChainParams,
    /// True on every network other than mainnet
    pub is_testnet: bool,
    /// Present when client or server TLS is enabled
    pub tls: Option<TlsMaterial>,
    pub transport: TransportSet,
    pub listeners: ListenerSet,
    pub min_relay_tx_fee: Amount,
    /// The configuration after normalisation by the pipeline
    pub config: RawConfig,
    /// Whether the pipeline decided to write the configuration back
    pub persist_config: bool,
    pub ready: ReadySignal,
}

/// Runs the pipeline stages and records how far it got.
pub struct Bootstrap<'a> {
    command: RunningCommand,
    writer: &'a dyn ConfigWriter,
    stage: BootstrapStage,
}

impl<'a> Bootstrap<'a> {
    pub fn new(command: RunningCommand, writer: &'a dyn ConfigWriter) -> Self {
        Self {
            command,
            writer,
            stage: BootstrapStage::Start,
        }
    }

    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    fn advance(&mut self, next: BootstrapStage) {
        info!(from = %self.stage, to = %next, "bootstrap stage");
        self.stage = next;
    }

    pub fn run(&mut self, config: RawConfig) -> Result<NodeContext, BootstrapError> {
        match self.run_stages(config) {
            Ok(ctx) => Ok(ctx),
            Err(e) => {
                error!(stage = %self.stage, err = %e, "bootstrap failed");
                self.stage = BootstrapStage::Failed;
                Err(e)
            }
        }
    }

    fn run_stages(&mut self, mut config: RawConfig) -> Result<NodeContext, BootstrapError> {
        debug!(command = self.command.name(), "starting bootstrap");

        let active = select_network(&config.network);
        info!(network = active.params.name, testnet = active.is_testnet, "active network");
        check_test_modes(&active, config.lan, config.solo)?;
        set_network_log_dir(&mut config, active.params);
        self.advance(BootstrapStage::NetworkResolved);

        let tls = if config.client_tls || config.server_tls {
            let material = TlsMaterial::from_config(&config);
            let hosts = if material.needs_generation(config.one_time_tls_key) {
                tls::certificate_hosts()
            } else {
                Vec::new()
            };
            tls::provision(&material, config.one_time_tls_key, &hosts)?;
            Some(material)
        } else {
            None
        };
        self.advance(BootstrapStage::CredentialsReady);

        let min_relay_tx_fee = validate::early_checks(&mut config)?;

        let mut listeners_changed = false;
        if config.auto_listen {
            info!("autolisten is enabled");
            let addrs = routable_addresses().map_err(BootstrapError::Interfaces)?;
            apply_auto_listen(&mut config, active.params, &addrs);
            listeners_changed = true;
        }
        if config.auto_ports {
            info!("autoports is enabled");
            apply_auto_ports(&mut config)?;
            listeners_changed = true;
        }
        let listeners = ListenerSet::from_config(&config);
        self.advance(BootstrapStage::PortsResolved);

        validate::late_checks(&mut config)?;

        debug!("setting network dialer and lookup");
        let transport = compose(TransportOptions::from_config(&config))?;
        self.advance(BootstrapStage::TransportReady);

        self.advance(BootstrapStage::Validated);

        let persist_config = self.persist(&config, listeners_changed);
        self.advance(BootstrapStage::Persisted);

        let ctx = NodeContext {
            params: active.params,
            is_testnet: active.is_testnet,
            tls,
            transport,
            listeners,
            min_relay_tx_fee,
            config,
            persist_config,
            ready: ReadySignal::new(),
        };
        ctx.ready.raise();
        self.advance(BootstrapStage::Ready);

        Ok(ctx)
    }

    /// Write the configuration back when listeners were rewritten or no config
    /// file exists yet. Mining workers run from a supplied config and never
    /// write it. A failed write is logged and does not stop the node.
    fn persist(&self, config: &RawConfig, listeners_changed: bool) -> bool {
        if !listeners_changed && config.config_file.exists() {
            return false;
        }
        if self.command.is_mining_worker() {
            debug!("mining worker does not save configuration");
            return false;
        }

        debug!(path = %config.config_file.display(), "saving configuration");
        if let Err(e) = self.writer.write_config(config, &config.config_file) {
            error!(path = %config.config_file.display(), err = %e, "failed to save configuration");
        }
        true
    }
}

/// Run the whole pipeline.
pub fn bootstrap(
    config: RawConfig,
    command: RunningCommand,
    writer: &dyn ConfigWriter,
) -> Result<NodeContext, BootstrapError> {
    Bootstrap::new(command, writer).run(config)
}

/// Logs go to a per-network subdirectory unless a separate log dir was set.
fn set_network_log_dir(config: &mut RawConfig, params: &ChainParams) {
    if config.log_dir.as_os_str().is_empty() || config.log_dir == config.data_dir {
        config.log_dir = config.data_dir.join(params.name);
    }
}
