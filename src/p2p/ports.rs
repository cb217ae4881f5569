//! Listener Port Allocation
//!
//! Two optional rewrites of the configured listener lists:
//! - autolisten: P2P listeners derived from the host's routable addresses on
//!   the chain's default port
//! - autoports: every listener keeps its host but gets a free port assigned
//!   by the kernel, so several nodes can share one host
//!
//! Ports are probed by binding `localhost:0` and releasing the listener. This
//! is best effort: another process can take the port before the node binds it.

use serde::Serialize;
use std::net::{IpAddr, TcpListener};
use tracing::{debug, info, warn};

use super::hostport::{join_host_port, split_host_port};
use crate::chain::ChainParams;
use crate::config::RawConfig;
use crate::error::BootstrapError;

/// The three independent listener lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ListenerSet {
    pub p2p: Vec<String>,
    pub rpc: Vec<String>,
    pub wallet_rpc: Vec<String>,
}

impl ListenerSet {
    pub fn from_config(config: &RawConfig) -> Self {
        Self {
            p2p: config.p2p_listeners.clone(),
            rpc: config.rpc_listeners.clone(),
            wallet_rpc: config.wallet_rpc_listeners.clone(),
        }
    }

    pub fn apply_to(&self, config: &mut RawConfig) {
        config.p2p_listeners = self.p2p.clone();
        config.rpc_listeners = self.rpc.clone();
        config.wallet_rpc_listeners = self.wallet_rpc.clone();
    }

    pub fn len(&self) -> usize {
        self.p2p.len() + self.rpc.len() + self.wallet_rpc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bind an ephemeral listener and keep it open; the port stays reserved until
/// the listener is dropped.
fn probe_free_port() -> std::io::Result<(TcpListener, u16)> {
    let listener = TcpListener::bind("localhost:0")?;
    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

/// Ask the kernel for a port that is free right now.
pub fn get_free_port() -> std::io::Result<u16> {
    let (_listener, port) = probe_free_port()?;
    Ok(port)
}

/// Listener addresses for every routable address on the default P2P port.
pub fn auto_listen_addresses(params: &ChainParams, addrs: &[IpAddr]) -> Vec<String> {
    addrs
        .iter()
        .map(|ip| join_host_port(&ip.to_string(), params.default_port))
        .collect()
}

/// Replace the P2P connect and listen lists with the derived addresses.
pub fn apply_auto_listen(config: &mut RawConfig, params: &ChainParams, addrs: &[IpAddr]) {
    let p2p_addresses = auto_listen_addresses(params, addrs);
    if p2p_addresses.is_empty() {
        warn!("autolisten found no routable interface addresses, P2P listeners are now empty");
    }
    info!(count = p2p_addresses.len(), addresses = ?p2p_addresses, "autolisten set P2P listeners");
    config.p2p_connect = p2p_addresses.clone();
    config.p2p_listeners = p2p_addresses;
}

/// Give every listener a fresh kernel-assigned port, keeping hosts, order and
/// length. Either every entry is rewritten or an error is returned and the
/// input is untouched.
pub fn allocate_ports(listeners: &ListenerSet) -> Result<ListenerSet, BootstrapError> {
    // Held until every port is known so no two entries can get the same one.
    let mut reserved: Vec<TcpListener> = Vec::with_capacity(listeners.len());

    let mut reassign = |list: &[String]| -> Result<Vec<String>, BootstrapError> {
        list.iter()
            .map(|addr| {
                let (host, _) = split_host_port(addr).map_err(|reason| {
                    BootstrapError::InvalidListener {
                        addr: addr.clone(),
                        reason,
                    }
                })?;
                let (listener, port) = probe_free_port().map_err(BootstrapError::FreePort)?;
                reserved.push(listener);
                let updated = join_host_port(&host, port);
                debug!(from = %addr, to = %updated, "autoports reassigned listener");
                Ok(updated)
            })
            .collect()
    };

    let allocated = ListenerSet {
        p2p: reassign(&listeners.p2p)?,
        rpc: reassign(&listeners.rpc)?,
        wallet_rpc: reassign(&listeners.wallet_rpc)?,
    };
    drop(reserved);

    Ok(allocated)
}

/// Run autoports against the config's listener lists.
pub fn apply_auto_ports(config: &mut RawConfig) -> Result<(), BootstrapError> {
    let allocated = allocate_ports(&ListenerSet::from_config(config))?;
    info!(
        p2p = ?allocated.p2p,
        rpc = ?allocated.rpc,
        wallet_rpc = ?allocated.wallet_rpc,
        "autoports assigned listener ports"
    );
    allocated.apply_to(config);
    Ok(())
}
