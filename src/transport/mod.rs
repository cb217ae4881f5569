//! Outbound Transport
//!
//! The three capabilities every network consumer receives: `dial` for
//! ordinary peers, `lookup` for name resolution and `onion_dial` for `.onion`
//! addresses. Each is a plain value holding at most proxy details, so it can
//! be cloned and invoked concurrently from any task.

pub mod compose;
pub mod socks;
pub mod tor;

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::TransportError;
pub use compose::{compose, TransportOptions};
pub use socks::SocksProxy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    fn matches(self, addr: &SocketAddr) -> bool {
        self.matches_ip(&addr.ip())
    }

    fn matches_ip(self, ip: &IpAddr) -> bool {
        match self {
            Family::Any => true,
            Family::V4 => ip.is_ipv4(),
            Family::V6 => ip.is_ipv6(),
        }
    }
}

fn check_network(network: &str) -> Result<Family, TransportError> {
    match network {
        "tcp" => Ok(Family::Any),
        "tcp4" => Ok(Family::V4),
        "tcp6" => Ok(Family::V6),
        other => Err(TransportError::UnsupportedNetwork(other.to_string())),
    }
}

async fn connect_any(family: Family, addr: &str) -> Result<TcpStream, TransportError> {
    let mut last_err = None;
    for candidate in tokio::net::lookup_host(addr).await? {
        if !family.matches(&candidate) {
            continue;
        }
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => TransportError::Io(e),
        None => TransportError::NoAddresses(addr.to_string()),
    })
}

/// Plain timeout-bounded TCP connect, trying each resolved address in turn.
pub async fn dial_direct(
    network: &str,
    addr: &str,
    timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let family = check_network(network)?;
    tokio::time::timeout(timeout, connect_any(family, addr))
        .await
        .map_err(|_| TransportError::Timeout {
            addr: addr.to_string(),
            timeout_ms: timeout.as_millis(),
        })?
}

/// How a connection is made.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Dialer {
    #[default]
    Direct,
    Socks(SocksProxy),
    /// Always fails with `TransportError::TorDisabled`
    Disabled,
}

impl Dialer {
    pub async fn dial(
        &self,
        network: &str,
        addr: &str,
        timeout: Duration,
    ) -> Result<TcpStream, TransportError> {
        match self {
            Dialer::Direct => dial_direct(network, addr, timeout).await,
            Dialer::Socks(proxy) => proxy.dial(network, addr, timeout).await,
            Dialer::Disabled => Err(TransportError::TorDisabled),
        }
    }
}

/// How host names are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolver {
    /// Operating system resolver
    #[default]
    System,
    /// Tor RESOLVE through the SOCKS proxy at `proxy`
    Tor { proxy: String },
}

impl Resolver {
    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, TransportError> {
        match self {
            Resolver::System => {
                let mut ips: Vec<IpAddr> = Vec::new();
                for addr in tokio::net::lookup_host((host, 0)).await? {
                    if !ips.contains(&addr.ip()) {
                        ips.push(addr.ip());
                    }
                }
                if ips.is_empty() {
                    return Err(TransportError::NoAddresses(host.to_string()));
                }
                Ok(ips)
            }
            Resolver::Tor { proxy } => {
                tor::tor_lookup_ip(host, proxy, tor::TOR_RESOLVE_TIMEOUT).await
            }
        }
    }
}

/// The composed dial, lookup and onion-dial capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportSet {
    pub dial: Dialer,
    pub lookup: Resolver,
    pub onion_dial: Dialer,
}

impl TransportSet {
    pub async fn dial(
        &self,
        network: &str,
        addr: &str,
        timeout: Duration,
    ) -> Result<TcpStream, TransportError> {
        self.dial.dial(network, addr, timeout).await
    }

    pub async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, TransportError> {
        self.lookup.lookup(host).await
    }

    pub async fn onion_dial(
        &self,
        network: &str,
        addr: &str,
        timeout: Duration,
    ) -> Result<TcpStream, TransportError> {
        self.onion_dial.dial(network, addr, timeout).await
    }
}
