//! Name resolution through a Tor SOCKS proxy (RESOLVE extension), so lookups
//! never leave the proxy as plain DNS.

use std::net::IpAddr;
use std::time::Duration;
use tokio_socks::tcp::Socks5Stream;
use tokio_socks::TargetAddr;

use crate::error::TransportError;

/// Upper bound on one RESOLVE round trip through the proxy.
pub const TOR_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolve `host` through the Tor proxy at `proxy` within `timeout`. Literal
/// IP addresses are returned as is without contacting the proxy.
pub async fn tor_lookup_ip(
    host: &str,
    proxy: &str,
    timeout: Duration,
) -> Result<Vec<IpAddr>, TransportError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let resolved = tokio::time::timeout(timeout, Socks5Stream::tor_resolve(proxy, (host, 0)))
        .await
        .map_err(|_| TransportError::Timeout {
            addr: host.to_string(),
            timeout_ms: timeout.as_millis(),
        })?
        .map_err(|source| TransportError::Socks {
            proxy: proxy.to_string(),
            source,
        })?;

    match resolved {
        TargetAddr::Ip(addr) => Ok(vec![addr.ip()]),
        TargetAddr::Domain(_, _) => Err(TransportError::NoAddresses(host.to_string())),
    }
}
