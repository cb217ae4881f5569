//! Discovery of the host's routable interface addresses.

use std::collections::BTreeSet;
use std::net::IpAddr;

/// Addresses a peer could plausibly reach us on: everything except loopback,
/// unspecified and link-local.
pub fn is_routable(ip: &IpAddr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return false;
    }
    match ip {
        IpAddr::V4(v4) => !v4.is_link_local() && !v4.is_broadcast(),
        // fe80::/10
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) != 0xfe80,
    }
}

/// Routable addresses of all local interfaces, deduplicated and sorted.
pub fn routable_addresses() -> std::io::Result<Vec<IpAddr>> {
    let addrs: BTreeSet<IpAddr> = if_addrs::get_if_addrs()?
        .into_iter()
        .map(|iface| iface.ip())
        .filter(is_routable)
        .collect();
    Ok(addrs.into_iter().collect())
}
