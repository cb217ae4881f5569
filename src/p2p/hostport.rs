//! host:port splitting and joining with bracketed IPv6 support.

/// Split `host:port`, `[v6]:port` or `:port`. The port must be present but
/// is not checked for being numeric.
pub fn split_host_port(addr: &str) -> Result<(String, String), String> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| format!("missing ']' in address {:?}", addr))?;
        let port = after
            .strip_prefix(':')
            .ok_or_else(|| format!("missing port in address {:?}", addr))?;
        if port.contains(':') || port.contains('[') || port.contains(']') {
            return Err(format!("unexpected characters after port in {:?}", addr));
        }
        return Ok((host.to_string(), port.to_string()));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| format!("missing port in address {:?}", addr))?;
    if host.contains(':') {
        return Err(format!("too many colons in address {:?}", addr));
    }
    if host.contains('[') || host.contains(']') {
        return Err(format!("unexpected bracket in address {:?}", addr));
    }
    Ok((host.to_string(), port.to_string()))
}

/// Join host and port, bracketing hosts that contain a colon.
pub fn join_host_port(host: &str, port: impl std::fmt::Display) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Split and require a numeric port.
pub fn parse_host_port(addr: &str) -> Result<(String, u16), String> {
    let (host, port) = split_host_port(addr)?;
    let port = port
        .parse::<u16>()
        .map_err(|_| format!("invalid port {:?} in address {:?}", port, addr))?;
    Ok((host, port))
}
