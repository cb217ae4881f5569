//! Configuration Consistency Checks
//!
//! Independent checks over the raw configuration, each with its own error.
//! A few of them do not fail but force a feature off (listening, RPC, DNS
//! seeding) because the configuration leaves it unusable.
//!
//! Checks run in two batches: `early_checks` before listener ports are
//! resolved and `late_checks` after.

use tracing::{trace, warn};

use crate::config::amount::Amount;
use crate::config::RawConfig;
use crate::error::{BootstrapError, UnrecoverableConfigError};

/// Characters that would break user agent comment parsing.
pub const FORBIDDEN_UA_CHARS: &[char] = &['/', ':', '(', ')'];

pub fn check_profile_port(profile: &str) -> Result<(), BootstrapError> {
    if profile.is_empty() {
        return Ok(());
    }
    match profile.parse::<i64>() {
        Ok(port) if (1024..=65535).contains(&port) => Ok(()),
        _ => Err(BootstrapError::ProfilePort {
            value: profile.to_string(),
        }),
    }
}

pub fn check_peer_lists(config: &RawConfig) -> Result<(), BootstrapError> {
    if !config.add_peers.is_empty() && !config.connect_peers.is_empty() {
        return Err(BootstrapError::PeerListConflict);
    }
    Ok(())
}

/// Without P2P listeners, a proxy or a fixed peer list leaves no route back
/// for inbound connections.
pub fn apply_listen_policy(config: &mut RawConfig) {
    if (!config.proxy_address.is_empty() || !config.connect_peers.is_empty())
        && config.p2p_listeners.is_empty()
        && !config.disable_listen
    {
        warn!("no P2P listeners with proxy or connectpeers set, disabling inbound listening");
        config.disable_listen = true;
    }
}

pub fn check_relay_policy(config: &RawConfig) -> Result<(), BootstrapError> {
    if config.relay_non_std && config.reject_non_std {
        return Err(BootstrapError::RelayPolicyConflict);
    }
    Ok(())
}

/// Admin and limited RPC users must differ in both name and password.
pub fn check_credentials(config: &RawConfig) -> Result<(), UnrecoverableConfigError> {
    if !config.username.is_empty() && config.username == config.limit_user {
        return Err(UnrecoverableConfigError::DuplicateUsername);
    }
    if !config.password.is_empty() && config.password == config.limit_pass {
        return Err(UnrecoverableConfigError::DuplicatePassword);
    }
    Ok(())
}

pub fn check_user_agent_comments(comments: &[String]) -> Result<(), UnrecoverableConfigError> {
    for comment in comments {
        if comment.contains(FORBIDDEN_UA_CHARS) {
            return Err(UnrecoverableConfigError::UserAgentComment {
                comment: comment.clone(),
            });
        }
    }
    Ok(())
}

pub fn parse_min_relay_fee(value: &str) -> Result<Amount, UnrecoverableConfigError> {
    value
        .parse::<Amount>()
        .map_err(|reason| UnrecoverableConfigError::MinRelayTxFee {
            value: value.to_string(),
            reason,
        })
}

/// LAN and solo modes must not seed from public DNS.
pub fn apply_test_mode_policy(config: &mut RawConfig) {
    if (config.lan || config.solo) && !config.disable_dns_seed {
        warn!("disabling DNS seeding due to test mode settings active");
        config.disable_dns_seed = true;
    }
}

/// RPC needs at least one complete login.
pub fn apply_rpc_login_policy(config: &mut RawConfig) {
    let admin_missing = config.username.is_empty() || config.password.is_empty();
    let limited_missing = config.limit_user.is_empty() || config.limit_pass.is_empty();
    if admin_missing && limited_missing && !config.disable_rpc {
        warn!("disabling RPC due to empty login credentials");
        config.disable_rpc = true;
    }
}

pub fn check_rpc_concurrency(max: i64) -> Result<(), BootstrapError> {
    if max < 0 {
        return Err(BootstrapError::MaxConcurrentRequests(max));
    }
    Ok(())
}

/// Checks that do not depend on the final listener addresses. Returns the
/// parsed minimum relay fee.
pub fn early_checks(config: &mut RawConfig) -> Result<Amount, BootstrapError> {
    trace!("validating profile port number");
    check_profile_port(&config.profile)?;

    trace!("checking addpeer and connectpeer lists");
    check_peer_lists(config)?;

    trace!("checking proxy/connect for disabling listening");
    apply_listen_policy(config);

    trace!("checking relay/reject nonstandard policy settings");
    check_relay_policy(config)?;

    trace!("checking admin and limited credentials differ");
    check_credentials(config)?;

    trace!("checking user agent comments");
    check_user_agent_comments(&config.user_agent_comments)?;

    trace!("checking min relay tx fee");
    Ok(parse_min_relay_fee(&config.min_relay_tx_fee)?)
}

/// Checks run after autolisten/autoports have settled the listeners.
pub fn late_checks(config: &mut RawConfig) -> Result<(), BootstrapError> {
    apply_test_mode_policy(config);

    trace!("checking rpc server has a login enabled");
    apply_rpc_login_policy(config);

    trace!("checking rpc max concurrent requests");
    check_rpc_concurrency(config.rpc_max_concurrent_reqs)
}
