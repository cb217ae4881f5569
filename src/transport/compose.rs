//! Transport Composition
//!
//! Turns the proxy, onion-proxy, isolation and onion flags into one
//! `TransportSet`. The options are checked first; then an ordered table of
//! rules is applied to a default (direct dial, system DNS) set. Later rules
//! override earlier ones, and the onion-disabled rule is last so it always
//! wins. Composition does no I/O.

use tracing::{trace, warn};

use super::{Dialer, Resolver, SocksProxy, TransportSet};
use crate::config::RawConfig;
use crate::error::BootstrapError;
use crate::p2p::hostport::split_host_port;

/// The subset of configuration that decides outbound routing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportOptions {
    pub proxy: String,
    pub proxy_user: String,
    pub proxy_pass: String,
    pub onion_proxy: String,
    pub onion_proxy_user: String,
    pub onion_proxy_pass: String,
    pub tor_isolation: bool,
    pub onion_enabled: bool,
}

impl TransportOptions {
    pub fn from_config(config: &RawConfig) -> Self {
        Self {
            proxy: config.proxy_address.clone(),
            proxy_user: config.proxy_user.clone(),
            proxy_pass: config.proxy_pass.clone(),
            onion_proxy: config.onion_proxy_address.clone(),
            onion_proxy_user: config.onion_proxy_user.clone(),
            onion_proxy_pass: config.onion_proxy_pass.clone(),
            tor_isolation: config.tor_isolation,
            onion_enabled: config.onion_enabled,
        }
    }

    fn has_proxy(&self) -> bool {
        !self.proxy.is_empty()
    }

    fn has_onion_proxy(&self) -> bool {
        !self.onion_proxy.is_empty()
    }

    /// The primary proxy is only isolated when no onion proxy takes that job.
    fn primary_isolated(&self) -> bool {
        self.tor_isolation && !self.has_onion_proxy()
    }

    fn primary_proxy(&self) -> SocksProxy {
        SocksProxy {
            addr: self.proxy.clone(),
            username: self.proxy_user.clone(),
            password: self.proxy_pass.clone(),
            tor_isolation: self.primary_isolated(),
        }
    }

    fn onion_socks(&self) -> SocksProxy {
        SocksProxy {
            addr: self.onion_proxy.clone(),
            username: self.onion_proxy_user.clone(),
            password: self.onion_proxy_pass.clone(),
            tor_isolation: self.tor_isolation,
        }
    }
}

/// Check the options and normalise them for the rule table. An onion proxy
/// is dropped entirely when onion routing is disabled.
pub fn prepare(mut opts: TransportOptions) -> Result<TransportOptions, BootstrapError> {
    if opts.tor_isolation && !opts.has_proxy() && !opts.has_onion_proxy() {
        return Err(BootstrapError::TorIsolationWithoutProxy);
    }

    if !opts.onion_enabled && opts.has_onion_proxy() {
        trace!(onion_proxy = %opts.onion_proxy, "onion routing disabled, ignoring onion proxy");
        opts.onion_proxy.clear();
    }

    if opts.has_proxy() {
        split_host_port(&opts.proxy).map_err(|reason| BootstrapError::InvalidProxy {
            addr: opts.proxy.clone(),
            reason,
        })?;
        if opts.primary_isolated() && (!opts.proxy_user.is_empty() || !opts.proxy_pass.is_empty())
        {
            warn!("Tor isolation set -- overriding specified proxy user credentials");
        }
    }

    if opts.has_onion_proxy() {
        split_host_port(&opts.onion_proxy).map_err(|reason| BootstrapError::InvalidOnionProxy {
            addr: opts.onion_proxy.clone(),
            reason,
        })?;
        if opts.tor_isolation
            && (!opts.onion_proxy_user.is_empty() || !opts.onion_proxy_pass.is_empty())
        {
            warn!("Tor isolation set -- overriding specified onionproxy user credentials");
        }
    }

    Ok(opts)
}

/// One row of the composition table.
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&TransportOptions) -> bool,
    pub apply: fn(&TransportOptions, &mut TransportSet),
}

/// Evaluated top to bottom; every matching rule is applied.
pub const RULES: &[Rule] = &[
    Rule {
        name: "proxy-dial",
        applies: |o| o.has_proxy(),
        apply: |o, t| t.dial = Dialer::Socks(o.primary_proxy()),
    },
    Rule {
        // No separate onion proxy: the proxy is Tor, resolve through it.
        name: "proxy-as-tor-lookup",
        applies: |o| o.has_proxy() && o.onion_enabled && !o.has_onion_proxy(),
        apply: |o, t| {
            t.lookup = Resolver::Tor {
                proxy: o.proxy.clone(),
            }
        },
    },
    Rule {
        // Bridge mode: the primary proxy is not Tor, resolve through the onion proxy.
        name: "bridge-lookup",
        applies: |o| o.has_proxy() && o.onion_enabled && o.has_onion_proxy(),
        apply: |o, t| {
            t.lookup = Resolver::Tor {
                proxy: o.onion_proxy.clone(),
            }
        },
    },
    Rule {
        name: "onion-dial",
        applies: |_| true,
        apply: |o, t| t.onion_dial = Dialer::Socks(o.onion_socks()),
    },
    Rule {
        name: "onion-via-proxy",
        applies: |o| o.has_proxy() && !o.has_onion_proxy(),
        apply: |_, t| t.onion_dial = t.dial.clone(),
    },
    Rule {
        name: "no-proxy-onion-alias",
        applies: |o| !o.has_proxy(),
        apply: |_, t| t.onion_dial = t.dial.clone(),
    },
    Rule {
        name: "onion-disabled",
        applies: |o| !o.onion_enabled,
        apply: |_, t| t.onion_dial = Dialer::Disabled,
    },
];

/// Apply the rule table to already prepared options.
pub fn apply_rules(opts: &TransportOptions) -> TransportSet {
    let mut set = TransportSet::default();
    for rule in RULES {
        if (rule.applies)(opts) {
            trace!(rule = rule.name, "transport rule applied");
            (rule.apply)(opts, &mut set);
        }
    }
    set
}

/// Check the options and build the transport set.
pub fn compose(opts: TransportOptions) -> Result<TransportSet, BootstrapError> {
    let prepared = prepare(opts)?;
    Ok(apply_rules(&prepared))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY: &str = "10.0.0.1:1080";
    const ONION: &str = "127.0.0.1:9050";

    fn opts(proxy: bool, onion: bool, isolation: bool, enabled: bool) -> TransportOptions {
        TransportOptions {
            proxy: if proxy { PROXY.to_string() } else { String::new() },
            onion_proxy: if onion { ONION.to_string() } else { String::new() },
            tor_isolation: isolation,
            onion_enabled: enabled,
            ..Default::default()
        }
    }

    fn socks(addr: &str, isolated: bool) -> Dialer {
        Dialer::Socks(SocksProxy {
            addr: addr.to_string(),
            username: String::new(),
            password: String::new(),
            tor_isolation: isolated,
        })
    }

    fn tor(addr: &str) -> Resolver {
        Resolver::Tor {
            proxy: addr.to_string(),
        }
    }

    #[test]
    fn test_truth_table() {
        use Dialer::{Direct, Disabled};
        use Resolver::System;

        // (proxy, onion proxy, isolation, onion enabled) -> (dial, lookup, onion_dial)
        let table: Vec<((bool, bool, bool, bool), Option<(Dialer, Resolver, Dialer)>)> = vec![
            ((false, false, false, false), Some((Direct, System, Disabled))),
            ((false, false, false, true), Some((Direct, System, Direct))),
            ((false, false, true, false), None),
            ((false, false, true, true), None),
            ((false, true, false, false), Some((Direct, System, Disabled))),
            ((false, true, false, true), Some((Direct, System, Direct))),
            ((false, true, true, false), Some((Direct, System, Disabled))),
            ((false, true, true, true), Some((Direct, System, Direct))),
            ((true, false, false, false), Some((socks(PROXY, false), System, Disabled))),
            ((true, false, false, true), Some((socks(PROXY, false), tor(PROXY), socks(PROXY, false)))),
            ((true, false, true, false), Some((socks(PROXY, true), System, Disabled))),
            ((true, false, true, true), Some((socks(PROXY, true), tor(PROXY), socks(PROXY, true)))),
            ((true, true, false, false), Some((socks(PROXY, false), System, Disabled))),
            ((true, true, false, true), Some((socks(PROXY, false), tor(ONION), socks(ONION, false)))),
            ((true, true, true, false), Some((socks(PROXY, true), System, Disabled))),
            ((true, true, true, true), Some((socks(PROXY, false), tor(ONION), socks(ONION, true)))),
        ];
        assert_eq!(table.len(), 16);

        for ((p, o, i, e), expected) in table {
            let result = compose(opts(p, o, i, e));
            match expected {
                None => assert!(
                    matches!(result, Err(BootstrapError::TorIsolationWithoutProxy)),
                    "case {:?} should fail",
                    (p, o, i, e)
                ),
                Some((dial, lookup, onion_dial)) => {
                    let set = result.unwrap();
                    assert_eq!(set.dial, dial, "dial for {:?}", (p, o, i, e));
                    assert_eq!(set.lookup, lookup, "lookup for {:?}", (p, o, i, e));
                    assert_eq!(set.onion_dial, onion_dial, "onion_dial for {:?}", (p, o, i, e));
                }
            }
        }
    }

    #[test]
    fn test_tor_proxy_scenario() {
        let set = compose(TransportOptions {
            proxy: "127.0.0.1:9050".to_string(),
            onion_enabled: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(set.lookup, tor("127.0.0.1:9050"));
        assert_eq!(set.onion_dial, set.dial);
    }

    #[test]
    fn test_bridge_mode_scenario() {
        let set = compose(TransportOptions {
            proxy: "10.0.0.1:1080".to_string(),
            onion_proxy: "127.0.0.1:9050".to_string(),
            onion_enabled: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(set.dial, socks("10.0.0.1:1080", false));
        assert_eq!(set.lookup, tor("127.0.0.1:9050"));
        assert_eq!(set.onion_dial, socks("127.0.0.1:9050", false));
    }

    #[test]
    fn test_disabled_wins_over_everything() {
        for (p, o, i) in [(true, true, true), (true, false, false), (false, false, false)] {
            let set = compose(opts(p, o, i, false)).unwrap();
            assert_eq!(set.onion_dial, Dialer::Disabled);
        }
    }

    #[test]
    fn test_credentials_carried() {
        let set = compose(TransportOptions {
            proxy: PROXY.to_string(),
            proxy_user: "user".to_string(),
            proxy_pass: "pass".to_string(),
            onion_proxy: ONION.to_string(),
            onion_proxy_user: "ouser".to_string(),
            onion_proxy_pass: "opass".to_string(),
            onion_enabled: true,
            tor_isolation: false,
        })
        .unwrap();
        match (&set.dial, &set.onion_dial) {
            (Dialer::Socks(p), Dialer::Socks(o)) => {
                assert_eq!((p.username.as_str(), p.password.as_str()), ("user", "pass"));
                assert_eq!((o.username.as_str(), o.password.as_str()), ("ouser", "opass"));
            }
            other => panic!("unexpected dialers {:?}", other),
        }
    }

    #[test]
    fn test_malformed_addresses_rejected() {
        let err = compose(TransportOptions {
            proxy: "localhost".to_string(),
            onion_enabled: true,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidProxy { ref addr, .. } if addr == "localhost"));

        let err = compose(TransportOptions {
            proxy: PROXY.to_string(),
            onion_proxy: "not-an-address".to_string(),
            onion_enabled: true,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidOnionProxy { .. }));
    }

    #[test]
    fn test_malformed_onion_proxy_ignored_when_disabled() {
        let set = compose(TransportOptions {
            onion_proxy: "not-an-address".to_string(),
            onion_enabled: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(set.onion_dial, Dialer::Disabled);
    }

    #[test]
    fn test_rule_order_ends_with_onion_disabled() {
        assert_eq!(RULES.last().map(|r| r.name), Some("onion-disabled"));
    }
}
