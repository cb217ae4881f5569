//! Network Selector
//!
//! Maps the configured network token onto one of the fixed parameter sets.
//! Unknown tokens are not an error: the node falls back to mainnet and says so.

use tracing::{debug, warn};

use super::params::{
    ChainParams, MAIN_NET_PARAMS, REGRESSION_NET_PARAMS, SIM_NET_PARAMS, TEST_NET_PARAMS,
};
use crate::error::BootstrapError;

/// Result of resolving the network token.
#[derive(Debug, Clone, Copy)]
pub struct ActiveNet {
    pub params: &'static ChainParams,
    /// Set for every network that is not mainnet
    pub is_testnet: bool,
}

/// Resolve a network token. Matching is case-sensitive.
pub fn select_network(token: &str) -> ActiveNet {
    let params: &'static ChainParams = match token {
        "testnet" | "testnet3" | "t" => &TEST_NET_PARAMS,
        "regtestnet" | "regressiontest" | "r" => &REGRESSION_NET_PARAMS,
        "simnet" | "s" => &SIM_NET_PARAMS,
        "mainnet" | "m" => &MAIN_NET_PARAMS,
        other => {
            if other.is_empty() {
                debug!("no network configured, using mainnet");
            } else {
                warn!(network = %other, "unrecognised network name, using mainnet");
            }
            &MAIN_NET_PARAMS
        }
    };

    ActiveNet {
        params,
        is_testnet: !params.is_mainnet(),
    }
}

/// LAN and solo mode weaken discovery and security guarantees and are refused
/// on mainnet.
pub fn check_test_modes(active: &ActiveNet, lan: bool, solo: bool) -> Result<(), BootstrapError> {
    if (lan || solo) && active.params.is_mainnet() {
        return Err(BootstrapError::TestModeOnMainnet {
            network: active.params.name,
        });
    }
    Ok(())
}
