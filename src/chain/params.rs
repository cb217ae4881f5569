//! Chain Parameters
//!
//! Fixed parameter sets for the four networks a node can join. These are
//! selected, never constructed, by the network selector.

use serde::Serialize;

/// Identity of one network: name, default ports and wire magic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainParams {
    /// Canonical network name, also used as the per-network data subdirectory
    pub name: &'static str,
    /// Default P2P port
    pub default_port: &'static str,
    /// Default chain RPC port
    pub rpc_port: &'static str,
    /// Default wallet RPC port
    pub wallet_rpc_port: &'static str,
    /// Message start bytes identifying the network on the wire
    pub net_magic: u32,
}

pub static MAIN_NET_PARAMS: ChainParams = ChainParams {
    name: "mainnet",
    default_port: "11047",
    rpc_port: "11048",
    wallet_rpc_port: "11046",
    net_magic: 0xd9b4_bef9,
};

pub static TEST_NET_PARAMS: ChainParams = ChainParams {
    name: "testnet",
    default_port: "21047",
    rpc_port: "21048",
    wallet_rpc_port: "21046",
    net_magic: 0x0709_110b,
};

pub static REGRESSION_NET_PARAMS: ChainParams = ChainParams {
    name: "regtest",
    default_port: "31047",
    rpc_port: "31048",
    wallet_rpc_port: "31046",
    net_magic: 0xdab5_bffa,
};

pub static SIM_NET_PARAMS: ChainParams = ChainParams {
    name: "simnet",
    default_port: "41047",
    rpc_port: "41048",
    wallet_rpc_port: "41046",
    net_magic: 0x1214_1c16,
};

impl ChainParams {
    pub fn is_mainnet(&self) -> bool {
        self.name == MAIN_NET_PARAMS.name
    }
}
