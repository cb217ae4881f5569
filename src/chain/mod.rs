//! Chain identity: fixed network parameters and the selector that picks one.

pub mod network;
pub mod params;

pub use network::{check_test_modes, select_network, ActiveNet};
pub use params::ChainParams;
