//! pod node bootstrap
//!
//! Resolves the active network, TLS material, listener ports and outbound
//! transport from the raw configuration before any long-lived service starts.

pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod error;
pub mod p2p;
pub mod tls;
pub mod transport;
pub mod validate;

pub use bootstrap::{bootstrap, BootstrapStage, NodeContext, ReadySignal};
pub use config::{ConfigWriter, RawConfig, RunningCommand, TomlConfigWriter};
pub use error::{BootstrapError, TransportError, UnrecoverableConfigError};
