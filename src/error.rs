//! Bootstrap Error Types
//!
//! Every abort reason in the startup pipeline has its own variant so callers
//! (and operators reading the log) can tell exactly which field was wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Misconfiguration severe enough that the process must exit rather than
/// continue under any caller policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnrecoverableConfigError {
    #[error("username and limit_user must not be the same")]
    DuplicateUsername,

    #[error("password and limit_pass must not be the same")]
    DuplicatePassword,

    #[error("user agent comment {comment:?} contains a forbidden character; '/', ':', '(', ')' must not appear")]
    UserAgentComment { comment: String },

    #[error("invalid minrelaytxfee {value:?}: {reason}")]
    MinRelayTxFee { value: String, reason: String },
}

/// Any failure that aborts the bootstrap pipeline.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("neither solo nor LAN mode can be active on {network}")]
    TestModeOnMainnet { network: &'static str },

    #[error("failed to create TLS directory {}: {source}", path.display())]
    TlsDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to generate TLS certificate pair: {0}")]
    TlsGenerate(String),

    #[error("generated TLS certificate pair is not usable: {0}")]
    TlsInvalidPair(String),

    #[error("failed to write TLS file {}: {source}", path.display())]
    TlsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the profile port must be between 1024 and 65535, got {value:?}")]
    ProfilePort { value: String },

    #[error("the addpeers and connectpeers options can not be both set")]
    PeerListConflict,

    #[error("rejectnonstd and relaynonstd cannot be used together -- choose only one")]
    RelayPolicyConflict,

    #[error("the rpcmaxconcurrentreqs option may not be less than 0 -- parsed [{0}]")]
    MaxConcurrentRequests(i64),

    #[error("listener address {addr:?} is invalid: {reason}")]
    InvalidListener { addr: String, reason: String },

    #[error("failed to obtain a free port from the kernel: {0}")]
    FreePort(#[source] std::io::Error),

    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(#[source] std::io::Error),

    #[error("proxy address {addr:?} is invalid: {reason}")]
    InvalidProxy { addr: String, reason: String },

    #[error("onion proxy address {addr:?} is invalid: {reason}")]
    InvalidOnionProxy { addr: String, reason: String },

    #[error("Tor stream isolation requires either proxy or onionproxy to be set")]
    TorIsolationWithoutProxy,

    #[error(transparent)]
    Unrecoverable(#[from] UnrecoverableConfigError),
}

impl BootstrapError {
    /// True when the process must terminate immediately instead of reporting
    /// the error through the normal path.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, BootstrapError::Unrecoverable(_))
    }
}

/// Errors surfaced by the dial/lookup functions after bootstrap, per call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("tor has been disabled")]
    TorDisabled,

    #[error("unsupported network {0:?}")]
    UnsupportedNetwork(String),

    #[error("{addr}: timed out after {timeout_ms}ms")]
    Timeout { addr: String, timeout_ms: u128 },

    #[error("invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("no addresses found for {0}")]
    NoAddresses(String),

    #[error("socks proxy {proxy}: {source}")]
    Socks {
        proxy: String,
        #[source]
        source: tokio_socks::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
