//! P2P listener addressing: host:port handling, interface discovery and
//! automatic port assignment.

pub mod hostport;
pub mod ports;
pub mod routeable;

pub use ports::{allocate_ports, apply_auto_listen, apply_auto_ports, get_free_port, ListenerSet};
