//! Port derivation for the node's listening sockets

use std::net::{IpAddr, SocketAddr};

/// The three related ports a node binds, derived from one configured
/// base port. Operators forward these as a block, so the +1/+2 layout
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAddressing {
    /// Address the node advertises to peers.
    pub ip: IpAddr,
    /// External P2P port (the configured base).
    pub external_port: u16,
    /// Peer discovery port (base + 1).
    pub discovery_port: u16,
    /// Client-facing RPC port (base + 2).
    pub client_rpc_port: u16,
}

impl NodeAddressing {
    /// Derive the port block from a base port.
    pub fn from_base(ip: IpAddr, base: u16) -> Self {
        Self {
            ip,
            external_port: base,
            discovery_port: base + 1,
            client_rpc_port: base + 2,
        }
    }

    /// Derive from the node's advertised external address.
    pub fn from_self_address(addr: SocketAddr) -> Self {
        Self::from_base(addr.ip(), addr.port())
    }

    pub fn external_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.external_port)
    }

    pub fn discovery_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.discovery_port)
    }

    pub fn client_rpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.client_rpc_port)
    }
}
