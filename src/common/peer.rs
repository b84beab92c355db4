//! Struct and implementation of the peer entry in the routing table.
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::common::Id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Peer entry in the routing table.
///
/// The table only ever interprets `id`; the address and display name ride
/// along for the host's session layer.
pub struct PeerInfo {
    pub id: Id,
    pub address: SocketAddr,
    pub name: String,
}

impl PeerInfo {
    /// Creates a new peer record from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> PeerInfo {
        PeerInfo {
            id,
            address,
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> PeerInfo {
        self.name = name.to_string();
        self
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// A throwaway peer with a random id, useful for tests and benches.
    pub fn random() -> PeerInfo {
        PeerInfo::new(Id::random(), SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}
