//! Endpoint registry: which handle owns which live subgraphs.
//!
//! The registry is the session's bookkeeping half of the core invariant: a
//! `Connection` exists for a handle exactly while that handle's decode
//! chain is attached to the graph. Entries key on the transport handle;
//! host-level deduplication scans the owned addresses.

use crate::errors::MixError;
use crate::transport::SourceHandle;
use chrono::{DateTime, Utc};
use media_graph::{PortId, Subgraph};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;

/// One active peer's bookkeeping.
#[derive(Debug, Clone)]
pub struct Connection {
    /// The peer's network-input slot; minted and owned by the transport.
    pub handle: SourceHandle,
    /// Dynamic source port on the network-input node wired to this peer.
    pub input_port: PortId,
    /// The decode chain; exclusively owned, lives from join to leave.
    pub decode: Subgraph,
    /// The return chain; mesh-mode address owners only.
    pub output: Option<Subgraph>,
    /// The owned peer address. `Some` only on the connection that owns the
    /// address; redundant paths to an already-active host carry `None`, so
    /// no two entries ever own the same address.
    pub peer_address: Option<SocketAddr>,
    /// Whether this connection is a redundant path to an active host.
    pub redundant: bool,
    /// When the join completed.
    pub joined_at: DateTime<Utc>,
}

/// Diagnostic view of one peer, as reported to operators.
#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    pub handle: SourceHandle,
    pub address: Option<SocketAddr>,
    pub redundant: bool,
    pub joined_at: DateTime<Utc>,
}

/// The handle-keyed connection table.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    entries: HashMap<SourceHandle, Connection>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly joined connection.
    ///
    /// # Errors
    ///
    /// `DuplicateHandle` when the handle is already registered. The
    /// transport guarantees handle uniqueness, so hitting this is a logic
    /// error, not an environmental condition.
    pub fn add(&mut self, connection: Connection) -> Result<(), MixError> {
        let handle = connection.handle;
        if self.entries.contains_key(&handle) {
            return Err(MixError::DuplicateHandle(handle));
        }
        self.entries.insert(handle, connection);
        Ok(())
    }

    /// Remove and return the connection for `handle`, for teardown.
    ///
    /// # Errors
    ///
    /// `HandleNotFound` when the handle is not registered.
    pub fn remove_by_handle(&mut self, handle: SourceHandle) -> Result<Connection, MixError> {
        self.entries
            .remove(&handle)
            .ok_or(MixError::HandleNotFound(handle))
    }

    #[must_use]
    pub fn get(&self, handle: SourceHandle) -> Option<&Connection> {
        self.entries.get(&handle)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any registered connection owns `address`.
    ///
    /// Linear scan; the conference peer count is small.
    #[must_use]
    pub fn has_address(&self, address: SocketAddr) -> bool {
        self.entries
            .values()
            .any(|connection| connection.peer_address == Some(address))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.entries.values()
    }
}
