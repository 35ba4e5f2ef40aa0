//! Transport-level client tracking for the game server
//!
//! This module maps network addresses to the opaque client identifiers the
//! game logic works with, and watches connection liveness:
//! - Identifier assignment on first contact (monotonic, never reused)
//! - Address lookup in both directions for routing and broadcasts
//! - Last-seen tracking with a timeout sweep for silent peers
//!
//! Seat assignment is not handled here: whether an identified client gets a
//! player slot is the game room's decision.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long a client may stay silent before it is presumed gone. Clients
/// send keep-alives every second, so this allows several losses in a row.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A known remote peer and when we last heard from it.
#[derive(Debug)]
pub struct Connection {
    pub id: u64,
    pub addr: SocketAddr,
    pub last_seen: Instant,
}

impl Connection {
    pub fn new(id: u64, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Registry of live transport connections indexed by client ID.
///
/// IDs start from 1 and increment for each new peer; a reconnecting peer
/// gets a fresh ID, matching the game's treatment of a reconnect as a new
/// identity.
pub struct ConnectionTable {
    connections: HashMap<u64, Connection>,
    next_client_id: u64,
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Registers a new peer and returns its assigned client ID.
    pub fn register(&mut self, addr: SocketAddr) -> u64 {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.connections.insert(client_id, Connection::new(client_id, addr));

        client_id
    }

    /// Drops a peer. Returns true if it was known.
    pub fn remove(&mut self, client_id: u64) -> bool {
        if let Some(connection) = self.connections.remove(&client_id) {
            info!("Client {} ({}) removed", connection.id, connection.addr);
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u64> {
        self.connections
            .iter()
            .find(|(_, connection)| connection.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: u64) -> Option<SocketAddr> {
        self.connections.get(&client_id).map(|c| c.addr)
    }

    /// Refreshes the liveness clock for a peer. Called for every packet the
    /// peer sends, keep-alives included.
    pub fn mark_seen(&mut self, client_id: u64) {
        if let Some(connection) = self.connections.get_mut(&client_id) {
            connection.last_seen = Instant::now();
        }
    }

    /// Removes peers that have been silent past `CLIENT_TIMEOUT` and
    /// returns their IDs so the game room can be told they left.
    pub fn check_timeouts(&mut self) -> Vec<u64> {
        let timed_out: Vec<u64> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove(*client_id);
        }

        timed_out
    }

    /// All (client ID, address) pairs, for broadcast fan-out.
    pub fn addrs(&self) -> Vec<(u64, SocketAddr)> {
        self.connections
            .iter()
            .map(|(id, connection)| (*id, connection.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut table = ConnectionTable::new();

        let id1 = table.register(test_addr());
        let id2 = table.register(test_addr2());

        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let mut table = ConnectionTable::new();

        let id1 = table.register(test_addr());
        assert!(table.remove(id1));

        let id2 = table.register(test_addr());
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_remove_unknown_client() {
        let mut table = ConnectionTable::new();
        assert!(!table.remove(999));
        assert!(table.is_empty());
    }

    #[test]
    fn test_lookup_both_directions() {
        let mut table = ConnectionTable::new();
        let id = table.register(test_addr());

        assert_eq!(table.find_by_addr(test_addr()), Some(id));
        assert_eq!(table.addr_of(id), Some(test_addr()));

        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(table.find_by_addr(unknown), None);
        assert_eq!(table.addr_of(999), None);
    }

    #[test]
    fn test_timeout_sweep() {
        let mut table = ConnectionTable::new();
        let id1 = table.register(test_addr());
        let id2 = table.register(test_addr2());

        // Backdate one peer past the timeout window.
        if let Some(connection) = table.connections.get_mut(&id1) {
            connection.last_seen = Instant::now() - CLIENT_TIMEOUT - Duration::from_secs(1);
        }

        let timed_out = table.check_timeouts();
        assert_eq!(timed_out, vec![id1]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.addr_of(id2), Some(test_addr2()));
    }

    #[test]
    fn test_mark_seen_defers_timeout() {
        let mut table = ConnectionTable::new();
        let id = table.register(test_addr());

        if let Some(connection) = table.connections.get_mut(&id) {
            connection.last_seen = Instant::now() - CLIENT_TIMEOUT - Duration::from_secs(1);
        }
        table.mark_seen(id);

        assert!(table.check_timeouts().is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_addrs_for_broadcast() {
        let mut table = ConnectionTable::new();
        let id1 = table.register(test_addr());
        let id2 = table.register(test_addr2());

        let mut addrs = table.addrs();
        addrs.sort_by_key(|(id, _)| *id);

        assert_eq!(addrs, vec![(id1, test_addr()), (id2, test_addr2())]);
    }
}
