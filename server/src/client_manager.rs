//! Connected viewer bookkeeping for the host server
//!
//! This module tracks which UDP address belongs to which viewer:
//! - Viewer id assignment on connect, with a capacity limit
//! - Liveness tracking through heartbeats and automatic timeout
//! - Address lookup for outgoing scoreboard packets
//!
//! Scoreboard state itself lives in the registry; the client manager only
//! knows how to reach a viewer.

use crate::viewer::{Viewer, ViewerId};
use log::info;
use shared::MAX_ENTRY_LENGTH;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected viewer and its network state
#[derive(Debug)]
pub struct Client {
    /// Identity shared with the scoreboard registry
    pub viewer: Viewer,
    /// Network address for sending packets
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(viewer: Viewer, addr: SocketAddr) -> Self {
        Self {
            viewer,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn id(&self) -> ViewerId {
        self.viewer.id()
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<ViewerId, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new viewer, or returns `None` when the server is full.
    ///
    /// Blank names fall back to `viewer<id>`; long names are cut to the score
    /// entry limit so they can key playtime scores. A name already in use gets
    /// a `#n` suffix, since team entries and scores are keyed by name.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<Viewer> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = ViewerId(self.next_client_id);
        self.next_client_id += 1;

        let name = match shared::truncate(name.trim(), MAX_ENTRY_LENGTH) {
            "" => format!("viewer{}", id),
            name => name.to_string(),
        };
        let name = self.unique_name(name);
        let viewer = Viewer::new(id, name);

        info!("Viewer {} ({}) connected from {}", id, viewer.name(), addr);
        self.clients.insert(id, Client::new(viewer.clone(), addr));

        Some(viewer)
    }

    fn unique_name(&self, name: String) -> String {
        let taken = |candidate: &str| {
            self.clients
                .values()
                .any(|client| client.viewer.name() == candidate)
        };
        if !taken(&name) {
            return name;
        }

        let mut n = 2u32;
        loop {
            let suffix = format!("#{}", n);
            let base = shared::truncate(&name, MAX_ENTRY_LENGTH - suffix.chars().count());
            let candidate = format!("{}{}", base, suffix);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn remove_client(&mut self, id: ViewerId) -> Option<Viewer> {
        let client = self.clients.remove(&id)?;
        info!("Viewer {} disconnected", id);
        Some(client.viewer)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ViewerId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(Client::id)
    }

    /// Refreshes liveness of the client at `addr`
    pub fn touch(&mut self, addr: SocketAddr) -> bool {
        match self.clients.values_mut().find(|client| client.addr == addr) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Removes and returns every viewer silent for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Viewer> {
        let timed_out: Vec<ViewerId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(Client::id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove_client(id))
            .collect()
    }

    /// Addresses of the given viewers; unknown viewers are skipped
    pub fn addrs_for(&self, viewers: &[ViewerId]) -> Vec<SocketAddr> {
        viewers
            .iter()
            .filter_map(|id| self.clients.get(id))
            .map(|client| client.addr)
            .collect()
    }

    pub fn viewer(&self, id: ViewerId) -> Option<&Viewer> {
        self.clients.get(&id).map(|client| &client.viewer)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
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
    fn test_add_client_assigns_sequential_ids() {
        let mut manager = ClientManager::new(4);

        let alice = manager.add_client(test_addr(), "alice").unwrap();
        let bob = manager.add_client(test_addr2(), "bob").unwrap();

        assert_eq!(alice.id(), ViewerId(1));
        assert_eq!(bob.id(), ViewerId(2));
        assert_eq!(bob.name(), "bob");
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_client_name_normalization() {
        let mut manager = ClientManager::new(4);

        let blank = manager.add_client(test_addr(), "   ").unwrap();
        assert_eq!(blank.name(), "viewer1");

        let long = manager.add_client(test_addr2(), &"n".repeat(60)).unwrap();
        assert_eq!(long.name().chars().count(), MAX_ENTRY_LENGTH);
    }

    #[test]
    fn test_duplicate_names_get_unique_suffix() {
        let mut manager = ClientManager::new(4);

        let first = manager.add_client(test_addr(), "bob").unwrap();
        let second = manager.add_client(test_addr2(), " bob ").unwrap();
        let third = manager.add_client("127.0.0.1:8082".parse().unwrap(), "bob").unwrap();
        assert_eq!(first.name(), "bob");
        assert_eq!(second.name(), "bob#2");
        assert_eq!(third.name(), "bob#3");

        // A freed name is handed out again
        manager.remove_client(first.id());
        let fourth = manager.add_client("127.0.0.1:8083".parse().unwrap(), "bob").unwrap();
        assert_eq!(fourth.name(), "bob");
    }

    #[test]
    fn test_suffixed_long_name_stays_within_entry_limit() {
        let mut manager = ClientManager::new(4);
        let long = "n".repeat(60);

        let first = manager.add_client(test_addr(), &long).unwrap();
        let second = manager.add_client(test_addr2(), &long).unwrap();

        assert_eq!(first.name().chars().count(), MAX_ENTRY_LENGTH);
        assert_eq!(second.name().chars().count(), MAX_ENTRY_LENGTH);
        assert!(second.name().ends_with("#2"));
        assert_ne!(first.name(), second.name());
    }

    #[test]
    fn test_max_clients_limit() {
        let mut manager = ClientManager::new(1);

        assert!(manager.add_client(test_addr(), "alice").is_some());
        assert!(manager.add_client(test_addr2(), "bob").is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(4);
        let alice = manager.add_client(test_addr(), "alice").unwrap();

        assert_eq!(manager.remove_client(alice.id()), Some(alice.clone()));
        assert_eq!(manager.remove_client(alice.id()), None);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(4);
        let alice = manager.add_client(test_addr(), "alice").unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(alice.id()));
        assert_eq!(manager.find_client_by_addr(test_addr2()), None);
        assert!(manager.touch(test_addr()));
        assert!(!manager.touch(test_addr2()));
    }

    #[test]
    fn test_addrs_for_skips_unknown_viewers() {
        let mut manager = ClientManager::new(4);
        let alice = manager.add_client(test_addr(), "alice").unwrap();
        let bob = manager.add_client(test_addr2(), "bob").unwrap();

        let addrs = manager.addrs_for(&[bob.id(), ViewerId(99), alice.id()]);
        assert_eq!(addrs, vec![test_addr2(), test_addr()]);
        assert_eq!(manager.viewer(bob.id()), Some(&bob));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(4);
        let alice = manager.add_client(test_addr(), "alice").unwrap();

        assert!(manager.check_timeouts(Duration::from_secs(5)).is_empty());

        std::thread::sleep(Duration::from_millis(20));
        let timed_out = manager.check_timeouts(Duration::from_millis(10));
        assert_eq!(timed_out, vec![alice]);
        assert!(manager.is_empty());
    }
}
