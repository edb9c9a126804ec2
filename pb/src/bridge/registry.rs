//! Registry of connected front-end clients

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use super::messages::ClientEvent;

/// A connected front-end and the channel feeding its transport
#[derive(Debug, Clone)]
pub struct ClientConnection {
    client_id: String,
    tx: mpsc::Sender<ClientEvent>,
    /// Connection order, used to pick a default client
    seq: u64,
}

impl ClientConnection {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn sender(&self) -> &mpsc::Sender<ClientEvent> {
        &self.tx
    }

    /// True if `tx` feeds this connection
    pub fn is_connection(&self, tx: &mpsc::Sender<ClientEvent>) -> bool {
        self.tx.same_channel(tx)
    }
}

/// Connected clients keyed by client id
///
/// Owned by the bridge task; nothing else mutates it.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientConnection>,
    next_seq: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client, replacing any earlier connection with the same id
    ///
    /// A replaced client counts as newly connected for `first_available`.
    pub fn register(&mut self, client_id: impl Into<String>, tx: mpsc::Sender<ClientEvent>) {
        let client_id = client_id.into();
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(%client_id, seq, "ClientRegistry::register");
        self.clients.insert(client_id.clone(), ClientConnection { client_id, tx, seq });
    }

    /// Remove a client; unknown ids are ignored
    pub fn unregister(&mut self, client_id: &str) -> Option<ClientConnection> {
        debug!(%client_id, "ClientRegistry::unregister");
        self.clients.remove(client_id)
    }

    /// Remove a client only if it is still registered on `tx`
    pub fn unregister_connection(&mut self, client_id: &str, tx: &mpsc::Sender<ClientEvent>) -> Option<ClientConnection> {
        match self.clients.get(client_id) {
            Some(conn) if conn.is_connection(tx) => self.unregister(client_id),
            Some(_) => {
                debug!(%client_id, "ClientRegistry::unregister_connection: superseded connection, keeping client");
                None
            }
            None => None,
        }
    }

    pub fn find_by_client_id(&self, client_id: &str) -> Option<&ClientConnection> {
        self.clients.get(client_id)
    }

    /// The earliest connected client still present
    pub fn first_available(&self) -> Option<&ClientConnection> {
        self.clients.values().min_by_key(|conn| conn.seq)
    }

    /// `find_by_client_id` when a target is given, else `first_available`
    pub fn resolve(&self, target: Option<&str>) -> Option<&ClientConnection> {
        match target {
            Some(client_id) => self.find_by_client_id(client_id),
            None => self.first_available(),
        }
    }

    /// Clients in connection order
    pub fn connections(&self) -> Vec<&ClientConnection> {
        let mut conns: Vec<_> = self.clients.values().collect();
        conns.sort_by_key(|conn| conn.seq);
        conns
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.connections()
            .into_iter()
            .map(|conn| conn.client_id.clone())
            .collect()
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

    fn channel() -> mpsc::Sender<ClientEvent> {
        mpsc::channel(1).0
    }

    #[test]
    fn test_empty_registry_has_no_first() {
        let registry = ClientRegistry::new();
        assert!(registry.first_available().is_none());
        assert!(registry.resolve(None).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_first_available_is_earliest_connection() {
        let mut registry = ClientRegistry::new();
        registry.register("b", channel());
        registry.register("a", channel());
        registry.register("c", channel());

        assert_eq!(registry.first_available().unwrap().client_id(), "b");
        registry.unregister("b");
        assert_eq!(registry.first_available().unwrap().client_id(), "a");
        assert_eq!(registry.client_ids(), vec!["a", "c"]);
    }

    #[test]
    fn test_reregister_moves_to_back() {
        let mut registry = ClientRegistry::new();
        registry.register("a", channel());
        registry.register("b", channel());
        registry.register("a", channel());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.first_available().unwrap().client_id(), "b");
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ClientRegistry::new();
        registry.register("a", channel());
        assert!(registry.unregister("a").is_some());
        assert!(registry.unregister("a").is_none());
        assert!(registry.unregister("never").is_none());
    }

    #[test]
    fn test_resolve_specific_client() {
        let mut registry = ClientRegistry::new();
        registry.register("a", channel());
        registry.register("b", channel());

        assert_eq!(registry.resolve(Some("b")).unwrap().client_id(), "b");
        assert!(registry.resolve(Some("zzz")).is_none());
    }

    #[test]
    fn test_superseded_connection_does_not_unregister() {
        let mut registry = ClientRegistry::new();
        let old = channel();
        let new = channel();
        registry.register("a", old.clone());
        registry.register("a", new.clone());

        assert!(registry.unregister_connection("a", &old).is_none());
        assert!(registry.find_by_client_id("a").is_some());
        assert!(registry.unregister_connection("a", &new).is_some());
        assert!(registry.find_by_client_id("a").is_none());
    }
}
