use std::collections::HashSet;

use crate::api::peripheral_event::ConnectionHandle;

#[derive(Debug, Default)]
pub struct SessionRegistry(HashSet<ConnectionHandle>);

impl SessionRegistry {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    /// Returns `false` when the handle was already registered.
    pub fn on_connect(&mut self, connection: ConnectionHandle) -> bool {
        self.0.insert(connection)
    }

    /// Returns `false` when the handle was never registered.
    pub fn on_disconnect(&mut self, connection: ConnectionHandle) -> bool {
        self.0.remove(&connection)
    }

    pub fn contains(&self, connection: &ConnectionHandle) -> bool {
        self.0.contains(connection)
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn connections(&self) -> Vec<ConnectionHandle> {
        let mut connections: Vec<_> = self.0.iter().copied().collect();
        connections.sort();
        connections
    }
}
