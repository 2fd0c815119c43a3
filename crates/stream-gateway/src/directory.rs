//! Directory of live connections.
//!
//! The directory lock is only ever held to copy out `Arc<Connection>`
//! handles. Delivery, registry lookups and callbacks all run after it is
//! released, so a slow recipient can never stall registration or removal.

use crate::connection::Connection;
use crate::observability::metrics;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// All connections currently attached to this gateway, by connection id.
#[derive(Debug, Default)]
pub struct ConnectionDirectory {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl ConnectionDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. A previous connection under the same id is
    /// replaced, cancelled, and returned.
    pub fn register(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let id = connection.id().to_string();
        let (previous, count) = {
            let mut connections = self.connections.write();
            let previous = connections.insert(id.clone(), connection);
            (previous, connections.len())
        };
        metrics::set_connections_active(count);

        if let Some(previous) = &previous {
            warn!(
                target: "gw.directory",
                connection_id = %id,
                "Connection id reused, cancelling previous connection"
            );
            previous.outbound().cancel();
        } else {
            debug!(
                target: "gw.directory",
                connection_id = %id,
                active = count,
                "Connection registered"
            );
        }
        previous
    }

    /// Remove `connection` and cancel it. Any in-flight `send_or_cancel`
    /// for it unblocks and its writer task exits.
    ///
    /// Only that exact connection is removed: if its id has since been
    /// reused by a newer registration, the newer one stays. Returns whether
    /// anything was removed.
    pub fn remove(&self, connection: &Arc<Connection>) -> bool {
        let remaining = {
            let mut connections = self.connections.write();
            match connections.get(connection.id()) {
                Some(current) if Arc::ptr_eq(current, connection) => {
                    connections.remove(connection.id());
                    Some(connections.len())
                }
                _ => None,
            }
        };

        let Some(count) = remaining else {
            debug!(
                target: "gw.directory",
                connection_id = %connection.id(),
                "Connection already gone or replaced, nothing removed"
            );
            return false;
        };

        metrics::set_connections_active(count);
        connection.outbound().cancel();
        connection.subscriptions().clear();

        debug!(
            target: "gw.directory",
            connection_id = %connection.id(),
            active = count,
            "Connection removed"
        );
        true
    }

    #[must_use]
    pub fn get(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections.read().get(connection_id).cloned()
    }

    /// Handles of every connection matching `predicate`, copied out under
    /// the read lock.
    pub fn snapshot_matching<P>(&self, predicate: P) -> Vec<Arc<Connection>>
    where
        P: Fn(&Connection) -> bool,
    {
        self.connections
            .read()
            .values()
            .filter(|connection| predicate(connection))
            .cloned()
            .collect()
    }

    /// Run `f` on every connection matching `predicate`. `f` runs with no
    /// directory lock held, so it may take its time or call back into the
    /// directory.
    pub fn for_each_matching<P, F>(&self, predicate: P, mut f: F)
    where
        P: Fn(&Connection) -> bool,
        F: FnMut(&Arc<Connection>),
    {
        for connection in &self.snapshot_matching(predicate) {
            f(connection);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}
