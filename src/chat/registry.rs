use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Handle for a single chat WebSocket connection.
///
/// Owned by the session that created it; the registry keeps shared
/// references for fan-out only.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<String>,
    closed: Notify,
}

impl ConnectionHandle {
    fn new(user_id: String, sender: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            connected_at: Utc::now(),
            sender,
            closed: Notify::new(),
        }
    }

    /// Queue a wire-ready frame for this connection. Fails when the
    /// session's outbound channel is gone (connection is dead).
    pub async fn send(&self, frame: String) -> Result<(), mpsc::error::SendError<String>> {
        self.sender.send(frame).await
    }

    /// Ask the owning session to shut down (supersede or server shutdown).
    pub fn close(&self) {
        self.closed.notify_one();
    }

    /// Resolves when `close` has been called.
    pub async fn wait_closed(&self) {
        self.closed.notified().await;
    }
}

#[derive(Default)]
struct RegistryInner {
    /// user_id -> current live connection (at most one per user)
    by_user: HashMap<String, Arc<ConnectionHandle>>,
    /// Broadcast set: all live connections, keyed by connection id.
    /// Kept mutually consistent with `by_user` under the outer lock.
    connections: HashMap<Uuid, Arc<ConnectionHandle>>,
}

/// Tracks which users currently have an open chat channel.
///
/// One instance is constructed by the top-level service and injected into
/// every session handler. Both collections are mutated under a single lock
/// so no interleaving ever observes one updated without the other; the lock
/// is never held across an await (sends happen on snapshots).
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub unique_users: usize,
}

/// Result of one broadcast pass.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastOutcome {
    /// Connections the frame was queued for
    pub delivered: usize,
    /// Dead connections detected and removed during this pass
    pub failed: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new connection for `user_id`.
    ///
    /// Any existing connection for the same user is removed from both
    /// collections and actively closed, so a user never has more than one
    /// live connection and the collections stay consistent.
    pub fn register(&self, user_id: String, sender: mpsc::Sender<String>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(user_id.clone(), sender));

        let superseded = {
            let mut inner = self.write();
            let old = inner.by_user.insert(user_id, handle.clone());
            if let Some(ref old) = old {
                inner.connections.remove(&old.id);
            }
            inner.connections.insert(handle.id, handle.clone());
            old
        };

        if let Some(old) = superseded {
            tracing::info!(
                connection_id = %handle.id,
                superseded_id = %old.id,
                user_id = %handle.user_id,
                "Superseding existing connection for user"
            );
            old.close();
        }

        tracing::info!(connection_id = %handle.id, user_id = %handle.user_id, "Connection registered");

        handle
    }

    /// Unregister a connection, matched by identity.
    ///
    /// The keyed entry is removed only if it still points at this exact
    /// connection, so unregistering a superseded connection never evicts
    /// its replacement. Idempotent: unknown connections are a no-op.
    pub fn unregister(&self, handle: &ConnectionHandle) {
        let removed = {
            let mut inner = self.write();
            let removed = inner.connections.remove(&handle.id).is_some();
            let current = inner
                .by_user
                .get(&handle.user_id)
                .is_some_and(|h| h.id == handle.id);
            if current {
                inner.by_user.remove(&handle.user_id);
            }
            removed
        };

        if removed {
            tracing::info!(connection_id = %handle.id, user_id = %handle.user_id, "Connection unregistered");
        }
    }

    /// Best-effort direct send to one user. A missing recipient is not an
    /// error; a failed write is logged and left for broadcast cleanup.
    pub async fn send_to_user(&self, user_id: &str, frame: String) {
        let target = self.read().by_user.get(user_id).cloned();

        if let Some(conn) = target {
            if conn.send(frame).await.is_err() {
                tracing::debug!(
                    connection_id = %conn.id,
                    user_id = %user_id,
                    "Direct send failed, connection will be removed on next broadcast"
                );
            }
        }
    }

    /// Send a frame to every connection in the broadcast set.
    ///
    /// One connection's failure never blocks delivery to the rest. Failed
    /// connections are collected during the pass and removed from both
    /// collections afterwards, in a single mutation, so the set is never
    /// modified while it is being iterated.
    pub async fn broadcast(&self, frame: String) -> BroadcastOutcome {
        let targets: Vec<Arc<ConnectionHandle>> =
            self.read().connections.values().cloned().collect();

        if targets.is_empty() {
            return BroadcastOutcome {
                delivered: 0,
                failed: 0,
            };
        }

        let mut sends = FuturesUnordered::new();
        for conn in targets {
            let frame = frame.clone();
            sends.push(async move {
                match conn.send(frame).await {
                    Ok(()) => Ok(conn),
                    Err(_) => Err(conn),
                }
            });
        }

        let mut delivered = 0;
        let mut failed: Vec<Arc<ConnectionHandle>> = Vec::new();
        while let Some(result) = sends.next().await {
            match result {
                Ok(_) => delivered += 1,
                Err(conn) => failed.push(conn),
            }
        }

        if !failed.is_empty() {
            {
                let mut inner = self.write();
                for conn in &failed {
                    inner.connections.remove(&conn.id);
                    let current = inner
                        .by_user
                        .get(&conn.user_id)
                        .is_some_and(|h| h.id == conn.id);
                    if current {
                        inner.by_user.remove(&conn.user_id);
                    }
                }
            }
            for conn in &failed {
                conn.close();
            }
            tracing::debug!(
                removed = failed.len(),
                "Removed dead connections after broadcast"
            );
        }

        BroadcastOutcome {
            delivered,
            failed: failed.len(),
        }
    }

    /// Close every registered connection and clear both collections.
    /// Sessions observe the close signal and run their normal cleanup.
    pub fn close_all(&self) -> usize {
        let handles: Vec<Arc<ConnectionHandle>> = {
            let mut inner = self.write();
            inner.by_user.clear();
            inner.connections.drain().map(|(_, h)| h).collect()
        };

        for handle in &handles {
            handle.close();
        }

        if !handles.is_empty() {
            tracing::info!(closed = handles.len(), "Closed all registered connections");
        }

        handles.len()
    }

    pub fn stats(&self) -> RegistryStats {
        let inner = self.read();
        RegistryStats {
            total_connections: inner.connections.len(),
            unique_users: inner.by_user.len(),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(8)
    }

    /// Both collections must describe the same set of connections.
    fn assert_consistent(registry: &ConnectionRegistry) {
        let inner = registry.read();
        assert_eq!(inner.by_user.len(), inner.connections.len());
        for (user_id, handle) in &inner.by_user {
            let in_set = inner
                .connections
                .get(&handle.id)
                .expect("keyed connection missing from broadcast set");
            assert_eq!(&in_set.user_id, user_id);
            assert!(Arc::ptr_eq(in_set, handle));
        }
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();

        let handle = registry.register("user-1".to_string(), tx);
        assert_eq!(registry.stats().total_connections, 1);
        assert_consistent(&registry);

        registry.unregister(&handle);
        assert_eq!(registry.stats().total_connections, 0);
        assert_eq!(registry.stats().unique_users, 0);
        assert_consistent(&registry);
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = channel();
        let registered = registry.register("user-1".to_string(), tx1);

        // A handle that was never registered
        let (tx2, _rx2) = channel();
        let stranger = ConnectionHandle::new("user-2".to_string(), tx2);
        registry.unregister(&stranger);

        assert_eq!(registry.stats().total_connections, 1);
        assert_consistent(&registry);

        // Double unregister is also a no-op
        registry.unregister(&registered);
        registry.unregister(&registered);
        assert_eq!(registry.stats().total_connections, 0);
        assert_consistent(&registry);
    }

    #[tokio::test]
    async fn test_second_connection_supersedes_first() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        let first = registry.register("user-1".to_string(), tx1);
        let second = registry.register("user-1".to_string(), tx2);

        // Only one live connection for the user, collections consistent
        assert_eq!(registry.stats().total_connections, 1);
        assert_eq!(registry.stats().unique_users, 1);
        assert_consistent(&registry);

        // The superseded connection was told to close
        tokio::time::timeout(std::time::Duration::from_secs(1), first.wait_closed())
            .await
            .expect("superseded connection was not closed");

        // Direct send goes to the second connection only
        registry.send_to_user("user-1", "hello".to_string()).await;
        assert_eq!(rx2.recv().await.unwrap(), "hello");
        assert!(rx1.try_recv().is_err());

        registry.unregister(&second);
        assert_consistent(&registry);
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_replacement() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let first = registry.register("user-1".to_string(), tx1);
        let _second = registry.register("user-1".to_string(), tx2);

        // The superseded session's cleanup must not evict the new connection
        registry.unregister(&first);
        assert_eq!(registry.stats().total_connections, 1);
        assert_eq!(registry.stats().unique_users, 1);
        assert_consistent(&registry);
    }

    #[tokio::test]
    async fn test_send_to_absent_user_is_noop() {
        let registry = ConnectionRegistry::new();
        registry
            .send_to_user("nobody", "hello".to_string())
            .await;
        assert_eq!(registry.stats().total_connections, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_connections() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        registry.register("user-1".to_string(), tx1);
        registry.register("user-2".to_string(), tx2);

        let outcome = registry.broadcast("payload".to_string()).await;
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(rx1.recv().await.unwrap(), "payload");
        assert_eq!(rx2.recv().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failures_and_cleans_up() {
        let registry = ConnectionRegistry::new();
        let (tx1, rx1) = channel();
        let (tx2, mut rx2) = channel();
        let (tx3, rx3) = channel();
        registry.register("user-1".to_string(), tx1);
        registry.register("user-2".to_string(), tx2);
        registry.register("user-3".to_string(), tx3);

        // Two connections die (receivers dropped)
        drop(rx1);
        drop(rx3);

        let outcome = registry.broadcast("payload".to_string()).await;
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 2);
        assert_eq!(rx2.recv().await.unwrap(), "payload");

        // Failed connections are gone from both collections
        assert_eq!(registry.stats().total_connections, 1);
        assert_eq!(registry.stats().unique_users, 1);
        assert_consistent(&registry);
    }

    #[tokio::test]
    async fn test_close_all_empties_registry_and_signals_sessions() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let h1 = registry.register("user-1".to_string(), tx1);
        let h2 = registry.register("user-2".to_string(), tx2);

        let closed = registry.close_all();
        assert_eq!(closed, 2);
        assert_eq!(registry.stats().total_connections, 0);
        assert_consistent(&registry);

        for handle in [h1, h2] {
            tokio::time::timeout(std::time::Duration::from_secs(1), handle.wait_closed())
                .await
                .expect("session was not signalled on shutdown");
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            /// Register a fresh connection for one of a few users
            Register(u8),
            /// Unregister the user's current connection
            UnregisterCurrent(u8),
            /// Unregister a connection that was already superseded or removed
            UnregisterStale,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..4).prop_map(Op::Register),
                (0u8..4).prop_map(Op::UnregisterCurrent),
                Just(Op::UnregisterStale),
            ]
        }

        fn check_consistent(registry: &ConnectionRegistry) -> Result<(), TestCaseError> {
            let inner = registry.read();
            prop_assert_eq!(inner.by_user.len(), inner.connections.len());
            for (user_id, handle) in &inner.by_user {
                let in_set = inner.connections.get(&handle.id);
                prop_assert!(in_set.is_some_and(|h| Arc::ptr_eq(h, handle)));
                prop_assert_eq!(&handle.user_id, user_id);
            }
            Ok(())
        }

        proptest! {
            /// After any sequence of register and unregister calls the keyed
            /// mapping and the broadcast set describe exactly the same
            /// connections.
            #[test]
            fn registry_collections_stay_consistent(ops in proptest::collection::vec(op_strategy(), 1..64)) {
                let registry = ConnectionRegistry::new();
                // Receivers kept alive so sends (none here) would not fail
                let mut rxs = Vec::new();
                let mut current: std::collections::HashMap<u8, Arc<ConnectionHandle>> =
                    std::collections::HashMap::new();
                let mut stale: Vec<Arc<ConnectionHandle>> = Vec::new();

                for op in ops {
                    match op {
                        Op::Register(user) => {
                            let (tx, rx) = mpsc::channel(1);
                            rxs.push(rx);
                            let handle = registry.register(format!("user-{}", user), tx);
                            if let Some(old) = current.insert(user, handle) {
                                stale.push(old);
                            }
                        }
                        Op::UnregisterCurrent(user) => {
                            if let Some(handle) = current.remove(&user) {
                                registry.unregister(&handle);
                            }
                        }
                        Op::UnregisterStale => {
                            if let Some(handle) = stale.pop() {
                                registry.unregister(&handle);
                            }
                        }
                    }
                    check_consistent(&registry)?;
                }

                // Registry agrees with the model at the end
                prop_assert_eq!(registry.stats().unique_users, current.len());
            }
        }
    }
}
