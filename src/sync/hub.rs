//! Sync hub
//!
//! Owns the document, its log, the parked pulls and the session table
//! behind a single lock. Every operation runs start to finish under that
//! lock, so two pushes can never both pass the version check against the
//! same version, and a pull sees the log either before or after a push.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use super::protocol::{ClientEvent, ServerEvent};
use super::waiters::{PullOutcome, WaiterRegistry};
use crate::document::{DocumentSnapshot, DocumentState, PushError, Update};

/// A connected session's identity and outbound event stream
#[derive(Debug)]
pub struct SessionHandle {
    pub id: Uuid,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Summary of the hub for status endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub version: u64,
    pub sessions: usize,
    #[serde(rename = "pendingPulls")]
    pub pending_pulls: usize,
}

/// Shared handle to the sync state
#[derive(Clone)]
pub struct SyncHub {
    inner: Arc<Mutex<HubInner>>,
}

struct HubInner {
    document: DocumentState,
    waiters: WaiterRegistry,
    sessions: HashMap<Uuid, SessionEntry>,
}

struct SessionEntry {
    outbound: mpsc::UnboundedSender<ServerEvent>,
    connected_at: DateTime<Utc>,
}

impl HubInner {
    /// Queue an event for a session
    ///
    /// Events for unknown or closed sessions are dropped.
    fn send(&self, session: Uuid, event: ServerEvent) {
        match self.sessions.get(&session) {
            Some(entry) => {
                if entry.outbound.send(event).is_err() {
                    tracing::debug!(session_id = %session, "Session channel closed, event dropped");
                }
            }
            None => {
                tracing::debug!(session_id = %session, "Event for unknown session dropped");
            }
        }
    }
}

impl SyncHub {
    /// Create a hub whose document starts as `seed` at version 0
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner {
                document: DocumentState::new(seed),
                waiters: WaiterRegistry::new(),
                sessions: HashMap::new(),
            })),
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Register a new session
    pub async fn connect(&self) -> SessionHandle {
        let id = Uuid::new_v4();
        let (outbound, events) = mpsc::unbounded_channel();

        let mut inner = self.inner.lock().await;
        inner.sessions.insert(
            id,
            SessionEntry {
                outbound,
                connected_at: Utc::now(),
            },
        );

        tracing::info!(session_id = %id, sessions = inner.sessions.len(), "Client connected");

        SessionHandle { id, events }
    }

    /// Remove a session and every pull it had parked
    ///
    /// Disconnecting an unknown session is a no-op.
    pub async fn disconnect(&self, session: Uuid) {
        let mut inner = self.inner.lock().await;
        let dropped = inner.waiters.drop_session(session);

        if let Some(entry) = inner.sessions.remove(&session) {
            let connected_for = Utc::now() - entry.connected_at;
            tracing::info!(
                session_id = %session,
                dropped_pulls = dropped,
                connected_secs = connected_for.num_seconds(),
                "Client disconnected"
            );
        }
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    /// Dispatch an inbound event from `session`
    pub async fn handle_event(&self, session: Uuid, event: ClientEvent) {
        match event {
            ClientEvent::GetDocument => {
                self.get_document(session).await;
            }
            ClientEvent::PullUpdates { version } => {
                self.pull_updates(session, version).await;
            }
            ClientEvent::PushUpdates { version, updates } => {
                self.push_updates(session, version, updates).await;
            }
        }
    }

    /// Send the current document to `session`
    pub async fn get_document(&self, session: Uuid) -> DocumentSnapshot {
        let inner = self.inner.lock().await;
        let snapshot = inner.document.snapshot();
        inner.send(session, ServerEvent::GetDocumentResponse(snapshot.clone()));
        snapshot
    }

    /// Answer a pull now, or park it until a push moves past `version`
    ///
    /// Returns `None` for unknown sessions: nothing is served or parked, since
    /// no disconnect would ever remove the parked pull.
    pub async fn pull_updates(&self, session: Uuid, version: u64) -> Option<PullOutcome> {
        let mut inner = self.inner.lock().await;

        if !inner.sessions.contains_key(&session) {
            tracing::debug!(session_id = %session, version, "Pull from unknown session ignored");
            return None;
        }

        let HubInner {
            document, waiters, ..
        } = &mut *inner;
        let outcome = waiters.request_pull(document, session, version);

        match &outcome {
            PullOutcome::Ready(updates) => {
                tracing::debug!(
                    session_id = %session,
                    version,
                    count = updates.len(),
                    "Pull served"
                );
                inner.send(
                    session,
                    ServerEvent::PullUpdateResponse {
                        updates: updates.clone(),
                    },
                );
            }
            PullOutcome::Parked => {
                tracing::debug!(session_id = %session, version, "Pull parked");
            }
        }

        Some(outcome)
    }

    /// Apply a batch pushed against `version`
    ///
    /// On success every parked pull the push satisfies is answered before the
    /// pusher gets its acknowledgement. Returns whether the batch was accepted.
    pub async fn push_updates(&self, session: Uuid, version: u64, batch: Vec<Update>) -> bool {
        let mut inner = self.inner.lock().await;
        let count = batch.len();

        let accepted = match inner.document.push(version, batch) {
            Ok(new_version) => {
                tracing::info!(
                    session_id = %session,
                    from = version,
                    to = new_version,
                    count,
                    "Push accepted"
                );
                tracing::debug!(chars = inner.document.text().chars().count(), "Document updated");

                let HubInner {
                    document, waiters, ..
                } = &mut *inner;
                for delivery in waiters.drain(document) {
                    inner.send(
                        delivery.session,
                        ServerEvent::PullUpdateResponse {
                            updates: delivery.updates,
                        },
                    );
                }
                true
            }
            Err(PushError::VersionConflict { claimed, current }) => {
                tracing::debug!(
                    session_id = %session,
                    claimed,
                    current,
                    "Push rejected: stale version"
                );
                false
            }
            Err(e @ PushError::Decode { .. }) => {
                tracing::warn!(session_id = %session, error = %e, "Push rejected: malformed update");
                false
            }
        };

        inner.send(session, ServerEvent::PushUpdateResponse(accepted));
        accepted
    }

    /// Answer a push whose frame could not be parsed
    pub async fn reject_push(&self, session: Uuid) {
        let inner = self.inner.lock().await;
        tracing::warn!(session_id = %session, "Push rejected: malformed frame");
        inner.send(session, ServerEvent::PushUpdateResponse(false));
    }

    // ========================================================================
    // Query Methods
    // ========================================================================

    /// Current document
    pub async fn snapshot(&self) -> DocumentSnapshot {
        self.inner.lock().await.document.snapshot()
    }

    /// Updates after `version` together with the current version
    ///
    /// Never parks.
    pub async fn updates_since(&self, version: u64) -> (Vec<Update>, u64) {
        let inner = self.inner.lock().await;
        (
            inner.document.updates_since(version).to_vec(),
            inner.document.version(),
        )
    }

    /// Version, connected sessions and parked pulls
    pub async fn status(&self) -> HubStatus {
        let inner = self.inner.lock().await;
        HubStatus {
            version: inner.document.version(),
            sessions: inner.sessions.len(),
            pending_pulls: inner.waiters.len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edit(changes: serde_json::Value) -> Update {
        Update::new(changes)
    }

    #[tokio::test]
    async fn test_get_document() {
        let hub = SyncHub::new("Start document");
        let mut session = hub.connect().await;

        let snapshot = hub.get_document(session.id).await;
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.doc, "Start document");
        assert_eq!(
            session.events.try_recv().unwrap(),
            ServerEvent::GetDocumentResponse(snapshot)
        );
    }

    #[tokio::test]
    async fn test_push_then_stale_push() {
        let hub = SyncHub::new("Hello world");
        let mut first = hub.connect().await;
        let mut second = hub.connect().await;

        assert!(hub.push_updates(first.id, 0, vec![edit(json!([5, [0, " there"]]))]).await);
        assert!(!hub.push_updates(second.id, 0, vec![edit(json!([0, [5]]))]).await);

        assert_eq!(
            first.events.try_recv().unwrap(),
            ServerEvent::PushUpdateResponse(true)
        );
        assert_eq!(
            second.events.try_recv().unwrap(),
            ServerEvent::PushUpdateResponse(false)
        );

        let snapshot = hub.snapshot().await;
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.doc, "Hello there world");
    }

    #[tokio::test]
    async fn test_malformed_batch_is_atomic() {
        let hub = SyncHub::new("Hello");
        let mut session = hub.connect().await;

        let batch = vec![edit(json!([5, [0, "!"]])), edit(json!([0, {"bad": 1}]))];
        assert!(!hub.push_updates(session.id, 0, batch).await);
        assert_eq!(
            session.events.try_recv().unwrap(),
            ServerEvent::PushUpdateResponse(false)
        );

        let snapshot = hub.snapshot().await;
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.doc, "Hello");
    }

    #[tokio::test]
    async fn test_pull_behind_is_served_immediately() {
        let hub = SyncHub::new("");
        let mut writer = hub.connect().await;
        let mut reader = hub.connect().await;

        hub.push_updates(writer.id, 0, vec![edit(json!([[0, "a"]])), edit(json!([1, [0, "b"]]))])
            .await;
        let _ = writer.events.try_recv();

        let outcome = hub.pull_updates(reader.id, 1).await;
        assert_eq!(outcome, Some(PullOutcome::Ready(vec![edit(json!([1, [0, "b"]]))])));
        assert_eq!(
            reader.events.try_recv().unwrap(),
            ServerEvent::PullUpdateResponse {
                updates: vec![edit(json!([1, [0, "b"]]))]
            }
        );
        assert_eq!(hub.status().await.pending_pulls, 0);
    }

    #[tokio::test]
    async fn test_parked_pull_fulfilled_by_push() {
        let hub = SyncHub::new("abc");
        let mut writer = hub.connect().await;
        let mut reader = hub.connect().await;

        assert_eq!(hub.pull_updates(reader.id, 0).await, Some(PullOutcome::Parked));
        assert!(reader.events.try_recv().is_err());

        let update = edit(json!([3, [0, "d"]])).with_client_id("writer");
        assert!(hub.push_updates(writer.id, 0, vec![update.clone()]).await);

        assert_eq!(
            reader.events.try_recv().unwrap(),
            ServerEvent::PullUpdateResponse {
                updates: vec![update]
            }
        );
        assert!(reader.events.try_recv().is_err());
        assert_eq!(
            writer.events.try_recv().unwrap(),
            ServerEvent::PushUpdateResponse(true)
        );
        assert_eq!(hub.status().await.pending_pulls, 0);
    }

    #[tokio::test]
    async fn test_pusher_waiter_notified_before_ack() {
        let hub = SyncHub::new("");
        let mut session = hub.connect().await;

        hub.pull_updates(session.id, 0).await;
        hub.push_updates(session.id, 0, vec![edit(json!([[0, "x"]]))]).await;

        assert!(matches!(
            session.events.try_recv().unwrap(),
            ServerEvent::PullUpdateResponse { .. }
        ));
        assert_eq!(
            session.events.try_recv().unwrap(),
            ServerEvent::PushUpdateResponse(true)
        );
    }

    #[tokio::test]
    async fn test_rejected_push_leaves_waiters_parked() {
        let hub = SyncHub::new("");
        let writer = hub.connect().await;
        let reader = hub.connect().await;

        hub.pull_updates(reader.id, 0).await;
        hub.push_updates(writer.id, 3, vec![edit(json!([[0, "x"]]))]).await;

        assert_eq!(hub.status().await.pending_pulls, 1);
    }

    #[tokio::test]
    async fn test_disconnect_drops_parked_pulls() {
        let hub = SyncHub::new("");
        let writer = hub.connect().await;
        let reader = hub.connect().await;

        hub.pull_updates(reader.id, 0).await;
        hub.pull_updates(reader.id, 0).await;
        assert_eq!(hub.status().await.pending_pulls, 2);

        hub.disconnect(reader.id).await;
        let status = hub.status().await;
        assert_eq!(status.pending_pulls, 0);
        assert_eq!(status.sessions, 1);

        // Nothing is delivered to the departed session
        let mut events = reader.events;
        assert!(hub.push_updates(writer.id, 0, vec![edit(json!([[0, "x"]]))]).await);
        assert!(events.try_recv().is_err());

        // Disconnecting twice is harmless
        hub.disconnect(reader.id).await;
        hub.disconnect(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_unknown_session_pull_ignored() {
        let hub = SyncHub::new("");
        let writer = hub.connect().await;
        hub.push_updates(writer.id, 0, vec![edit(json!([[0, "x"]]))]).await;

        assert_eq!(hub.pull_updates(Uuid::new_v4(), 0).await, None);
        assert_eq!(hub.pull_updates(Uuid::new_v4(), 1).await, None);
        assert_eq!(hub.status().await.pending_pulls, 0);
    }

    #[tokio::test]
    async fn test_reject_push_answers_false() {
        let hub = SyncHub::new("abc");
        let mut session = hub.connect().await;

        hub.reject_push(session.id).await;
        assert_eq!(
            session.events.try_recv().unwrap(),
            ServerEvent::PushUpdateResponse(false)
        );
        assert_eq!(hub.snapshot().await.version, 0);

        // Unknown sessions get nothing
        hub.reject_push(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn test_handle_event_dispatch() {
        let hub = SyncHub::new("x");
        let mut session = hub.connect().await;

        hub.handle_event(
            session.id,
            ClientEvent::PushUpdates {
                version: 0,
                updates: vec![edit(json!([1, [0, "y"]]))],
            },
        )
        .await;
        hub.handle_event(session.id, ClientEvent::GetDocument).await;

        assert_eq!(
            session.events.try_recv().unwrap(),
            ServerEvent::PushUpdateResponse(true)
        );
        assert_eq!(
            session.events.try_recv().unwrap(),
            ServerEvent::GetDocumentResponse(DocumentSnapshot {
                version: 1,
                doc: "xy".to_string()
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_pushes_against_same_version() {
        let hub = SyncHub::new("");
        let mut tasks = Vec::new();

        for i in 0..16 {
            let hub = hub.clone();
            tasks.push(tokio::spawn(async move {
                let session = hub.connect().await;
                hub.push_updates(session.id, 0, vec![edit(json!([[0, i.to_string()]]))])
                    .await
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(hub.snapshot().await.version, 1);
    }
}
