//! Parked pull requests
//!
//! A pull at or ahead of the current version has nothing to return yet. It
//! is parked here and answered by the next push that moves the log past it.

use uuid::Uuid;

use crate::document::{DocumentState, Update};

/// A pull waiting for the log to grow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPull {
    pub session: Uuid,
    pub version: u64,
}

/// Updates owed to a session whose pull was satisfied
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub session: Uuid,
    pub updates: Vec<Update>,
}

/// Result of a pull request
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    /// Updates newer than the requested version, available now
    Ready(Vec<Update>),
    /// Nothing newer yet; the request was parked
    Parked,
}

/// Registry of parked pulls
#[derive(Debug, Default)]
pub struct WaiterRegistry {
    pending: Vec<PendingPull>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a pull immediately, or park it when there is nothing newer
    pub fn request_pull(
        &mut self,
        document: &DocumentState,
        session: Uuid,
        version: u64,
    ) -> PullOutcome {
        if version < document.version() {
            PullOutcome::Ready(document.updates_since(version).to_vec())
        } else {
            self.park(session, version);
            PullOutcome::Parked
        }
    }

    /// Park a pull for `session` at `version`
    pub fn park(&mut self, session: Uuid, version: u64) {
        self.pending.push(PendingPull { session, version });
    }

    /// Remove every pull the document has moved past and return what each is owed
    ///
    /// Pulls still at or ahead of the current version stay parked.
    pub fn drain(&mut self, document: &DocumentState) -> Vec<Delivery> {
        let current = document.version();
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pull| pull.version < current);
        self.pending = waiting;

        ready
            .into_iter()
            .map(|pull| Delivery {
                session: pull.session,
                updates: document.updates_since(pull.version).to_vec(),
            })
            .collect()
    }

    /// Forget every pull owned by `session`
    ///
    /// Returns how many were removed; unknown sessions remove nothing.
    pub fn drop_session(&mut self, session: Uuid) -> usize {
        let before = self.pending.len();
        self.pending.retain(|pull| pull.session != session);
        before - self.pending.len()
    }

    /// Number of parked pulls owned by `session`
    pub fn pending_for(&self, session: Uuid) -> usize {
        self.pending
            .iter()
            .filter(|pull| pull.session == session)
            .count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document_at(version: u64) -> DocumentState {
        let mut doc = DocumentState::new("");
        for v in 0..version {
            doc.push(v, vec![Update::new(json!([v, [0, "x"]]))]).unwrap();
        }
        doc
    }

    #[test]
    fn test_pull_behind_is_ready() {
        let doc = document_at(3);
        let mut waiters = WaiterRegistry::new();
        let session = Uuid::new_v4();

        let outcome = waiters.request_pull(&doc, session, 1);
        assert_eq!(outcome, PullOutcome::Ready(doc.updates_since(1).to_vec()));
        assert!(waiters.is_empty());
    }

    #[test]
    fn test_pull_current_is_parked() {
        let doc = document_at(2);
        let mut waiters = WaiterRegistry::new();
        let session = Uuid::new_v4();

        assert_eq!(waiters.request_pull(&doc, session, 2), PullOutcome::Parked);
        assert_eq!(waiters.request_pull(&doc, session, 5), PullOutcome::Parked);
        assert_eq!(waiters.pending_for(session), 2);
    }

    #[test]
    fn test_drain_delivers_once() {
        let mut doc = document_at(1);
        let mut waiters = WaiterRegistry::new();
        let early = Uuid::new_v4();
        let ahead = Uuid::new_v4();
        waiters.park(early, 1);
        waiters.park(ahead, 4);

        assert!(waiters.drain(&doc).is_empty());

        doc.push(1, vec![Update::new(json!([1, [0, "y"]]))]).unwrap();
        let deliveries = waiters.drain(&doc);
        assert_eq!(
            deliveries,
            vec![Delivery {
                session: early,
                updates: vec![Update::new(json!([1, [0, "y"]]))],
            }]
        );

        assert_eq!(waiters.len(), 1);
        assert_eq!(waiters.pending_for(ahead), 1);
        assert!(waiters.drain(&doc).is_empty());
    }

    #[test]
    fn test_drain_delivers_everything_since_requested_version() {
        let mut doc = document_at(1);
        let mut waiters = WaiterRegistry::new();
        let session = Uuid::new_v4();
        waiters.park(session, 1);

        doc.push(
            1,
            vec![
                Update::new(json!([1, [0, "a"]])),
                Update::new(json!([2, [0, "b"]])),
            ],
        )
        .unwrap();

        let deliveries = waiters.drain(&doc);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].updates.len(), 2);
    }

    #[test]
    fn test_drop_session() {
        let mut waiters = WaiterRegistry::new();
        let gone = Uuid::new_v4();
        let stays = Uuid::new_v4();
        waiters.park(gone, 0);
        waiters.park(gone, 0);
        waiters.park(stays, 0);

        assert_eq!(waiters.drop_session(gone), 2);
        assert_eq!(waiters.drop_session(gone), 0);
        assert_eq!(waiters.drop_session(Uuid::new_v4()), 0);
        assert_eq!(waiters.pending_for(stays), 1);
    }
}
