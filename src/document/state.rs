//! Versioned document state

use thiserror::Error;

use super::types::{DocumentSnapshot, Update};
use crate::changes::{self, ChangeError};

/// Reasons a push is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    /// The client pushed against a version other than the current one
    #[error("Version conflict: pushed against {claimed}, document is at {current}")]
    VersionConflict { claimed: u64, current: u64 },

    /// An update in the batch could not be decoded
    #[error("Update {index} in batch is malformed: {source}")]
    Decode {
        index: usize,
        #[source]
        source: ChangeError,
    },
}

/// The document text and the log of updates that produced it
#[derive(Debug, Clone)]
pub struct DocumentState {
    seed: String,
    text: String,
    log: Vec<Update>,
}

impl DocumentState {
    /// Create a document at version 0 holding `seed`
    pub fn new(seed: impl Into<String>) -> Self {
        let seed = seed.into();
        Self {
            text: seed.clone(),
            seed,
            log: Vec::new(),
        }
    }

    /// Current version (the number of logged updates)
    pub fn version(&self) -> u64 {
        self.log.len() as u64
    }

    /// Current text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The full update log
    pub fn log(&self) -> &[Update] {
        &self.log
    }

    /// Snapshot of version and text
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            version: self.version(),
            doc: self.text.clone(),
        }
    }

    /// Updates the holder of `version` has not seen yet
    ///
    /// Empty when `version` is current or ahead.
    pub fn updates_since(&self, version: u64) -> &[Update] {
        let start = usize::try_from(version).unwrap_or(usize::MAX);
        self.log.get(start..).unwrap_or(&[])
    }

    /// Apply a batch of updates pushed against `claimed`
    ///
    /// The batch is reduced over a scratch copy of the text first; the log and
    /// text change only when every update applied. Returns the new version.
    pub fn push(&mut self, claimed: u64, batch: Vec<Update>) -> Result<u64, PushError> {
        let current = self.version();
        if claimed != current {
            return Err(PushError::VersionConflict { claimed, current });
        }

        let mut scratch = self.text.clone();
        for (index, update) in batch.iter().enumerate() {
            scratch = changes::apply(&scratch, &update.changes)
                .map_err(|source| PushError::Decode { index, source })?;
        }

        self.text = scratch;
        self.log.extend(batch);
        Ok(self.version())
    }

    /// Whether the text still equals a replay of the log over the seed
    pub fn verify_replay(&self) -> bool {
        changes::replay(&self.seed, self.log.iter().map(|u| &u.changes))
            .map(|replayed| replayed == self.text)
            .unwrap_or(false)
    }
}
