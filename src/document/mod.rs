//! Shared document state
//!
//! The document is a seed text plus an append-only log of accepted updates.
//! Its version is the log length and its text is always the replay of the
//! log over the seed.
//!
//! # Push Protocol
//!
//! 1. Client pushes a batch of updates against the version it last saw
//! 2. A stale version is rejected with no state change
//! 3. Every update in the batch is applied to a scratch copy of the text
//! 4. Log and text are committed together only if the whole batch applied

mod state;
mod types;

pub use state::{DocumentState, PushError};
pub use types::{DocumentSnapshot, Update};
