//! Session-facing sync layer
//!
//! Provides:
//! - Long-poll pull registry for clients that are already up to date
//! - The wire events exchanged with connected sessions
//! - [`SyncHub`], the single owner of document, log and waiters
//!
//! # Sync Protocol
//!
//! 1. Client sends `getDocument` and receives the text with its version
//! 2. Client sends `pullUpdates` with its version; the response arrives as
//!    soon as the log has anything newer
//! 3. Client sends `pushUpdates` with its version and local updates; a stale
//!    version is answered with `false` and the client pulls before retrying
//! 4. Every accepted push wakes the parked pulls it satisfies

mod hub;
mod protocol;
mod waiters;

pub use hub::{HubStatus, SessionHandle, SyncHub};
pub use protocol::{ClientEvent, FrameError, ServerEvent};
pub use waiters::{Delivery, PendingPull, PullOutcome, WaiterRegistry};
