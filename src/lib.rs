//! Collab Server Library
//!
//! A shared text document kept in sync across clients. Clients push batches
//! of CodeMirror change sets against the version they last saw and pull the
//! updates other clients made, in order.
//!
//! # Modules
//!
//! - `changes`: Change-set decoding and application
//! - `document`: Versioned document state and update log
//! - `sync`: Parked pulls, wire events and the sync hub
//! - `routes`: WebSocket and HTTP endpoints

pub mod changes;
pub mod config;
pub mod document;
pub mod error;
pub mod routes;
pub mod state;
pub mod sync;
