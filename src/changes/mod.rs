//! Change-set decoding and application
//!
//! Edits arrive in the compact JSON form produced by CodeMirror's
//! `ChangeSet.toJSON()`:
//!
//! ```text
//! changes   = [retain?, op, retain, op, ..., retain?]
//! retain    = integer                       ; copy N chars from the source
//! op        = integer                       ; delete N chars
//!           | [integer, segment, ...]       ; delete N chars, insert segments
//! ```
//!
//! Insert segments are joined with `\n`. When the first element is not an
//! integer an implicit leading retain of 0 is assumed.
//!
//! Positions and lengths count `char`s, not bytes.

mod decode;

pub use decode::{apply, replay, ChangeError, ChangeSet, ChangeStep};
