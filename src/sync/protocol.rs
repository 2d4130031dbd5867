//! Wire events exchanged with connected sessions
//!
//! Frames are JSON objects tagged by `event`. Inbound events carry their
//! arguments as sibling fields, outbound events carry a single `data` payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::{DocumentSnapshot, Update};

/// Events a session sends to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Request the current text and version
    GetDocument,
    /// Request every update after `version`
    PullUpdates { version: u64 },
    /// Push local updates made against `version`
    PushUpdates {
        version: u64,
        #[serde(default)]
        updates: Vec<Update>,
    },
}

/// Frame parsing errors
#[derive(Debug, Error)]
pub enum FrameError {
    /// A `pushUpdates` frame whose arguments have the wrong shape
    #[error("Malformed pushUpdates frame: {0}")]
    MalformedPush(#[source] serde_json::Error),

    /// Not JSON, an unknown event, or malformed arguments to another event
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl ClientEvent {
    /// Parse a text frame
    ///
    /// A frame tagged `pushUpdates` that fails to parse is reported as
    /// [`FrameError::MalformedPush`] so the sender can still be answered.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        serde_json::from_str(text).map_err(|e| {
            let is_push = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|frame| frame.get("event").and_then(Value::as_str).map(str::to_owned))
                .is_some_and(|event| event == "pushUpdates");
            if is_push {
                FrameError::MalformedPush(e)
            } else {
                FrameError::Malformed(e)
            }
        })
    }

    /// Event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetDocument => "getDocument",
            ClientEvent::PullUpdates { .. } => "pullUpdates",
            ClientEvent::PushUpdates { .. } => "pushUpdates",
        }
    }
}

/// Events the server sends to a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    GetDocumentResponse(DocumentSnapshot),
    PullUpdateResponse { updates: Vec<Update> },
    PushUpdateResponse(bool),
}
