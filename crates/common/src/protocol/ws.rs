// WebSocket message types and JSON codec for the coedit sync protocol.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DocId, UserId, Version};

/// Message kinds carried in the `type` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Client -> Server: announce presence with the current document snapshot.
    Join,
    /// Bidirectional: a debounced full-document edit.
    Update,
    /// Server -> Client: authoritative document state sent after a join.
    Init,
}

impl MessageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Update => "update",
            Self::Init => "init",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "join" => Some(Self::Join),
            "update" => Some(Self::Update),
            "init" => Some(Self::Init),
            _ => None,
        }
    }
}

/// A single protocol frame.
///
/// `content` and `version` are optional on the wire: `join` carries no
/// version, and inbound frames may omit either. Whether an inbound frame is
/// usable is decided by the conflict resolver, not the codec.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub doc_id: DocId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl SyncMessage {
    pub fn join(doc_id: DocId, user_id: UserId, content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Join,
            doc_id,
            user_id,
            content: Some(content.into()),
            version: None,
        }
    }

    pub fn update(
        doc_id: DocId,
        user_id: UserId,
        content: impl Into<String>,
        version: Version,
    ) -> Self {
        Self {
            kind: MessageKind::Update,
            doc_id,
            user_id,
            content: Some(content.into()),
            version: Some(version),
        }
    }

    pub fn init(
        doc_id: DocId,
        user_id: UserId,
        content: impl Into<String>,
        version: Version,
    ) -> Self {
        Self {
            kind: MessageKind::Init,
            doc_id,
            user_id,
            content: Some(content.into()),
            version: Some(version),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("message is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("message field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("failed to encode message: {0}")]
    Encode(String),
}

/// Permissive shape used for decoding so that every missing field can be
/// reported by name instead of as a generic serde error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    doc_id: Option<String>,
    user_id: Option<String>,
    content: Option<String>,
    version: Option<Version>,
}

/// Serialize a message to its JSON text frame.
pub fn encode(message: &SyncMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|error| ProtocolError::Encode(error.to_string()))
}

/// Parse and validate a JSON text frame.
pub fn decode(text: &str) -> Result<SyncMessage, ProtocolError> {
    let raw: RawMessage =
        serde_json::from_str(text).map_err(|error| ProtocolError::InvalidJson(error.to_string()))?;

    let kind = raw.kind.ok_or(ProtocolError::MissingField("type"))?;
    let kind = MessageKind::parse(&kind).ok_or(ProtocolError::UnknownType(kind))?;
    let doc_id = raw.doc_id.ok_or(ProtocolError::MissingField("docId"))?;
    if doc_id.is_empty() {
        return Err(ProtocolError::EmptyField("docId"));
    }
    let user_id = raw.user_id.ok_or(ProtocolError::MissingField("userId"))?;
    if user_id.is_empty() {
        return Err(ProtocolError::EmptyField("userId"));
    }

    Ok(SyncMessage {
        kind,
        doc_id: DocId::new(doc_id),
        user_id: UserId::new(user_id),
        content: raw.content,
        version: raw.version,
    })
}
