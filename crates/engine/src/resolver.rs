// Version tracking and conflict resolution for inbound frames.
//
// Policy is last-writer-wins by version: an inbound revision at or above the
// session version replaces the document wholesale. Concurrent edits at the
// same version are not merged.

use coedit_common::normalize::same_content;
use coedit_common::protocol::{MessageKind, SyncMessage};
use coedit_common::types::{DocId, Version};
use thiserror::Error;

use crate::error::SyncError;
use crate::host::HostEditor;
use crate::session::Session;

/// Why an inbound frame was not applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("{0} frames are not applied to the document")]
    NotApplicable(&'static str),

    #[error("frame targets document `{actual}`, session is `{expected}`")]
    ForeignDocument { expected: DocId, actual: DocId },

    #[error("frame is the session's own broadcast")]
    SelfEcho,

    #[error("frame carries no content")]
    MissingContent,

    #[error("frame carries no version")]
    MissingVersion,

    #[error("stale version {incoming} (session is at {current})")]
    StaleVersion { incoming: Version, current: Version },

    #[error("content matches the current document")]
    Duplicate,
}

/// A remote revision that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRevision {
    pub content: String,
    pub version: Version,
}

/// Decide whether an inbound frame should be applied.
pub fn evaluate(session: &Session, message: SyncMessage) -> Result<RemoteRevision, Rejection> {
    if message.kind == MessageKind::Join {
        return Err(Rejection::NotApplicable(MessageKind::Join.as_str()));
    }
    if &message.doc_id != session.doc_id() {
        return Err(Rejection::ForeignDocument {
            expected: session.doc_id().clone(),
            actual: message.doc_id,
        });
    }
    if &message.user_id == session.user_id() {
        return Err(Rejection::SelfEcho);
    }

    let content = match message.content {
        Some(content) if !content.is_empty() => content,
        _ => return Err(Rejection::MissingContent),
    };
    let version = message.version.ok_or(Rejection::MissingVersion)?;
    if version < session.version() {
        return Err(Rejection::StaleVersion { incoming: version, current: session.version() });
    }
    if same_content(&content, session.last_content()) {
        return Err(Rejection::Duplicate);
    }

    Ok(RemoteRevision { content, version })
}

/// Write an accepted revision into the editor and advance the session.
///
/// The session is in `ApplyingRemote` for exactly the duration of the editor
/// write, so the content-change notification it raises is not taken for a
/// local edit. Fails if another apply is already in progress.
pub fn apply<E: HostEditor + ?Sized>(
    session: &mut Session,
    editor: &E,
    revision: RemoteRevision,
) -> Result<(), SyncError> {
    let guard = session.phase().begin_remote_apply().ok_or(SyncError::ApplyInProgress)?;
    editor.set_content(&revision.content);
    session.record_remote_apply(revision.content, revision.version);
    drop(guard);
    Ok(())
}
