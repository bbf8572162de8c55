// Local change detection: echo gate, staleness check, no-op filter, version bump.
//
// Detection runs in two steps. The gate runs synchronously inside the
// editor's content-change callback; it is the only place echo suppression
// happens, dropping notifications raised by a remote apply. Surviving
// notifications are stamped with the current apply generation and forwarded
// to the event loop, which calls `observe` to discard notifications a later
// remote apply has overtaken, filter formatting-only changes and register
// real ones.

use coedit_common::normalize::same_content;
use coedit_common::types::Version;
use tokio::sync::mpsc;
use tracing::trace;

use crate::debounce::OutboundDebouncer;
use crate::host::ContentChangeCallback;
use crate::session::{PhaseCell, Session};

/// A content-change notification forwarded by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEdit {
    pub content: String,
    /// Apply generation current when the editor raised the notification.
    pub generation: u64,
}

/// Outcome of observing one local content-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalChange {
    /// A remote apply replaced the editor content after this edit was raised.
    Superseded,
    /// Same content as the session cursor after normalization.
    Unchanged,
    /// A genuine edit, registered with the debouncer at this version.
    Recorded { version: Version, superseded: bool },
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    phase: PhaseCell,
}

impl ChangeDetector {
    pub fn new(phase: PhaseCell) -> Self {
        Self { phase }
    }

    /// Build the editor callback that forwards local edits to `tx`.
    ///
    /// Notifications raised while the session is applying remote content are
    /// dropped here, before they ever reach the event loop.
    pub fn gate(&self, tx: mpsc::UnboundedSender<LocalEdit>) -> ContentChangeCallback {
        let phase = self.phase.clone();
        Box::new(move |content| {
            if phase.is_applying_remote() {
                trace!("content change raised by remote apply, suppressed");
                return;
            }
            let edit = LocalEdit { content: content.to_string(), generation: phase.generation() };
            // The receiver is gone only after teardown.
            let _ = tx.send(edit);
        })
    }

    /// Classify a forwarded notification and record it if it is a real edit.
    pub fn observe(
        &self,
        session: &mut Session,
        debouncer: &mut OutboundDebouncer,
        edit: LocalEdit,
    ) -> LocalChange {
        if edit.generation != self.phase.generation() {
            return LocalChange::Superseded;
        }
        if same_content(&edit.content, session.last_content()) {
            return LocalChange::Unchanged;
        }

        let version = session.record_local_edit(edit.content.clone());
        let superseded = debouncer.register(edit.content);
        LocalChange::Recorded { version, superseded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_common::types::{DocId, UserId};

    use crate::debounce::DebounceConfig;
    use crate::session::SessionIdentity;

    fn fixture() -> (Session, OutboundDebouncer, ChangeDetector) {
        let identity = SessionIdentity { doc_id: DocId::new("doc"), user_id: UserId::new("me") };
        let session = Session::new(identity, "");
        let detector = ChangeDetector::new(session.phase().clone());
        (session, OutboundDebouncer::new(DebounceConfig::default()), detector)
    }

    fn edit(content: &str) -> LocalEdit {
        LocalEdit { content: content.to_string(), generation: 0 }
    }

    #[test]
    fn repeated_identical_edit_bumps_version_once() {
        let (mut session, mut debouncer, detector) = fixture();

        let first = detector.observe(&mut session, &mut debouncer, edit("a"));
        let second = detector.observe(&mut session, &mut debouncer, edit("a"));

        assert_eq!(first, LocalChange::Recorded { version: 1, superseded: false });
        assert_eq!(second, LocalChange::Unchanged);
        assert_eq!(session.version(), 1);
    }

    #[test]
    fn formatting_only_change_is_unchanged() {
        let (mut session, mut debouncer, detector) = fixture();
        detector.observe(&mut session, &mut debouncer, edit("<p>a</p><p>b</p>"));

        let reformatted = edit("<p>a</p>\n  <p>b</p>\n");
        let outcome = detector.observe(&mut session, &mut debouncer, reformatted);

        assert_eq!(outcome, LocalChange::Unchanged);
        assert_eq!(session.version(), 1);
    }

    #[test]
    fn successive_edits_supersede_pending_change() {
        let (mut session, mut debouncer, detector) = fixture();
        detector.observe(&mut session, &mut debouncer, edit("a"));
        let outcome = detector.observe(&mut session, &mut debouncer, edit("ab"));

        assert_eq!(outcome, LocalChange::Recorded { version: 2, superseded: true });
        assert_eq!(session.last_content(), "ab");
        assert!(debouncer.is_pending());
    }

    #[test]
    fn edit_raised_before_a_remote_apply_is_discarded() {
        let (mut session, mut debouncer, detector) = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = detector.gate(tx);

        callback("<p>draft</p>");
        drop(session.phase().begin_remote_apply().expect("idle"));
        session.record_remote_apply("<p>remote</p>".into(), 9);

        let queued = rx.try_recv().expect("draft forwarded");
        let outcome = detector.observe(&mut session, &mut debouncer, queued);

        assert_eq!(outcome, LocalChange::Superseded);
        assert_eq!(session.version(), 9);
        assert_eq!(session.last_content(), "<p>remote</p>");
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn edit_raised_after_a_remote_apply_is_recorded() {
        let (mut session, mut debouncer, detector) = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = detector.gate(tx);

        drop(session.phase().begin_remote_apply().expect("idle"));
        session.record_remote_apply("<p>remote</p>".into(), 9);
        callback("<p>remote</p><p>mine</p>");

        let queued = rx.try_recv().expect("edit forwarded");
        assert_eq!(queued.generation, 1);
        let outcome = detector.observe(&mut session, &mut debouncer, queued);

        assert_eq!(outcome, LocalChange::Recorded { version: 10, superseded: false });
    }

    #[test]
    fn gate_drops_notifications_while_applying_remote() {
        let (session, _debouncer, detector) = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = detector.gate(tx);

        {
            let _guard = session.phase().begin_remote_apply().expect("idle");
            callback("from remote");
        }
        callback("typed locally");

        let forwarded = rx.try_recv().expect("local edit forwarded");
        assert_eq!(forwarded.content, "typed locally");
        assert!(rx.try_recv().is_err());
    }
}
