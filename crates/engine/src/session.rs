// Session: the (document, participant) pair plus its version/content cursor.
//
// The session is owned by the engine's event loop. The only piece shared
// outside it is the apply phase, which the editor subscription callback
// reads to suppress echoes of remote applies.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use coedit_common::types::{DocId, UserId, Version};

use crate::connection::ConnectionState;

/// Identity a session is created from (usually parsed from the page URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub doc_id: DocId,
    pub user_id: UserId,
}

// ── Apply phase ─────────────────────────────────────────────────────

/// Whether the engine is currently writing remote content into the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyPhase {
    Idle,
    ApplyingRemote,
}

const PHASE_IDLE: u8 = 0;
const PHASE_APPLYING_REMOTE: u8 = 1;

#[derive(Debug, Default)]
struct PhaseState {
    phase: AtomicU8,
    /// Bumped on every remote apply. Local notifications stamped with an
    /// older generation were raised against content that has since been
    /// replaced.
    generation: AtomicU64,
}

/// Shared handle to a session's apply phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseCell(Arc<PhaseState>);

impl PhaseCell {
    pub fn get(&self) -> ApplyPhase {
        match self.0.phase.load(Ordering::Acquire) {
            PHASE_APPLYING_REMOTE => ApplyPhase::ApplyingRemote,
            _ => ApplyPhase::Idle,
        }
    }

    pub fn is_applying_remote(&self) -> bool {
        self.get() == ApplyPhase::ApplyingRemote
    }

    /// Number of remote applies started so far.
    pub fn generation(&self) -> u64 {
        self.0.generation.load(Ordering::Acquire)
    }

    /// Enter `ApplyingRemote` and start a new generation. Returns `None` if
    /// an apply is already running.
    ///
    /// The phase returns to `Idle` when the guard is dropped.
    pub fn begin_remote_apply(&self) -> Option<RemoteApplyGuard> {
        self.0
            .phase
            .compare_exchange(
                PHASE_IDLE,
                PHASE_APPLYING_REMOTE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;
        self.0.generation.fetch_add(1, Ordering::AcqRel);
        Some(RemoteApplyGuard { cell: self.clone() })
    }
}

/// Scoped `ApplyingRemote` phase.
#[derive(Debug)]
pub struct RemoteApplyGuard {
    cell: PhaseCell,
}

impl Drop for RemoteApplyGuard {
    fn drop(&mut self) {
        self.cell.0.phase.store(PHASE_IDLE, Ordering::Release);
    }
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Session {
    doc_id: DocId,
    user_id: UserId,
    version: Version,
    last_content: String,
    connection_state: ConnectionState,
    phase: PhaseCell,
}

impl Session {
    pub fn new(identity: SessionIdentity, initial_content: impl Into<String>) -> Self {
        Self {
            doc_id: identity.doc_id,
            user_id: identity.user_id,
            version: 0,
            last_content: initial_content.into(),
            connection_state: ConnectionState::Disconnected,
            phase: PhaseCell::default(),
        }
    }

    pub fn doc_id(&self) -> &DocId {
        &self.doc_id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn last_content(&self) -> &str {
        &self.last_content
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
    }

    pub fn phase(&self) -> &PhaseCell {
        &self.phase
    }

    /// Record a genuine local edit and return the new version.
    pub fn record_local_edit(&mut self, content: String) -> Version {
        self.version += 1;
        self.last_content = content;
        self.version
    }

    /// Adopt a remote revision. Versions never move backwards.
    pub fn record_remote_apply(&mut self, content: String, version: Version) {
        debug_assert!(version >= self.version, "remote apply must not regress the version");
        self.version = self.version.max(version);
        self.last_content = content;
    }
}
