// Engine runtime: one tokio task per session that owns all sync state.
//
// The task multiplexes shutdown, connection events, local edits and the
// debounce deadline with a biased `select!`. `SyncPlugin` is the start/stop
// surface exposed to the host.

use std::sync::Arc;

use coedit_common::protocol::{decode, SyncMessage};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig, EngineOptions};
use crate::connection::{ConnectionEvent, ConnectionManager, Connector, StatusLabel};
use crate::debounce::OutboundDebouncer;
use crate::detector::{ChangeDetector, LocalChange, LocalEdit};
use crate::error::SyncError;
use crate::host::{HostEditor, Subscription};
use crate::resolver::{self, RemoteRevision};
use crate::session::{Session, SessionIdentity};

// ── Engine handle ──────────────────────────────────────────────────

/// Handle to a running engine task. Dropping it stops the engine.
pub struct EngineHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
    status_rx: watch::Receiver<StatusLabel>,
}

impl EngineHandle {
    /// Signal the engine to stop without waiting for it.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Stop the engine and wait for teardown to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn status(&self) -> StatusLabel {
        *self.status_rx.borrow()
    }

    /// Watch the status label shown by the host UI.
    pub fn subscribe_status(&self) -> watch::Receiver<StatusLabel> {
        self.status_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start syncing `editor` with the server at `options.endpoint`.
///
/// Must be called from within a tokio runtime.
pub fn spawn<C, E>(
    identity: SessionIdentity,
    editor: Arc<E>,
    connector: C,
    options: &EngineOptions,
) -> EngineHandle
where
    C: Connector,
    E: HostEditor,
{
    let (status_tx, status_rx) = watch::channel(StatusLabel::Disconnected);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let engine = SyncEngine::new(identity, editor, connector, options, status_tx);
    let task = tokio::spawn(engine.run(shutdown_rx));
    EngineHandle { shutdown_tx, task: Some(task), status_rx }
}

// ── Event loop ─────────────────────────────────────────────────────

struct SyncEngine<C: Connector, E: HostEditor> {
    session: Session,
    editor: Arc<E>,
    connection: ConnectionManager<C>,
    detector: ChangeDetector,
    debouncer: OutboundDebouncer,
    local_rx: mpsc::UnboundedReceiver<LocalEdit>,
    subscription: Option<Subscription>,
}

impl<C: Connector, E: HostEditor> SyncEngine<C, E> {
    fn new(
        identity: SessionIdentity,
        editor: Arc<E>,
        connector: C,
        options: &EngineOptions,
        status_tx: watch::Sender<StatusLabel>,
    ) -> Self {
        let session = Session::new(identity, editor.get_content());
        let detector = ChangeDetector::new(session.phase().clone());
        let (local_tx, local_rx) = mpsc::unbounded_channel();
        let subscription = editor.subscribe_to_content_change(detector.gate(local_tx));
        let connection = ConnectionManager::new(options.endpoint.clone(), connector, status_tx)
            .with_reconnect_policy(options.reconnect.clone());

        Self {
            session,
            editor,
            connection,
            detector,
            debouncer: OutboundDebouncer::new(options.debounce.clone()),
            local_rx,
            subscription: Some(subscription),
        }
    }

    async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            doc_id = %self.session.doc_id(),
            user_id = %self.session.user_id(),
            "sync engine started"
        );
        self.connection.connect();
        self.sync_connection_state();

        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                event = self.connection.next_event() => self.on_connection_event(event),
                Some(edit) = self.local_rx.recv() => self.on_local_change(edit),
                () = sleep_until(deadline) => self.flush_pending(),
            }
        }

        self.teardown();
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.announce(),
            ConnectionEvent::Inbound(text) => self.on_inbound(&text),
            ConnectionEvent::Closed { reason } => {
                debug!(doc_id = %self.session.doc_id(), ?reason, "waiting to reconnect");
            }
            ConnectionEvent::Failed(error) => {
                debug!(doc_id = %self.session.doc_id(), %error, "waiting to reconnect");
            }
            ConnectionEvent::Reconnecting { attempt } => {
                debug!(doc_id = %self.session.doc_id(), attempt, "reconnecting");
            }
        }
        self.sync_connection_state();
    }

    /// Send a `Join` carrying the editor's current content.
    fn announce(&mut self) {
        let message = SyncMessage::join(
            self.session.doc_id().clone(),
            self.session.user_id().clone(),
            self.editor.get_content(),
        );
        if self.connection.send(&message) {
            debug!(doc_id = %self.session.doc_id(), "join sent");
        }
    }

    fn on_inbound(&mut self, text: &str) {
        let applied = self.accept(text).and_then(|revision| {
            let version = revision.version;
            if self.debouncer.cancel().is_some() {
                debug!(version, "remote revision supersedes pending local change");
            }
            resolver::apply(&mut self.session, self.editor.as_ref(), revision)?;
            Ok(version)
        });

        match applied {
            Ok(version) => {
                debug!(doc_id = %self.session.doc_id(), version, "applied remote revision");
            }
            Err(SyncError::Rejected(reason)) => {
                debug!(doc_id = %self.session.doc_id(), %reason, "inbound frame dropped");
            }
            Err(error) => {
                warn!(doc_id = %self.session.doc_id(), %error, "inbound frame dropped");
            }
        }
    }

    fn accept(&self, text: &str) -> Result<RemoteRevision, SyncError> {
        let message = decode(text)?;
        Ok(resolver::evaluate(&self.session, message)?)
    }

    fn on_local_change(&mut self, edit: LocalEdit) {
        match self.detector.observe(&mut self.session, &mut self.debouncer, edit) {
            LocalChange::Superseded => debug!("local edit overtaken by remote apply, dropped"),
            LocalChange::Unchanged => debug!("formatting-only change ignored"),
            LocalChange::Recorded { version, superseded } => {
                debug!(doc_id = %self.session.doc_id(), version, superseded, "local edit recorded");
            }
        }
    }

    fn flush_pending(&mut self) {
        let Some(change) = self.debouncer.take_ready() else {
            return;
        };
        let version = self.session.version();
        let message = SyncMessage::update(
            self.session.doc_id().clone(),
            self.session.user_id().clone(),
            change.content,
            version,
        );
        if self.connection.send(&message) {
            debug!(doc_id = %self.session.doc_id(), version, "update sent");
        }
    }

    fn sync_connection_state(&mut self) {
        self.session.set_connection_state(self.connection.state());
    }

    fn teardown(&mut self) {
        self.debouncer.cancel();
        self.connection.close();
        self.sync_connection_state();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        info!(
            doc_id = %self.session.doc_id(),
            version = self.session.version(),
            "sync engine stopped"
        );
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ── Plugin surface ─────────────────────────────────────────────────

/// Start/stop surface for a host editor.
///
/// Each `start` builds a fresh session; `stop` destroys it.
pub struct SyncPlugin<C: Connector + Clone, E: HostEditor> {
    identity: SessionIdentity,
    editor: Arc<E>,
    connector: C,
    options: EngineOptions,
    engine: Option<EngineHandle>,
}

impl<C: Connector + Clone, E: HostEditor> SyncPlugin<C, E> {
    pub fn new(
        identity: SessionIdentity,
        editor: Arc<E>,
        connector: C,
        options: EngineOptions,
    ) -> Self {
        Self { identity, editor, connector, options, engine: None }
    }

    /// Build a plugin from config and the editor page URL, starting it when
    /// `auto_start` is set.
    pub fn initialize(
        config: &EngineConfig,
        page_url: &str,
        editor: Arc<E>,
        connector: C,
    ) -> Result<Self, ConfigError> {
        let identity = SessionIdentity::from_page_url(page_url)?;
        let options = config.engine_options()?;
        let mut plugin = Self::new(identity, editor, connector, options);
        if config.auto_start {
            plugin.start();
        }
        Ok(plugin)
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Start syncing. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.engine = Some(spawn(
            self.identity.clone(),
            Arc::clone(&self.editor),
            self.connector.clone(),
            &self.options,
        ));
        true
    }

    /// Stop syncing and wait for teardown. No-op when not running.
    pub async fn stop(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.stop().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| !engine.is_finished())
    }

    pub fn status(&self) -> StatusLabel {
        self.engine.as_ref().map_or(StatusLabel::Disconnected, EngineHandle::status)
    }

    /// Watch the status label of the running engine.
    pub fn subscribe_status(&self) -> Option<watch::Receiver<StatusLabel>> {
        self.engine.as_ref().map(EngineHandle::subscribe_status)
    }
}
