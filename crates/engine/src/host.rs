// Host editor collaborator: the editing surface the engine keeps in sync.
//
// The engine only ever reads the full document, replaces it, and listens
// for committed edits. `MemoryEditor` is a headless surface used by the
// `coedit` binary and by tests.

use std::sync::{Arc, Mutex};

/// Callback invoked with the full document after every committed edit.
pub type ContentChangeCallback = Box<dyn Fn(&str) + Send + Sync>;

/// The editing surface, as seen by the sync engine.
pub trait HostEditor: Send + Sync + 'static {
    fn get_content(&self) -> String;

    /// Replace the whole document. Listeners are notified as for any edit.
    fn set_content(&self, html: &str);

    fn subscribe_to_content_change(&self, callback: ContentChangeCallback) -> Subscription;
}

/// Detaches a content-change callback when dropped or unsubscribed.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self { unsubscribe: Some(Box::new(unsubscribe)) }
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("active", &self.unsubscribe.is_some()).finish()
    }
}

// ── In-memory editor ────────────────────────────────────────────────

type Listener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct EditorState {
    content: String,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
}

/// Headless editor holding the document as a string.
///
/// Clones share the same document. Listeners are called synchronously from
/// `set_content`, after the document lock has been released.
#[derive(Clone, Default)]
pub struct MemoryEditor {
    state: Arc<Mutex<EditorState>>,
}

impl MemoryEditor {
    pub fn new(content: impl Into<String>) -> Self {
        let state = EditorState { content: content.into(), ..EditorState::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Number of attached content-change listeners.
    pub fn listener_count(&self) -> usize {
        self.state.lock().expect("editor state lock poisoned").listeners.len()
    }
}

impl HostEditor for MemoryEditor {
    fn get_content(&self) -> String {
        self.state.lock().expect("editor state lock poisoned").content.clone()
    }

    fn set_content(&self, html: &str) {
        let listeners: Vec<Listener> = {
            let mut state = self.state.lock().expect("editor state lock poisoned");
            state.content = html.to_string();
            state.listeners.iter().map(|(_, listener)| Arc::clone(listener)).collect()
        };
        for listener in listeners {
            listener(html);
        }
    }

    fn subscribe_to_content_change(&self, callback: ContentChangeCallback) -> Subscription {
        let id = {
            let mut state = self.state.lock().expect("editor state lock poisoned");
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            state.listeners.push((id, Arc::from(callback)));
            id
        };

        let state = Arc::clone(&self.state);
        Subscription::new(move || {
            state
                .lock()
                .expect("editor state lock poisoned")
                .listeners
                .retain(|(listener_id, _)| *listener_id != id);
        })
    }
}

impl std::fmt::Debug for MemoryEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEditor")
            .field("content", &self.get_content())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
