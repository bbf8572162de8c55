// Outbound debouncer: trailing-edge coalescing of local edits.
//
// Holds at most one pending change. Every registration replaces the pending
// content and restarts the quiet window (default 300ms, range 50–5000ms).

use std::time::Duration;

use tokio::time::Instant;

/// Default quiet window.
const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Minimum allowed quiet window.
const MIN_DEBOUNCE_MS: u64 = 50;
/// Maximum allowed quiet window.
const MAX_DEBOUNCE_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceConfig {
    pub window: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { window: Duration::from_millis(DEFAULT_DEBOUNCE_MS) }
    }
}

impl DebounceConfig {
    /// Create a config with the given window in milliseconds, clamped to [50, 5000].
    pub fn with_millis(ms: u64) -> Self {
        let clamped = ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS);
        Self { window: Duration::from_millis(clamped) }
    }
}

/// Content captured when a local edit was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub content: String,
    last_seen: Instant,
}

pub struct OutboundDebouncer {
    config: DebounceConfig,
    pending: Option<PendingChange>,
}

impl OutboundDebouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self { config, pending: None }
    }

    /// Register a change. Returns true if it superseded an earlier pending one.
    pub fn register(&mut self, content: String) -> bool {
        self.register_at(content, Instant::now())
    }

    fn register_at(&mut self, content: String, now: Instant) -> bool {
        self.pending.replace(PendingChange { content, last_seen: now }).is_some()
    }

    /// Take the pending change if its quiet window has elapsed.
    pub fn take_ready(&mut self) -> Option<PendingChange> {
        self.take_ready_at(Instant::now())
    }

    fn take_ready_at(&mut self, now: Instant) -> Option<PendingChange> {
        let window = self.config.window;
        if self.pending.as_ref().is_some_and(|p| now.duration_since(p.last_seen) >= window) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Discard the pending change without emitting it.
    pub fn cancel(&mut self) -> Option<PendingChange> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending change becomes ready, or None if nothing is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.last_seen + self.config.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── DebounceConfig ─────────────────────────────────────────────

    #[test]
    fn default_config_is_300ms() {
        assert_eq!(DebounceConfig::default().window, Duration::from_millis(300));
    }

    #[test]
    fn config_clamps_out_of_range_windows() {
        assert_eq!(DebounceConfig::with_millis(1).window, Duration::from_millis(50));
        assert_eq!(DebounceConfig::with_millis(60_000).window, Duration::from_millis(5_000));
        assert_eq!(DebounceConfig::with_millis(750).window, Duration::from_millis(750));
    }

    // ── Pending lifecycle ──────────────────────────────────────────

    #[test]
    fn change_not_ready_before_window() {
        let mut debouncer = OutboundDebouncer::new(DebounceConfig::default());
        let now = Instant::now();

        debouncer.register_at("a".into(), now);

        assert!(debouncer.take_ready_at(now + Duration::from_millis(299)).is_none());
        assert!(debouncer.is_pending());
    }

    #[test]
    fn change_ready_at_window() {
        let mut debouncer = OutboundDebouncer::new(DebounceConfig::default());
        let now = Instant::now();

        debouncer.register_at("a".into(), now);

        let ready = debouncer.take_ready_at(now + Duration::from_millis(300)).expect("ready");
        assert_eq!(ready.content, "a");
        assert!(!debouncer.is_pending());
    }

    // ── Coalescing ─────────────────────────────────────────────────

    #[test]
    fn burst_coalesces_to_last_content() {
        let mut debouncer = OutboundDebouncer::new(DebounceConfig::default());
        let now = Instant::now();

        assert!(!debouncer.register_at("a".into(), now));
        assert!(debouncer.register_at("ab".into(), now + Duration::from_millis(100)));
        assert!(debouncer.register_at("abc".into(), now + Duration::from_millis(200)));

        // 300ms after the first edit but only 100ms after the last.
        assert!(debouncer.take_ready_at(now + Duration::from_millis(300)).is_none());

        let ready = debouncer.take_ready_at(now + Duration::from_millis(500)).expect("ready");
        assert_eq!(ready.content, "abc");
        assert!(debouncer.take_ready_at(now + Duration::from_millis(900)).is_none());
    }

    #[test]
    fn deadline_tracks_latest_registration() {
        let mut debouncer = OutboundDebouncer::new(DebounceConfig::default());
        assert!(debouncer.deadline().is_none());

        let now = Instant::now();
        debouncer.register_at("a".into(), now);
        assert_eq!(debouncer.deadline(), Some(now + Duration::from_millis(300)));

        debouncer.register_at("b".into(), now + Duration::from_millis(120));
        assert_eq!(debouncer.deadline(), Some(now + Duration::from_millis(420)));
    }

    #[test]
    fn cancel_discards_pending_change() {
        let mut debouncer = OutboundDebouncer::new(DebounceConfig::default());
        let now = Instant::now();
        debouncer.register_at("a".into(), now);

        let cancelled = debouncer.cancel().expect("pending change");
        assert_eq!(cancelled.content, "a");
        assert!(debouncer.deadline().is_none());
        assert!(debouncer.take_ready_at(now + Duration::from_secs(1)).is_none());
        assert!(debouncer.cancel().is_none());
    }

    #[test]
    fn custom_window_respected() {
        let mut debouncer = OutboundDebouncer::new(DebounceConfig::with_millis(1_000));
        let now = Instant::now();
        debouncer.register_at("a".into(), now);

        assert!(debouncer.take_ready_at(now + Duration::from_millis(999)).is_none());
        assert!(debouncer.take_ready_at(now + Duration::from_millis(1_000)).is_some());
    }
}
