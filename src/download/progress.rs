//! Progress bar rendering and per-message edit throttling.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use strum::Display;

use crate::core::config::progress::BAR_SEGMENTS;

/// Leading verb of a progress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransferVerb {
    Downloading,
    Uploading,
}

/// Percentage of `current` over `total`, clamped to 0..=100. Zero when total is unknown.
pub fn percent(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (current as f64 * 100.0 / total as f64).clamp(0.0, 100.0)
}

/// `🔵` per full ten percent, `⚪` for the rest.
pub fn render_bar(percent: f64) -> String {
    let filled = ((percent / 10.0).floor() as usize).min(BAR_SEGMENTS);
    let mut bar = "🔵".repeat(filled);
    bar.push_str(&"⚪".repeat(BAR_SEGMENTS - filled));
    bar
}

/// Status text such as `Downloading... 🔵🔵⚪⚪⚪⚪⚪⚪⚪⚪ 23.50%`.
pub fn render_progress(verb: TransferVerb, current: u64, total: u64) -> String {
    let pct = percent(current, total);
    format!("{}... {} {:.2}%", verb, render_bar(pct), pct)
}

/// Rate limiter for non-terminal progress edits, one slot per status message.
///
/// Stage transitions, errors and deletions must not go through here.
#[derive(Debug)]
pub struct ProgressThrottle<K: Eq + Hash> {
    window: Duration,
    last_update: DashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> ProgressThrottle<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_update: DashMap::new(),
        }
    }

    /// `true` if a frame for `key` may be sent at `now`; records `now` when it is.
    ///
    /// The first frame for a key always passes.
    pub fn should_emit(&self, key: &K, now: Instant) -> bool {
        match self.last_update.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                if now.saturating_duration_since(*slot.get()) >= self.window {
                    slot.insert(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Drop state for a message that reached a terminal state.
    pub fn forget(&self, key: &K) {
        self.last_update.remove(key);
    }

    /// Remove keys idle for longer than `ttl`. Returns how many were removed.
    pub fn sweep(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.last_update.len();
        self.last_update
            .retain(|_, last| now.saturating_duration_since(*last) <= ttl);
        before.saturating_sub(self.last_update.len())
    }

    pub fn tracked(&self) -> usize {
        self.last_update.len()
    }
}
