use log::{debug, info};
use std::collections::{HashMap, VecDeque};

/// Tunables for the temporal stability filter.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityConfig {
    /// Verdicts below this confidence never enter the window.
    pub min_confidence: f32,
    /// Age bound for window entries, in milliseconds.
    pub window_ms: u64,
    /// Minimum entries in the window before an emission is considered.
    pub min_samples: usize,
    /// Required share of the window for the leading gesture.
    pub stability_threshold: f32,
    /// Minimum spacing between emissions. Keeps a held gesture from
    /// re-emitting every window tick; can be lowered to ~1000 ms for
    /// faster repetition.
    pub cooldown_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            window_ms: 1000,
            min_samples: 15,
            stability_threshold: 0.8,
            cooldown_ms: 4000,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    at_ms: u64,
}

/// Majority-vote low-pass filter over a sliding time window.
///
/// Collects recent recognitions and emits a gesture only once it
/// dominates the window, with a cooldown for hysteresis. Sentinel
/// verdicts never reach the buffer; callers feed only named
/// recognitions.
#[derive(Debug, Default)]
pub struct StabilityBuffer {
    config: StabilityConfig,
    entries: VecDeque<Entry>,
    last_emission_ms: Option<u64>,
}

impl StabilityBuffer {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            entries: VecDeque::new(),
            last_emission_ms: None,
        }
    }

    /// Feeds one recognition into the window; returns a gesture name when
    /// the emission rule fires.
    ///
    /// The rule: after pruning entries older than the window, the buffer
    /// must hold at least `min_samples` entries, the most frequent name
    /// must hold at least `stability_threshold` of them, and the cooldown
    /// since the previous emission must have elapsed. On emission the
    /// window is cleared. Ties break to the name seen earliest in the
    /// window.
    pub fn observe(&mut self, name: &str, confidence: f32, now_ms: u64) -> Option<String> {
        if confidence <= self.config.min_confidence {
            return None;
        }

        self.entries.push_back(Entry {
            name: name.to_string(),
            at_ms: now_ms,
        });
        while let Some(front) = self.entries.front() {
            if now_ms.saturating_sub(front.at_ms) >= self.config.window_ms {
                self.entries.pop_front();
            } else {
                break;
            }
        }

        if self.entries.len() < self.config.min_samples {
            return None;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in &self.entries {
            *counts.entry(entry.name.as_str()).or_insert(0) += 1;
        }
        let top = *counts.values().max().expect("buffer is non-empty");
        if (top as f32) < self.entries.len() as f32 * self.config.stability_threshold {
            debug!(
                "window unstable: leader holds {}/{} entries",
                top,
                self.entries.len()
            );
            return None;
        }

        if let Some(last) = self.last_emission_ms {
            if now_ms.saturating_sub(last) <= self.config.cooldown_ms {
                return None;
            }
        }

        let leader = self
            .entries
            .iter()
            .find(|e| counts[e.name.as_str()] == top)
            .map(|e| e.name.clone())
            .expect("buffer is non-empty");

        info!("emitting gesture {:?} ({}/{} window share)", leader, top, self.entries.len());
        self.last_emission_ms = Some(now_ms);
        self.entries.clear();
        Some(leader)
    }

    /// Empties the window, e.g. when detection stops. The emission
    /// cooldown is deliberately preserved.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> StabilityBuffer {
        StabilityBuffer::new(StabilityConfig::default())
    }

    /// Feeds `count` verdicts named `name` at a 33 ms cadence starting at
    /// `start_ms`; returns any emissions with their timestamps.
    fn feed(
        buf: &mut StabilityBuffer,
        name: &str,
        count: usize,
        start_ms: u64,
    ) -> Vec<(u64, String)> {
        let mut emitted = Vec::new();
        for i in 0..count {
            let now = start_ms + 33 * i as u64;
            if let Some(g) = buf.observe(name, 0.9, now) {
                emitted.push((now, g));
            }
        }
        emitted
    }

    #[test]
    fn test_consistent_window_emits_exactly_once() {
        let mut buf = buffer();
        let emitted = feed(&mut buf, "hello", 15, 0);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].1, "hello");
        // The window is cleared by the emission.
        assert!(buf.is_empty());
    }

    #[test]
    fn test_mixed_window_does_not_emit() {
        let mut buf = buffer();
        // 8 "hello" and 7 "world" interleaved inside one window: the
        // leader holds 53%, well short of the 80% threshold.
        let mut emissions = 0;
        for i in 0..15 {
            let name = if i % 2 == 0 { "hello" } else { "world" };
            if buf.observe(name, 0.9, 33 * i as u64).is_some() {
                emissions += 1;
            }
        }
        assert_eq!(emissions, 0);
        assert_eq!(buf.len(), 15);
    }

    #[test]
    fn test_low_confidence_is_gated_out() {
        let mut buf = buffer();
        for i in 0..20 {
            assert_eq!(buf.observe("hello", 0.4, 33 * i as u64), None);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_old_entries_are_pruned() {
        let mut buf = buffer();
        for i in 0..10 {
            buf.observe("hello", 0.9, 33 * i);
        }
        // A much later observation expires everything before it.
        buf.observe("hello", 0.9, 10_000);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_cooldown_blocks_and_then_admits() {
        let mut buf = buffer();
        let first = feed(&mut buf, "hello", 15, 0);
        assert_eq!(first.len(), 1);
        let first_at = first[0].0;

        // A second stable window inside the cooldown must not fire.
        let blocked = feed(&mut buf, "hello", 15, first_at + 100);
        assert!(blocked.is_empty());

        // Past the cooldown the same gesture may emit again.
        buf.reset();
        let after = feed(&mut buf, "hello", 15, first_at + 4001);
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn test_short_cooldown_allows_fast_repetition() {
        let mut buf = StabilityBuffer::new(StabilityConfig {
            cooldown_ms: 1000,
            ..StabilityConfig::default()
        });
        let first = feed(&mut buf, "yes", 15, 0);
        assert_eq!(first.len(), 1);
        let second = feed(&mut buf, "yes", 15, first[0].0 + 1001);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_tie_breaks_to_first_seen() {
        let mut buf = StabilityBuffer::new(StabilityConfig {
            min_samples: 2,
            stability_threshold: 0.5,
            ..StabilityConfig::default()
        });
        assert_eq!(buf.observe("alpha", 0.9, 0), None);
        let emitted = buf.observe("beta", 0.9, 10);
        // 1-1 tie at 50% share each: the earliest-seen name wins.
        assert_eq!(emitted.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_reset_clears_window_but_keeps_cooldown() {
        let mut buf = buffer();
        let first = feed(&mut buf, "hello", 15, 0);
        assert_eq!(first.len(), 1);
        buf.reset();
        // Still inside the cooldown: a fresh stable window must not fire.
        let blocked = feed(&mut buf, "hello", 15, first[0].0 + 500);
        assert!(blocked.is_empty());
    }
}
