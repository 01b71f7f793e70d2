//! Track loading, duration reconciliation, and folder sweeps.
//!
//! The loader drives one track's artifact lifecycle: staleness check, cached
//! fetch or regeneration, save, and a post-save visibility re-check. Once
//! the playback engine reports its own duration, reconciliation compares it
//! against the artifact and silently repairs artifacts that disagree beyond
//! tolerance. Every state mutation is guarded by a cancellation ticket so a
//! track switch can never apply a stale result.

mod durations;
mod loader;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use durations::{DurationSweep, SweepOutcome, TrackDataStatus};
pub use loader::{
    LoadError, LoadOutcome, LoadState, ReconcileOutcome, SourceResolver, TrackKeys, TrackLoader,
};

/// Engine-vs-artifact duration difference tolerated before an artifact is
/// presumed corrupt.
pub const DURATION_TOLERANCE_SECONDS: f64 = 2.0;

/// Bounded re-check loop run after saving an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Maximum number of visibility checks.
    pub max_attempts: usize,
    /// Backoff unit; attempt `n` sleeps `n × backoff_step`.
    pub backoff_step: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            backoff_step: Duration::from_millis(750),
        }
    }
}

/// Shared cancellation generation for one loading context.
///
/// Bumping the flag invalidates every ticket handed out before the bump.
/// Tickets are snapshots; holders check them before applying results.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    generation: Arc<AtomicU64>,
}

impl CancelFlag {
    /// Create a fresh flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all outstanding tickets.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Invalidate outstanding tickets and hand out a fresh one.
    pub fn next_ticket(&self) -> LoadTicket {
        self.invalidate();
        self.ticket()
    }

    /// A ticket for the current generation.
    pub fn ticket(&self) -> LoadTicket {
        LoadTicket {
            generation: self.generation.clone(),
            snapshot: self.generation.load(Ordering::SeqCst),
        }
    }
}

/// Snapshot of a loading context's generation.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: Arc<AtomicU64>,
    snapshot: u64,
}

impl LoadTicket {
    /// True once the context moved on; stale results must be discarded.
    pub fn is_stale(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_go_stale_when_the_flag_advances() {
        let flag = CancelFlag::new();
        let first = flag.ticket();
        assert!(!first.is_stale());

        let second = flag.next_ticket();
        assert!(first.is_stale());
        assert!(!second.is_stale());

        flag.invalidate();
        assert!(second.is_stale());
    }

    #[test]
    fn default_verify_config_matches_the_protocol() {
        let config = VerifyConfig::default();
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.backoff_step, Duration::from_millis(750));
    }
}
