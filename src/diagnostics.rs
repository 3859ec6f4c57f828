//! Rejected-operation counters.
//!
//! The core never panics and never propagates bad input; every clamp and
//! every refused operation increments a counter here instead. Tests assert
//! on them, hosts can poll them. All fields are plain counts so the struct
//! stays deterministic and snapshot-friendly (it is intentionally NOT part
//! of the snapshot: diagnostics are per-process observability, not game
//! state).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagCounters {
    /// Inputs with NaN/∞/out-of-range components clamped at the boundary.
    pub clamped_inputs: u32,
    /// Combat/ability requests refused because of an illegal state.
    pub rejected_actions: u32,
    /// Create calls refused because a bounded arena was full.
    pub capacity_denied: u32,
    /// `load_state` calls rejected before any state was touched.
    pub snapshot_failures: u32,
    /// Peer messages rejected (version mismatch, malformed).
    pub wire_rejected: u32,
    /// Phase divergences detected by the reconciler.
    pub desync_events: u32,
    /// Events dropped because the frame queue overflowed.
    pub events_dropped: u32,
}

impl DiagCounters {
    pub fn total_rejections(&self) -> u32 {
        self.clamped_inputs
            + self.rejected_actions
            + self.capacity_denied
            + self.snapshot_failures
            + self.wire_rejected
    }

    pub fn reset(&mut self) {
        *self = DiagCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_rejections() {
        let mut d = DiagCounters::default();
        d.clamped_inputs = 2;
        d.rejected_actions = 3;
        d.capacity_denied = 1;
        assert_eq!(d.total_rejections(), 6);
        d.reset();
        assert_eq!(d, DiagCounters::default());
    }
}
