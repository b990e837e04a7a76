//! Log-based snapshot sink adapter.
//!
//! Implements [`SnapshotSink`] by writing every snapshot to the `log`
//! facade at `trace` level.  It reports a subscriber only while that level
//! is enabled, so the broadcast loop skips it otherwise.

use log::{Level, log_enabled, trace};

use crate::app::events::Snapshot;
use crate::app::ports::SnapshotSink;

/// Adapter that traces every [`Snapshot`] to the console.
#[derive(Debug, Default)]
pub struct LogSnapshotSink;

impl LogSnapshotSink {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotSink for LogSnapshotSink {
    fn publish(&self, snapshot: &Snapshot) {
        let r = &snapshot.relays;
        let s = &snapshot.state;
        trace!(
            "SNAP | W={:.1}kg ({}) | T={:.1}\u{00b0}C ({}) | pump={} valve={} damper={} | \
             filling={} source={} mode={:?}",
            snapshot.weight.value,
            snapshot.weight.mode,
            snapshot.temperature.value,
            snapshot.temperature.mode,
            on_off(r.pump),
            on_off(r.valve),
            on_off(r.damper),
            s.filling,
            s.fill_source.map_or("-", |src| src.name()),
            s.fill_phase,
        );
    }

    fn subscriber_count(&self) -> usize {
        usize::from(log_enabled!(Level::Trace))
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "off" }
}
