//! Snapshot fan-out and the periodic broadcast loop.
//!
//! ```text
//!  broadcast thread (100 ms)            client threads
//!  ┌──────────────────────┐   publish   ┌──────────────┐
//!  │ Coordinator::snapshot│───────────▶│ Subscription │ ──▶ socket
//!  │  ──▶ every sink      │  (hub)      │ Subscription │ ──▶ socket
//!  └──────────────────────┘             └──────────────┘
//! ```
//!
//! The hub is an `embassy-sync` [`PubSubChannel`].  Publishing is
//! immediate: when a subscriber's queue is full the oldest snapshot is
//! overwritten and that subscriber later sees a lag count instead of
//! blocking the loop.

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{PubSubChannel, Subscriber, WaitResult};
use futures_lite::future;
use log::{debug, info, trace};

use crate::app::events::Snapshot;
use crate::app::ports::SnapshotSink;
use crate::app::service::Coordinator;

/// Snapshots buffered per subscriber before the oldest is dropped.
pub const HUB_DEPTH: usize = 4;

/// Maximum concurrent subscribers (and so transport clients).
pub const MAX_SUBSCRIBERS: usize = 8;

type SnapshotChannel =
    PubSubChannel<CriticalSectionRawMutex, Snapshot, HUB_DEPTH, MAX_SUBSCRIBERS, 1>;
type SnapshotSubscriber =
    Subscriber<'static, CriticalSectionRawMutex, Snapshot, HUB_DEPTH, MAX_SUBSCRIBERS, 1>;

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Fan-out point for snapshots.  Cheap to clone; clones share the channel.
#[derive(Clone)]
pub struct SnapshotHub {
    channel: &'static SnapshotChannel,
    subscribers: Arc<AtomicUsize>,
}

impl SnapshotHub {
    /// Create a hub.  The channel lives for the rest of the process.
    ///
    /// Each call leaks one channel, since subscribers borrow it for
    /// `'static`.  The binary creates exactly one hub at startup; call
    /// this once per process outside of tests.
    pub fn new() -> Self {
        Self {
            channel: Box::leak(Box::new(SnapshotChannel::new())),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Attach a subscriber.  `None` once [`MAX_SUBSCRIBERS`] are attached.
    pub fn subscribe(&self) -> Option<Subscription> {
        let inner = self.channel.subscriber().ok()?;
        let now = self.subscribers.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Hub: subscriber attached ({now} active)");
        Some(Subscription {
            inner,
            subscribers: Arc::clone(&self.subscribers),
            lagged: 0,
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Acquire)
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSink for SnapshotHub {
    fn publish(&self, snapshot: &Snapshot) {
        self.channel.immediate_publisher().publish_immediate(snapshot.clone());
    }

    fn subscriber_count(&self) -> usize {
        SnapshotHub::subscriber_count(self)
    }
}

/// One receiver of the snapshot stream.  Dropping it detaches.
pub struct Subscription {
    inner: SnapshotSubscriber,
    subscribers: Arc<AtomicUsize>,
    lagged: u64,
}

impl Subscription {
    /// Wait for the next snapshot, skipping over any lost to lag.
    pub async fn next(&mut self) -> Snapshot {
        loop {
            match self.inner.next_message().await {
                WaitResult::Message(snapshot) => return snapshot,
                WaitResult::Lagged(missed) => {
                    self.lagged += missed;
                    debug!("Hub: subscriber lagged, {missed} snapshots dropped");
                }
            }
        }
    }

    /// Blocking receive with a timeout.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Snapshot> {
        future::block_on(future::or(async { Some(self.next().await) }, async {
            Timer::after(timeout).await;
            None
        }))
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        loop {
            match self.inner.try_next_message()? {
                WaitResult::Message(snapshot) => return Some(snapshot),
                WaitResult::Lagged(missed) => self.lagged += missed,
            }
        }
    }

    /// Total snapshots this subscriber has lost to lag.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let left = self.subscribers.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        debug!("Hub: subscriber detached ({left} active)");
    }
}

// ---------------------------------------------------------------------------
// Broadcast loop
// ---------------------------------------------------------------------------

/// Take one snapshot and hand it to every sink that has subscribers.
/// Returns the number of sinks published to.  Sensors are sampled even
/// when nobody is listening.
pub fn broadcast_tick(coordinator: &Coordinator, sinks: &[Arc<dyn SnapshotSink>]) -> usize {
    let snapshot = coordinator.snapshot();
    let mut published = 0;
    for sink in sinks {
        if sink.subscriber_count() > 0 {
            sink.publish(&snapshot);
            published += 1;
        }
    }
    trace!(
        "Tick: {:.1} kg, {:.1} C, published to {published}",
        snapshot.weight.value, snapshot.temperature.value
    );
    published
}

/// Run ticks on a fixed period until `stop` is set.  Missed deadlines are
/// skipped rather than bunched up.
pub async fn run_broadcast(
    coordinator: &Coordinator,
    sinks: &[Arc<dyn SnapshotSink>],
    interval: Duration,
    stop: &AtomicBool,
) {
    let mut deadline = Instant::now();
    while !stop.load(Ordering::Acquire) {
        broadcast_tick(coordinator, sinks);
        deadline += interval;
        let now = Instant::now();
        if deadline < now {
            deadline = now;
        }
        Timer::at(deadline).await;
    }
}

/// Handle to the background broadcast thread.
pub struct BroadcastLoop {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BroadcastLoop {
    /// Start the broadcast thread.
    pub fn spawn(
        coordinator: Arc<Coordinator>,
        sinks: Vec<Arc<dyn SnapshotSink>>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("broadcast".into())
            .spawn(move || {
                info!("Broadcast loop running every {} ms", interval.as_millis());
                future::block_on(run_broadcast(&coordinator, &sinks, interval, &flag));
                info!("Broadcast loop stopped");
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop after the current tick and wait for the thread.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BroadcastLoop {
    fn drop(&mut self) {
        self.halt();
    }
}
