//! Snapshot consistency under concurrent commands, and hub delivery.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ibcfill::app::events::Snapshot;
use ibcfill::app::ports::SnapshotSink;
use ibcfill::app::state::{FillPhase, FillSource};
use ibcfill::broadcast::{BroadcastLoop, SnapshotHub, broadcast_tick};
use ibcfill::drivers::relay::RelayId;

use crate::mock_hw::{MockBoard, RecordingSink, board_coordinator, simulated_coordinator};

#[test]
fn snapshots_never_show_half_a_transition() {
    let board = MockBoard::new();
    let c = Arc::new(board_coordinator(&board));
    let sink = Arc::new(RecordingSink::default());
    let sinks: Vec<Arc<dyn SnapshotSink>> = vec![sink.clone()];
    let done = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let c = Arc::clone(&c);
            let source = if i % 2 == 0 { FillSource::Tank } else { FillSource::Silo };
            thread::spawn(move || {
                for _ in 0..200 {
                    c.start_fill(source);
                    c.stop_fill();
                }
            })
        })
        .collect();

    let ticker = {
        let c = Arc::clone(&c);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                broadcast_tick(&c, &sinks);
            }
        })
    };

    for w in workers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    ticker.join().unwrap();

    let taken = sink.taken();
    assert!(!taken.is_empty());
    for snap in &taken {
        let s = &snap.state;
        assert_eq!(s.filling, snap.relays.any_on(), "{snap:?}");
        assert_eq!(s.filling, s.fill_phase != FillPhase::Idle, "{snap:?}");
        if s.filling {
            assert!(s.fill_source.is_some());
        }
    }
    assert!(board.all_high());
}

/// Keeps only the most recent snapshot.
#[derive(Default)]
struct LatestSink(Mutex<Option<Snapshot>>);

impl SnapshotSink for LatestSink {
    fn publish(&self, snapshot: &Snapshot) {
        *self.0.lock().unwrap() = Some(snapshot.clone());
    }
}

/// Calls to `set_relay` per relay: odd calls switch on, even calls off.
const TOGGLES: u64 = 400;

#[test]
fn snapshot_reflects_every_completed_relay_call() {
    let board = MockBoard::new();
    let c = Arc::new(board_coordinator(&board));
    let latest = Arc::new(LatestSink::default());
    let sinks: Vec<Arc<dyn SnapshotSink>> = vec![latest.clone()];
    // Per relay: index of the last call begun, and of the last call returned.
    let counters: Arc<Vec<(AtomicU64, AtomicU64)>> = Arc::new(
        RelayId::ALL
            .iter()
            .map(|_| (AtomicU64::new(0), AtomicU64::new(0)))
            .collect(),
    );
    let done = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = RelayId::ALL
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let c = Arc::clone(&c);
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                let (started, returned) = &counters[i];
                for k in 1..=TOGGLES {
                    started.store(k, Ordering::SeqCst);
                    let action = if k % 2 == 1 { "on" } else { "off" };
                    c.set_relay(id.name(), action).unwrap();
                    returned.store(k, Ordering::SeqCst);
                    thread::yield_now();
                }
            })
        })
        .collect();

    let ticker = {
        let c = Arc::clone(&c);
        let counters = Arc::clone(&counters);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut conclusive = 0usize;
            loop {
                let finished = done.load(Ordering::SeqCst);
                let before: Vec<u64> =
                    counters.iter().map(|(_, r)| r.load(Ordering::SeqCst)).collect();
                broadcast_tick(&c, &sinks);
                let snap = latest.0.lock().unwrap().clone().unwrap();
                for (i, id) in RelayId::ALL.into_iter().enumerate() {
                    // No call began after the last completed one: the relay
                    // must show exactly what that call set.
                    if counters[i].0.load(Ordering::SeqCst) == before[i] {
                        assert_eq!(
                            snap.relays.get(id),
                            before[i] % 2 == 1,
                            "{id} after call {}: {snap:?}",
                            before[i]
                        );
                        conclusive += 1;
                    }
                }
                if finished {
                    break conclusive;
                }
            }
        })
    };

    for w in workers {
        w.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    let conclusive = ticker.join().unwrap();

    assert!(conclusive > 0);
    let last = c.snapshot();
    assert!(!last.relays.any_on());
    assert!(board.all_high());
}

#[test]
fn every_subscriber_sees_the_same_snapshot() {
    let c = simulated_coordinator();
    let hub = SnapshotHub::new();
    let sinks: Vec<Arc<dyn SnapshotSink>> = vec![Arc::new(hub.clone())];
    let mut a = hub.subscribe().unwrap();
    let mut b = hub.subscribe().unwrap();

    c.simulate_add_weight(7.0);
    c.start_fill(FillSource::Silo);
    assert_eq!(broadcast_tick(&c, &sinks), 1);

    let sa = a.try_recv().unwrap();
    let sb = b.try_recv().unwrap();
    assert_eq!(sa, sb);
    assert_eq!(sa.weight.value, 7.0);
    assert!(sa.relays.damper);
    assert_eq!(sa.state.fill_phase, FillPhase::Coarse);
}

#[test]
fn late_subscriber_sees_only_new_snapshots() {
    let c = simulated_coordinator();
    let hub = SnapshotHub::new();
    let sinks: Vec<Arc<dyn SnapshotSink>> = vec![Arc::new(hub.clone())];
    let _early = hub.subscribe().unwrap();
    broadcast_tick(&c, &sinks);

    let mut late = hub.subscribe().unwrap();
    assert!(late.try_recv().is_none());
    c.simulate_add_weight(2.0);
    broadcast_tick(&c, &sinks);
    assert_eq!(late.try_recv().unwrap().weight.value, 2.0);
}

#[test]
fn loop_keeps_running_with_no_listeners() {
    let c = Arc::new(simulated_coordinator());
    let sink = Arc::new(RecordingSink::default());
    let hub = SnapshotHub::new();
    let sinks: Vec<Arc<dyn SnapshotSink>> = vec![Arc::new(hub.clone()), sink.clone()];
    let bl = BroadcastLoop::spawn(Arc::clone(&c), sinks, Duration::from_millis(5)).unwrap();

    thread::sleep(Duration::from_millis(50));
    let mut sub = hub.subscribe().unwrap();
    c.simulate_add_weight(9.0);
    let snap = loop {
        let s = sub.recv_timeout(Duration::from_secs(2)).unwrap();
        if s.weight.value == 9.0 {
            break s;
        }
    };
    bl.stop();
    assert!(!snap.state.filling);
    assert!(sink.taken().len() >= 2);
}
