//! Line-oriented TCP transport.
//!
//! Serves the command API and the snapshot stream over plain TCP, one
//! JSON document per line.  Connection model:
//!
//! 1. [`TcpTransport::bind`] opens the listener.
//! 2. Each accepted client gets a hub subscription (refused with an
//!    `error` line when the hub is full) and a `connected` greeting.
//! 3. A forwarder thread writes every snapshot as a `sensor_data` event.
//! 4. The client thread decodes inbound lines and writes replies.
//! 5. On EOF or a write error both threads wind down and the
//!    subscription is dropped.
//!
//! Writes from both threads go through one mutex so lines never interleave.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use serde_json::Value;

use crate::api::codec::{LineDecoder, encode_line};
use crate::api::session::handle_line;
use crate::app::events::RigEvent;
use crate::app::service::Coordinator;
use crate::broadcast::{SnapshotHub, Subscription};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:5000";

const READ_BUF_SIZE: usize = 1024;

/// How often an idle forwarder re-checks whether its client is gone.
const FORWARD_POLL: Duration = Duration::from_millis(500);

pub struct TcpTransport {
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    hub: SnapshotHub,
}

impl TcpTransport {
    pub fn bind(
        addr: impl ToSocketAddrs,
        coordinator: Arc<Coordinator>,
        hub: SnapshotHub,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        info!("TCP: listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            coordinator,
            hub,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients forever, one thread each.
    pub fn serve(self) -> io::Result<()> {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    warn!("TCP: accept failed: {e}");
                    continue;
                }
            };
            let peer = stream
                .peer_addr()
                .map_or_else(|_| "?".to_owned(), |a| a.to_string());
            let coordinator = Arc::clone(&self.coordinator);
            let hub = self.hub.clone();
            let spawned = thread::Builder::new()
                .name(format!("client-{peer}"))
                .spawn(move || serve_client(stream, &peer, &coordinator, &hub));
            if let Err(e) = spawned {
                warn!("TCP: cannot spawn client thread: {e}");
            }
        }
        Ok(())
    }

    /// Run [`serve`](Self::serve) on a background thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name("tcp-accept".into()).spawn(move || {
            if let Err(e) = self.serve() {
                warn!("TCP: listener stopped: {e}");
            }
        })
    }
}

// ── Per-client ───────────────────────────────────────────────

type SharedWriter = Arc<Mutex<TcpStream>>;

fn send(writer: &SharedWriter, message: &Value) -> io::Result<()> {
    let line = encode_line(message).map_err(io::Error::other)?;
    let mut stream = writer.lock().unwrap_or_else(PoisonError::into_inner);
    stream.write_all(line.as_bytes())?;
    stream.flush()
}

fn serve_client(mut stream: TcpStream, peer: &str, coordinator: &Coordinator, hub: &SnapshotHub) {
    let Some(subscription) = hub.subscribe() else {
        warn!("TCP: refusing {peer}, subscriber limit reached");
        let refusal = RigEvent::Error("too many clients".into()).to_message();
        if let Ok(line) = encode_line(&refusal) {
            let _ = stream.write_all(line.as_bytes());
        }
        let _ = stream.shutdown(Shutdown::Both);
        return;
    };

    let writer: SharedWriter = match stream.try_clone() {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            warn!("TCP: {peer}: cannot clone stream: {e}");
            return;
        }
    };

    info!("TCP: client {peer} connected");
    if send(&writer, &coordinator.connected_event().to_message()).is_err() {
        return;
    }

    let closed = Arc::new(AtomicBool::new(false));
    let forwarder = {
        let writer = Arc::clone(&writer);
        let closed = Arc::clone(&closed);
        thread::Builder::new()
            .name(format!("fwd-{peer}"))
            .spawn(move || forward_snapshots(subscription, &writer, &closed))
    };

    let mut decoder = LineDecoder::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("TCP: {peer}: read error: {e}");
                break;
            }
        };
        for line in decoder.feed(&buf[..n]) {
            if let Some(reply) = handle_line(coordinator, &line) {
                if let Err(e) = send(&writer, &reply) {
                    debug!("TCP: {peer}: write error: {e}");
                }
            }
        }
    }

    closed.store(true, Ordering::Release);
    let _ = stream.shutdown(Shutdown::Both);
    if let Ok(handle) = forwarder {
        let _ = handle.join();
    }
    if decoder.dropped() > 0 {
        warn!("TCP: {peer}: {} lines discarded", decoder.dropped());
    }
    info!("TCP: client {peer} disconnected");
}

fn forward_snapshots(mut subscription: Subscription, writer: &SharedWriter, closed: &AtomicBool) {
    while !closed.load(Ordering::Acquire) {
        let Some(snapshot) = subscription.recv_timeout(FORWARD_POLL) else {
            continue;
        };
        if send(writer, &RigEvent::SensorData(snapshot).to_message()).is_err() {
            break;
        }
    }
}
