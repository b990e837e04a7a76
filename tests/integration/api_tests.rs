//! Request handling through the session layer and over a real socket.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use ibcfill::adapters::tcp_transport::TcpTransport;
use ibcfill::api::session::handle_line;
use ibcfill::app::ports::SnapshotSink;
use ibcfill::broadcast::{BroadcastLoop, MAX_SUBSCRIBERS, SnapshotHub};
use serde_json::{Value, json};

use crate::mock_hw::{MockBoard, board_coordinator, simulated_coordinator};

fn request(method: &str, path: &str, body: Option<Value>) -> String {
    let mut msg = json!({ "method": method, "path": path });
    if let Some(body) = body {
        msg["body"] = body;
    }
    msg.to_string()
}

#[test]
fn status_request_reports_everything() {
    let c = simulated_coordinator();
    c.simulate_add_weight(12.5);
    let reply = handle_line(&c, &request("GET", "/api/status", None)).unwrap();
    assert_eq!(reply["status"], 200);
    let body = &reply["body"];
    assert_eq!(body["weight"], 12.5);
    assert!(body["temperature"].is_number());
    assert_eq!(body["relays"], json!({"pump": false, "valve": false, "damper": false}));
    assert_eq!(body["state"]["tank_target"], 500.0);
    assert_eq!(body["on_raspberry_pi"], false);
}

#[test]
fn relay_request_drives_board() {
    let board = MockBoard::new();
    let c = board_coordinator(&board);
    let reply = handle_line(&c, &request("POST", "/api/relay/valve/on", None)).unwrap();
    assert_eq!(reply["body"], json!({"success": true, "relay": "valve", "state": true}));
    assert_eq!(board.valve.last(), Some(false));

    handle_line(&c, &request("POST", "/api/relay/valve/off", None));
    assert_eq!(board.valve.last(), Some(true));
}

#[test]
fn emergency_stop_request() {
    let board = MockBoard::new();
    let c = board_coordinator(&board);
    handle_line(&c, &request("POST", "/api/start-fill/tank", None));
    assert!(!board.all_high());
    let reply = handle_line(&c, &request("POST", "/api/emergency-stop", None)).unwrap();
    assert_eq!(reply["status"], 200);
    assert_eq!(reply["body"]["message"], "Emergency stop activated");
    assert!(board.all_high());
}

#[test]
fn settings_request_validates_whole_body() {
    let c = simulated_coordinator();
    let reply = handle_line(
        &c,
        &request("POST", "/api/settings", Some(json!({"silo_overrun": 2, "tank_target": []}))),
    )
    .unwrap();
    assert_eq!(reply["status"], 400);
    assert_eq!(c.state().silo_overrun, 5.0);

    let reply = handle_line(
        &c,
        &request("POST", "/api/settings", Some(json!({"silo_overrun": " 2.5 "}))),
    )
    .unwrap();
    assert_eq!(reply["status"], 200);
    assert_eq!(reply["body"]["settings"]["silo_overrun"], 2.5);
}

#[test]
fn unknown_source_means_silo() {
    let c = simulated_coordinator();
    let reply = handle_line(&c, &request("POST", "/api/start-fill/hopper", None)).unwrap();
    assert_eq!(reply["body"]["source"], "silo");
    assert!(c.relay_states().damper);
}

#[test]
fn settings_event_acks_with_full_state() {
    let c = simulated_coordinator();
    let reply = handle_line(
        &c,
        r#"{"event":"update_settings","data":{"tank_target":800}}"#,
    )
    .unwrap();
    assert_eq!(reply["event"], "settings_updated");
    assert_eq!(reply["data"]["tank_target"], 800.0);
    assert_eq!(reply["data"]["fill_mode"], "idle");
}

// ── Over TCP ──────────────────────────────────────────────────

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Self {
            writer: stream.try_clone().unwrap(),
            reader: BufReader::new(stream),
        }
    }

    fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        serde_json::from_str(&line).unwrap()
    }

    /// Next message whose `event` is not `sensor_data`.
    fn recv_reply(&mut self) -> Value {
        loop {
            let msg = self.recv();
            if msg["event"] != "sensor_data" {
                return msg;
            }
        }
    }

    fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).unwrap();
        self.writer.write_all(b"\n").unwrap();
    }
}

#[test]
fn tcp_session_end_to_end() {
    let c = Arc::new(simulated_coordinator());
    let hub = SnapshotHub::new();
    let transport = TcpTransport::bind("127.0.0.1:0", Arc::clone(&c), hub.clone()).unwrap();
    let addr = transport.local_addr().unwrap();
    let _accept = transport.spawn().unwrap();
    let sinks: Vec<Arc<dyn SnapshotSink>> = vec![Arc::new(hub.clone())];
    let _broadcast =
        BroadcastLoop::spawn(Arc::clone(&c), sinks, Duration::from_millis(20)).unwrap();

    let mut client = Client::connect(addr);
    assert_eq!(
        client.recv(),
        json!({"event": "connected", "data": {"status": "ok", "on_raspberry_pi": false}})
    );

    let data = loop {
        let msg = client.recv();
        if msg["event"] == "sensor_data" {
            break msg["data"].clone();
        }
    };
    assert_eq!(data["type"], "sensor_update");
    assert!(data["relays"].is_object());

    client.send(r#"{"event":"start_fill","data":{"source":"tank"}}"#);
    assert_eq!(
        client.recv_reply(),
        json!({"event": "fill_started", "data": {"source": "tank"}})
    );
    assert!(c.relay_states().pump);

    client.send(r#"{"method":"POST","path":"/api/stop-fill"}"#);
    let reply = client.recv_reply();
    assert_eq!(reply["status"], 200);
    assert!(!c.relay_states().any_on());

    // A later snapshot reflects the stop.
    let data = loop {
        let msg = client.recv();
        if msg["event"] == "sensor_data" && msg["data"]["state"]["filling"] == false {
            break msg["data"].clone();
        }
    };
    assert_eq!(data["state"]["fill_source"], "tank");

    client.send("this is not json");
    assert_eq!(client.recv_reply()["status"], 400);
}

#[test]
fn tcp_refuses_clients_beyond_limit() {
    let c = Arc::new(simulated_coordinator());
    let hub = SnapshotHub::new();
    let transport = TcpTransport::bind("127.0.0.1:0", Arc::clone(&c), hub.clone()).unwrap();
    let addr = transport.local_addr().unwrap();
    let _accept = transport.spawn().unwrap();

    let mut clients: Vec<Client> = (0..MAX_SUBSCRIBERS).map(|_| Client::connect(addr)).collect();
    for client in &mut clients {
        assert_eq!(client.recv()["event"], "connected");
    }
    assert_eq!(hub.subscriber_count(), MAX_SUBSCRIBERS);

    let mut extra = Client::connect(addr);
    let refusal = extra.recv();
    assert_eq!(refusal["event"], "error");
    assert_eq!(refusal["data"]["message"], "too many clients");
}
