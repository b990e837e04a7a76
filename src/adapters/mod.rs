//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements / provides  | Connects to                 |
//! |-----------------|------------------------|-----------------------------|
//! | `hardware`      | RelayPin, WeightPort   | GPIO cdev, I2C (`rpi`)      |
//! | `log_sink`      | SnapshotSink           | `log` output                |
//! | `tcp_transport` | command API, snapshots | newline-delimited JSON/TCP  |

pub mod hardware;
pub mod log_sink;
pub mod tcp_transport;
