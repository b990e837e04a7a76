//! IBC fill controller: entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │  hardware (GPIO, I2C)   tcp_transport   log_sink             │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  Coordinator: RelayBank + ProcessState behind one lock │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │  Broadcast loop (100 ms) ──▶ SnapshotHub ──▶ clients         │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use ibcfill::adapters::hardware;
use ibcfill::adapters::log_sink::LogSnapshotSink;
use ibcfill::adapters::tcp_transport::{DEFAULT_LISTEN, TcpTransport};
use ibcfill::app::ports::SnapshotSink;
use ibcfill::app::service::Coordinator;
use ibcfill::broadcast::{BroadcastLoop, SnapshotHub};
use ibcfill::config::{RigConfig, SimulationFlags};

/// Controller for the IBC filling rig.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Address for the line-oriented JSON API
    #[arg(short, long, env = "IBCFILL_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Simulate the load cell (same as SIMULATE_WEIGHT=1)
    #[arg(long)]
    simulate_weight: bool,

    /// Keep relays logical-only (same as SIMULATE_RELAYS=1)
    #[arg(long)]
    simulate_relays: bool,

    /// Simulate everything (same as SIMULATE=1)
    #[arg(long)]
    simulate: bool,
}

impl Cli {
    fn simulation_flags(&self) -> SimulationFlags {
        SimulationFlags {
            weight: self.simulate || self.simulate_weight,
            relays: self.simulate || self.simulate_relays,
        }
    }
}

fn main() -> Result<()> {
    // ── 1. Logging + arguments ────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = RigConfig::default();
    let flags = SimulationFlags::from_env().merge(cli.simulation_flags());
    let on_pi = hardware::on_target_board(&config);

    info!("==================================================");
    info!("  IBC fill controller v{}", env!("CARGO_PKG_VERSION"));
    info!("==================================================");
    let mut mode = vec![if on_pi { "Raspberry Pi" } else { "simulation (full)" }];
    if flags.weight {
        mode.push("weight: simulated");
    }
    if flags.relays {
        mode.push("relays: simulated");
    }
    info!("  Mode: {}", mode.join(", "));

    // ── 2. Hardware + coordinator ─────────────────────────────
    let relays = hardware::relay_bank(flags, &config);
    let sensors = hardware::sensors(flags, &config);
    let coordinator = Arc::new(Coordinator::from_sensors(relays, sensors, &config, on_pi));
    info!(
        "  Weight: {} | Temperature: {} | Relay GPIO: {}",
        coordinator.weight_mode(),
        coordinator.temperature_mode(),
        if coordinator.relays_attached() { "attached" } else { "none" }
    );

    // ── 3. Termination → relays off, pins released ────────────
    {
        let coordinator = Arc::clone(&coordinator);
        ctrlc::set_handler(move || {
            warn!("Termination signal, shutting down");
            coordinator.shutdown();
            std::process::exit(0);
        })
        .context("installing signal handler")?;
    }

    // ── 4. Broadcast loop ─────────────────────────────────────
    let hub = SnapshotHub::new();
    let sinks: Vec<Arc<dyn SnapshotSink>> =
        vec![Arc::new(hub.clone()), Arc::new(LogSnapshotSink::new())];
    let _broadcast = BroadcastLoop::spawn(
        Arc::clone(&coordinator),
        sinks,
        Duration::from_millis(config.broadcast_interval_ms),
    )
    .context("starting broadcast loop")?;

    // ── 5. Serve clients ──────────────────────────────────────
    let transport = TcpTransport::bind(cli.listen.as_str(), Arc::clone(&coordinator), hub)
        .with_context(|| format!("binding {}", cli.listen))?;
    let result = transport.serve().context("serving clients");

    coordinator.shutdown();
    result
}
