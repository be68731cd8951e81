//! Aqua Clock host simulation entry point.
//!
//! Wires the regulation core to the simulated plant and runs it on
//! simulated time, logging every state change and a periodic telemetry
//! line.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  sim::Plant       LogEventSink   MemStorage     SimWallClock   │
//! │  (RangeDevice,    (EventSink)    (StoragePort)  (WallClock)    │
//! │   valve/pump/switch lines)                                     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ControlService (pure logic)                 │    │
//! │  │  RangeSensorFilter · ColumnRegulator · Reservoir       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `aquaclock [config.json] [simulated-minutes]`

use anyhow::{Context, Result};
use log::{info, warn};

use aquaclock::adapters::log_sink::LogEventSink;
use aquaclock::adapters::sim::{self, PlantParams};
use aquaclock::adapters::storage::MemStorage;
use aquaclock::adapters::time::{MonotonicClock, SimWallClock};
use aquaclock::app::commands::AppCommand;
use aquaclock::app::service::ControlService;
use aquaclock::config::SystemConfig;
use aquaclock::control::Column;
use aquaclock::error::Error;
use aquaclock::scheduler::TimeOfDay;

/// Wall-clock minutes per simulated second.
const CLOCK_SPEEDUP: u32 = 60;
const DEFAULT_SIM_MINUTES: u64 = 10;

fn load_config(path: Option<&str>) -> Result<SystemConfig> {
    let Some(path) = path else {
        info!("No config file given, using defaults");
        return Ok(SystemConfig::default());
    };
    let bytes = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let config = SystemConfig::from_json(&bytes)
        .map_err(Error::from)
        .with_context(|| format!("loading {path}"))?;
    info!("Loaded config from {path}");
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("========================================");
    info!("  Aqua Clock v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");

    let args: Vec<String> = std::env::args().collect();
    let config = load_config(args.get(1).map(String::as_str))?;
    let minutes: u64 = match args.get(2) {
        Some(s) => s.parse().with_context(|| format!("bad minute count {s:?}"))?,
        None => DEFAULT_SIM_MINUTES,
    };

    let control_ms = u64::from(config.control_interval_ms);
    let (plant, hw) = sim::build(PlantParams::default(), 120.0);
    let mut sink = LogEventSink::new();
    let mut storage = MemStorage::new();
    let mut clock = SimWallClock::new(TimeOfDay::new(6, 58), CLOCK_SPEEDUP);
    let mut service = ControlService::new(config, hw);

    if let Err(e) = service.load_settings(&storage) {
        warn!("Settings not restored: {e}");
    }
    if let Err(e) = service.start(0, &mut sink) {
        warn!("Running degraded: {e}");
    }

    let wall = MonotonicClock::new();
    let end_ms = minutes * 60_000;
    let mut now_ms = 0u64;

    while now_ms <= end_ms {
        plant.borrow_mut().step(now_ms);
        clock.advance_to(now_ms);
        let inputs = service.read_clock(&mut clock);
        service.tick(now_ms, &inputs, &mut sink);

        // A little operator activity so every path shows up in the log.
        match now_ms {
            30_000 => service.handle_command(now_ms, AppCommand::ManualPump { duration_ms: None }, &mut sink),
            90_000 => service.handle_command(
                now_ms,
                AppCommand::OverrideSetpoint { column: Column::Minutes, setpoint_mm: Some(200) },
                &mut sink,
            ),
            240_000 => service.handle_command(
                now_ms,
                AppCommand::OverrideSetpoint { column: Column::Minutes, setpoint_mm: None },
                &mut sink,
            ),
            _ => {}
        }

        now_ms += control_ms;
    }

    service.save_settings(&mut storage)?;
    let p = plant.borrow();
    info!(
        "Simulated {} min ({} ticks) in {} ms: columns {:.0}/{:.0}/{:.0} mm, reservoir {:.0} mm, faults 0x{:08x}",
        minutes,
        service.tick_count(),
        wall.uptime_ms(),
        p.elevation_mm(0),
        p.elevation_mm(1),
        p.elevation_mm(2),
        p.reservoir_mm(),
        service.faults().bits(),
    );
    Ok(())
}
