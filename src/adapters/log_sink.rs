//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  A display or telemetry adapter would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::{AppEvent, ColumnTelemetry};
use crate::app::ports::EventSink;
use crate::control::Column;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn column_summary(c: &ColumnTelemetry) -> String {
    let ov = match c.override_mm {
        Some(mm) => format!(" ov={mm}"),
        None => String::new(),
    };
    format!(
        "{}/{:?} elev={} sp={}{} err={:?}{}",
        c.state,
        c.sensor,
        c.elevation_mm,
        c.setpoint_mm,
        ov,
        c.error,
        if c.enabled { "" } else { " (off)" },
    )
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | t={}ms | {}: {} | {}: {} | {}: {} | \
                     tank={} low={} high={} pump={} | sleep={} | faults=0x{:08x}",
                    t.uptime_ms,
                    Column::Hour,
                    column_summary(&t.columns[0]),
                    Column::TensOfMinutes,
                    column_summary(&t.columns[1]),
                    Column::Minutes,
                    column_summary(&t.columns[2]),
                    t.reservoir.state,
                    if t.reservoir.above_low { "WET" } else { "DRY" },
                    if t.reservoir.above_high { "WET" } else { "DRY" },
                    if t.reservoir.pumping { "ON" } else { "OFF" },
                    t.sleeping,
                    t.fault_bits,
                );
            }
            AppEvent::ColumnStateChanged { column, from, to } => {
                info!("STATE | column {} | {} -> {}", column, from, to);
            }
            AppEvent::ReservoirStateChanged { from, to } => {
                info!("STATE | reservoir | {} -> {}", from, to);
            }
            AppEvent::FaultRaised(kind) => {
                warn!("FAULT | raised: {}", kind);
            }
            AppEvent::FaultCleared(kind) => {
                info!("FAULT | cleared: {}", kind);
            }
            AppEvent::SleepChanged(asleep) => {
                info!("SLEEP | {}", if *asleep { "entering" } else { "leaving" });
            }
            AppEvent::CommandRejected { reason } => {
                warn!("CMD   | rejected: {}", reason);
            }
            AppEvent::Started { sensors_online } => {
                info!("START | range sensors online={}", sensors_online);
            }
        }
    }
}
