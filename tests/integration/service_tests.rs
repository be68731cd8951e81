//! Integration tests for the ControlService → regulators → pins pipeline.
//!
//! Every column's range sensor is scripted and every output is a recording
//! pin, so each test can assert on exactly what the service drove.

use aquaclock::app::commands::AppCommand;
use aquaclock::app::events::AppEvent;
use aquaclock::app::ports::ClockInputs;
use aquaclock::app::service::ControlService;
use aquaclock::calibration::DigitTables;
use aquaclock::config::SystemConfig;
use aquaclock::control::{Column, ColumnState, ReservoirState};
use aquaclock::error::Error;
use aquaclock::faults::FaultKind;
use aquaclock::sensors::FilterState;

use crate::mock_hw::{MockService, RecordingSink, rig, started_service};

const TICK_MS: u64 = 10;

/// Clock inputs for 12:00, awake: setpoints [299, 57, 52].
fn noon() -> ClockInputs {
    ClockInputs {
        setpoints: DigitTables::default().setpoints_for(12, 0),
        sleeping: false,
    }
}

fn run(svc: &mut MockService, sink: &mut RecordingSink, clock: &ClockInputs, from: u64, to: u64) {
    let mut t = from;
    while t <= to {
        svc.tick(t, clock, sink);
        t += TICK_MS;
    }
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn columns_wait_for_a_full_history_before_actuating() {
    let (mut svc, rig, mut sink) = started_service(100);

    run(&mut svc, &mut sink, &noon(), 10, 20);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Idle);
    assert!(!rig.any_valve_open(), "no actuation on a partial history");

    svc.tick(30, &noon(), &mut sink);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::FillActive);
    assert!(!rig.fills[0].is_on(), "valve opens on the step after entry");

    svc.tick(40, &noon(), &mut sink);
    assert!(rig.fills[0].is_on());
    assert!(!rig.drains[0].is_on());
}

#[test]
fn sensor_boot_failure_holds_its_column_safe() {
    let (rig, hw) = rig();
    rig.reservoir_full();
    for r in &rig.ranges {
        r.show_elevation(100);
    }
    rig.ranges[1].fail_boot();

    let mut svc = ControlService::new(SystemConfig::default(), hw);
    let mut sink = RecordingSink::default();
    let err = svc.start(0, &mut sink).unwrap_err();
    assert!(matches!(err, Error::SensorInit(e) if e.sensor == Column::TensOfMinutes.device_id()));
    assert!(sink.events.contains(&AppEvent::Started { sensors_online: 2 }));
    assert!(
        sink.events
            .contains(&AppEvent::FaultRaised(FaultKind::SensorInit(Column::TensOfMinutes.device_id())))
    );

    // Manual requests are refused outright and the valves never move.
    svc.handle_command(
        10,
        AppCommand::ManualFill {
            column: Column::TensOfMinutes,
            duration_ms: None,
        },
        &mut sink,
    );
    assert!(sink.events.contains(&AppEvent::CommandRejected {
        reason: "column sensor failed to start",
    }));
    run(&mut svc, &mut sink, &noon(), 10, 3_000);

    assert_eq!(svc.sensor(Column::TensOfMinutes).state(), FilterState::InitError);
    assert_eq!(svc.column_state(Column::TensOfMinutes), ColumnState::Idle);
    assert!(rig.fills[1].writes().iter().all(|on| !on));
    assert!(rig.drains[1].writes().iter().all(|on| !on));
    assert_eq!(rig.ranges[1].0.borrow().polls, 0, "a dead sensor is never polled");

    // The healthy columns still regulate.
    assert_ne!(svc.column_state(Column::Hour), ColumnState::Idle);
}

// ── Manual override ───────────────────────────────────────────

#[test]
fn manual_requests_need_a_reporting_sensor() {
    let (mut svc, rig, mut sink) = started_service(100);
    let not_reporting = AppEvent::CommandRejected {
        reason: "column sensor not reporting",
    };

    // History not yet primed.
    svc.handle_command(
        0,
        AppCommand::ManualDrain {
            column: Column::Minutes,
            duration_ms: Some(500),
        },
        &mut sink,
    );
    assert_eq!(sink.count(|e| *e == not_reporting), 1);
    run(&mut svc, &mut sink, &noon(), 10, 20);
    assert!(!rig.drains[2].is_on());
    assert!(!matches!(svc.column_state(Column::Minutes), ColumnState::ManualDrain { .. }));

    // Timed out mid-run.
    run(&mut svc, &mut sink, &noon(), 30, 100);
    rig.ranges[2].go_silent();
    run(&mut svc, &mut sink, &noon(), 110, 1_000);
    assert_eq!(svc.sensor(Column::Minutes).state(), FilterState::TimedOut);
    svc.handle_command(
        1_000,
        AppCommand::ManualFill {
            column: Column::Minutes,
            duration_ms: Some(500),
        },
        &mut sink,
    );
    assert_eq!(sink.count(|e| *e == not_reporting), 2);
    assert!(svc.column(Column::Minutes).pending_manual().is_none());

    // Accepted again once readings return.
    rig.ranges[2].show_elevation(52);
    svc.tick(1_010, &noon(), &mut sink);
    svc.handle_command(
        1_010,
        AppCommand::ManualFill {
            column: Column::Minutes,
            duration_ms: Some(500),
        },
        &mut sink,
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandRejected { .. })), 2);
    svc.tick(1_020, &noon(), &mut sink);
    assert_eq!(
        svc.column_state(Column::Minutes),
        ColumnState::ManualFill { duration_ms: 500 }
    );
    assert!(rig.fills[2].is_on());
}

#[test]
fn manual_fill_runs_for_its_duration_then_idles() {
    let (mut svc, rig, mut sink) = started_service(100);
    let sp = noon().setpoints;
    for (r, mm) in rig.ranges.iter().zip(sp) {
        r.show_elevation(mm);
    }
    run(&mut svc, &mut sink, &noon(), 10, 100);
    assert!(!rig.any_valve_open());

    svc.handle_command(
        100,
        AppCommand::ManualFill {
            column: Column::Minutes,
            duration_ms: Some(500),
        },
        &mut sink,
    );
    svc.tick(110, &noon(), &mut sink);
    assert_eq!(
        svc.column_state(Column::Minutes),
        ColumnState::ManualFill { duration_ms: 500 }
    );
    assert!(rig.fills[2].is_on());

    run(&mut svc, &mut sink, &noon(), 120, 600);
    assert!(rig.fills[2].is_on());
    svc.tick(610, &noon(), &mut sink);
    assert_eq!(svc.column_state(Column::Minutes), ColumnState::Idle);
    assert!(!rig.fills[2].is_on());
}

#[test]
fn manual_drain_uses_configured_default() {
    let (mut svc, rig, mut sink) = started_service(100);
    for (r, mm) in rig.ranges.iter().zip(noon().setpoints) {
        r.show_elevation(mm);
    }
    run(&mut svc, &mut sink, &noon(), 10, 50);

    svc.handle_command(
        50,
        AppCommand::ManualDrain {
            column: Column::Hour,
            duration_ms: None,
        },
        &mut sink,
    );
    svc.tick(60, &noon(), &mut sink);
    let default_ms = SystemConfig::default().columns[0].manual_drain_ms;
    assert_eq!(
        svc.column_state(Column::Hour),
        ColumnState::ManualDrain { duration_ms: default_ms }
    );
    assert!(rig.drains[0].is_on());
    assert!(!rig.fills[0].is_on());
}

// ── Timeouts ──────────────────────────────────────────────────

#[test]
fn fill_timeout_latches_error_until_reset() {
    let (mut svc, rig, mut sink) = started_service(100);
    rig.ranges[0].show_elevation(150);
    rig.ranges[1].show_elevation(57);
    rig.ranges[2].show_elevation(52);
    let timeout = FaultKind::ActuatorTimeout(Column::Hour.device_id());

    run(&mut svc, &mut sink, &noon(), 10, 61_000);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Error);
    assert!(svc.faults().is_active(timeout));
    assert!(!rig.fills[0].is_on());
    assert_eq!(sink.count(|e| *e == AppEvent::FaultRaised(timeout)), 1);

    // Stays put without an operator.
    run(&mut svc, &mut sink, &noon(), 61_010, 65_000);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Error);

    svc.handle_command(
        65_000,
        AppCommand::ManualFill {
            column: Column::Hour,
            duration_ms: None,
        },
        &mut sink,
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandRejected { .. })), 1);

    svc.handle_command(65_000, AppCommand::ResetColumn(Column::Hour), &mut sink);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Idle);
    assert!(!svc.faults().is_active(timeout));
    assert!(sink.events.contains(&AppEvent::FaultCleared(timeout)));

    svc.tick(65_010, &noon(), &mut sink);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::FillActive);
}

#[test]
fn silent_sensor_raises_timeout_once() {
    let (mut svc, rig, mut sink) = started_service(100);
    run(&mut svc, &mut sink, &noon(), 10, 100);
    rig.ranges[2].go_silent();
    let kind = FaultKind::SensorTimeout(Column::Minutes.device_id());

    run(&mut svc, &mut sink, &noon(), 110, 2_000);
    assert_eq!(svc.sensor(Column::Minutes).state(), FilterState::TimedOut);
    assert!(svc.faults().is_active(kind));
    assert_eq!(sink.count(|e| *e == AppEvent::FaultRaised(kind)), 1);

    // Cleared while still silent: raised again on the next poll.
    svc.handle_command(2_000, AppCommand::ClearFault(kind), &mut sink);
    svc.tick(2_010, &noon(), &mut sink);
    assert!(svc.faults().is_active(kind));

    rig.ranges[2].show_elevation(120);
    svc.tick(2_020, &noon(), &mut sink);
    assert_eq!(svc.sensor(Column::Minutes).state(), FilterState::Working);
    assert!(svc.faults().is_active(kind), "faults stay until cleared");

    svc.handle_command(2_020, AppCommand::ClearFault(kind), &mut sink);
    run(&mut svc, &mut sink, &noon(), 2_030, 3_000);
    assert!(!svc.faults().is_active(kind));
}

#[test]
fn stalled_sensor_closes_its_valves_on_the_fault_tick() {
    let (mut svc, rig, mut sink) = started_service(100);
    run(&mut svc, &mut sink, &noon(), 10, 100);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::FillActive);
    assert!(rig.fills[0].is_on());

    // Last reading at 100 ms; the 200 ms timeout lapses at 310.
    rig.ranges[0].go_silent();
    let kind = FaultKind::SensorTimeout(Column::Hour.device_id());
    run(&mut svc, &mut sink, &noon(), 110, 300);
    assert!(!svc.faults().is_active(kind));

    svc.tick(310, &noon(), &mut sink);
    assert!(svc.faults().is_active(kind));
    assert!(!rig.fills[0].is_on());
    assert!(!rig.drains[0].is_on());
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Idle);
    assert!(sink.events.contains(&AppEvent::ColumnStateChanged {
        column: Column::Hour,
        from: ColumnState::FillActive,
        to: ColumnState::Idle,
    }));

    // Held shut for as long as the sensor stays quiet.
    rig.fills[0].clear_history();
    run(&mut svc, &mut sink, &noon(), 320, 5_000);
    assert!(rig.fills[0].writes().iter().all(|on| !on));
    assert!(!rig.fills[0].is_on());
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Idle);

    // Readings return: regulation resumes, the fault stays latched.
    rig.ranges[0].show_elevation(100);
    svc.tick(5_010, &noon(), &mut sink);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::FillActive);
    svc.tick(5_020, &noon(), &mut sink);
    assert!(rig.fills[0].is_on());
    assert!(svc.faults().is_active(kind));
}

// ── Enables and setpoints ─────────────────────────────────────

#[test]
fn disabling_a_filling_column_closes_its_valve() {
    let (mut svc, rig, mut sink) = started_service(100);
    run(&mut svc, &mut sink, &noon(), 10, 100);
    assert!(rig.fills[0].is_on());

    svc.handle_command(100, AppCommand::SetAllEnable(false), &mut sink);
    svc.tick(110, &noon(), &mut sink);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::FillSettle);
    assert!(!rig.any_valve_open());

    run(&mut svc, &mut sink, &noon(), 120, 3_000);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Idle);
    assert!(!rig.any_valve_open());
}

#[test]
fn override_replaces_clock_setpoint_within_limits() {
    let (mut svc, _rig, mut sink) = started_service(100);
    svc.tick(10, &noon(), &mut sink);

    svc.handle_command(
        10,
        AppCommand::OverrideSetpoint {
            column: Column::Minutes,
            setpoint_mm: Some(400),
        },
        &mut sink,
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandRejected { .. })), 1);
    assert_eq!(svc.target_setpoint(Column::Minutes), 52);

    svc.handle_command(
        10,
        AppCommand::OverrideSetpoint {
            column: Column::Minutes,
            setpoint_mm: Some(200),
        },
        &mut sink,
    );
    assert_eq!(svc.target_setpoint(Column::Minutes), 200);

    run(&mut svc, &mut sink, &noon(), 20, 100);
    assert_eq!(svc.column(Column::Minutes).setpoint_mm(), 200);

    svc.handle_command(
        100,
        AppCommand::OverrideSetpoint {
            column: Column::Minutes,
            setpoint_mm: None,
        },
        &mut sink,
    );
    assert_eq!(svc.target_setpoint(Column::Minutes), 52);
}

#[test]
fn sleep_holds_the_last_awake_setpoints() {
    let (mut svc, _rig, mut sink) = started_service(100);
    run(&mut svc, &mut sink, &noon(), 10, 50);

    let night = ClockInputs {
        setpoints: DigitTables::default().setpoints_for(21, 45),
        sleeping: true,
    };
    run(&mut svc, &mut sink, &night, 60, 200);
    assert!(svc.is_sleeping());
    assert_eq!(svc.target_setpoint(Column::Hour), noon().setpoints[0]);
    assert_eq!(sink.count(|e| *e == AppEvent::SleepChanged(true)), 1);

    let morning = ClockInputs {
        setpoints: DigitTables::default().setpoints_for(7, 1),
        sleeping: false,
    };
    svc.tick(210, &morning, &mut sink);
    assert!(!svc.is_sleeping());
    assert_eq!(svc.target_setpoint(Column::Hour), morning.setpoints[0]);
    assert!(sink.events.contains(&AppEvent::SleepChanged(false)));
}

// ── Reservoir ─────────────────────────────────────────────────

#[test]
fn reservoir_refills_from_low_to_high_float() {
    let (mut svc, rig, mut sink) = started_service(100);
    for (r, mm) in rig.ranges.iter().zip(noon().setpoints) {
        r.show_elevation(mm);
    }
    rig.low.set_wet(false);
    rig.high.set_wet(false);

    svc.tick(10, &noon(), &mut sink);
    assert_eq!(svc.reservoir().state(), ReservoirState::FillActive);
    svc.tick(20, &noon(), &mut sink);
    assert!(rig.pump.is_on());

    rig.reservoir_full();
    svc.tick(30, &noon(), &mut sink);
    assert_eq!(svc.reservoir().state(), ReservoirState::FillSettle);
    assert!(!rig.pump.is_on());

    run(&mut svc, &mut sink, &noon(), 40, 1_100);
    assert_eq!(svc.reservoir().state(), ReservoirState::Idle);
    assert!(sink.events.contains(&AppEvent::ReservoirStateChanged {
        from: ReservoirState::FillSettle,
        to: ReservoirState::Idle,
    }));
}

#[test]
fn reservoir_waits_while_a_column_is_actuating() {
    let (mut svc, rig, mut sink) = started_service(100);
    for (r, mm) in rig.ranges.iter().zip(noon().setpoints) {
        r.show_elevation(mm);
    }
    run(&mut svc, &mut sink, &noon(), 10, 50);

    svc.handle_command(
        50,
        AppCommand::ManualFill {
            column: Column::Hour,
            duration_ms: Some(1_000),
        },
        &mut sink,
    );
    rig.low.set_wet(false);
    rig.high.set_wet(false);

    run(&mut svc, &mut sink, &noon(), 60, 1_050);
    assert_eq!(svc.reservoir().state(), ReservoirState::Idle);
    assert!(!rig.pump.is_on());

    // The manual run ends at 1060; the refill starts on that same tick.
    svc.tick(1_060, &noon(), &mut sink);
    assert_eq!(svc.column_state(Column::Hour), ColumnState::Idle);
    assert_eq!(svc.reservoir().state(), ReservoirState::FillActive);
}

#[test]
fn pump_timeout_faults_and_manual_pump_is_refused() {
    let (mut svc, rig, mut sink) = started_service(100);
    for (r, mm) in rig.ranges.iter().zip(noon().setpoints) {
        r.show_elevation(mm);
    }
    rig.low.set_wet(false);
    rig.high.set_wet(false);

    run(&mut svc, &mut sink, &noon(), 10, 31_000);
    assert_eq!(svc.reservoir().state(), ReservoirState::FillTimeoutFault);
    assert!(svc.faults().is_active(FaultKind::ReservoirFillTimeout));
    assert!(!rig.pump.is_on());

    svc.handle_command(31_000, AppCommand::ManualPump { duration_ms: None }, &mut sink);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandRejected { .. })), 1);

    svc.handle_command(31_000, AppCommand::ResetReservoir, &mut sink);
    assert_eq!(svc.reservoir().state(), ReservoirState::Idle);
    assert!(!svc.faults().is_active(FaultKind::ReservoirFillTimeout));
}

#[test]
fn impossible_float_combination_is_reported() {
    let (mut svc, rig, mut sink) = started_service(100);
    rig.low.set_wet(false);
    rig.high.set_wet(true);
    svc.tick(10, &noon(), &mut sink);
    assert!(svc.faults().is_active(FaultKind::LevelSenseContradiction));
    assert!(
        sink.events
            .contains(&AppEvent::FaultRaised(FaultKind::LevelSenseContradiction))
    );
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_follows_its_interval() {
    let (mut svc, _rig, mut sink) = started_service(100);
    run(&mut svc, &mut sink, &noon(), 10, 130_000);

    let snaps: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Telemetry(t) => Some(t.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(snaps.len(), 3);
    assert_eq!(snaps[1].uptime_ms - snaps[0].uptime_ms, 60_000);

    let last = &snaps[2];
    assert_eq!(last.columns[0].setpoint_mm, 299);
    assert_eq!(last.columns[0].sensor, FilterState::Working);
    assert!(last.reservoir.above_low && last.reservoir.above_high);
    assert_eq!(last.fault_bits, svc.faults().bits());
}
