//! Periodic and ART acquisition: scheduling, fetch gating, not-ready
//! classification and stream control.

mod common;

use common::{assert_health_invariant, begun, measurement_bytes};
use sht3x::{
    Capabilities, Config, DriverState, ErrorKind, MeasurementStart, Mode, PeriodicRate,
    Repeatability, TransportError,
};

fn periodic_config(capabilities: Capabilities) -> Config {
    Config { capabilities, ..Config::default() }
}

#[test]
fn not_ready_with_capability_is_not_a_failure() {
    // Seed scenario 2: transport can prove read-header NACKs.
    let (mut sht, transport, clock) = begun(&periodic_config(Capabilities::READ_HEADER_NACK));
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();
    transport.clear_log();

    let started = sht.request_measurement().unwrap();
    assert_eq!(started, MeasurementStart::Scheduled);

    // First fetch: the device has nothing yet.
    transport.push_read_err(TransportError::NackRead);
    let t1 = sht.settings().measurement_ready_ms;
    clock.set_ms(t1);
    sht.tick(t1);

    assert!(!sht.measurement_ready());
    assert!(sht.settings().measurement_pending);
    assert_eq!(sht.consecutive_failures(), 0);
    assert_eq!(sht.state(), DriverState::Ready);
    assert!(sht.last_bus_activity_ms() >= t1);
    assert_eq!(sht.not_ready_count(), 1);
    assert_health_invariant(&sht);

    // One command delay later the sample is there.
    transport.push_read_bytes(&measurement_bytes(0x8000, 0x4000));
    let t2 = t1 + 2;
    clock.set_ms(t2);
    sht.tick(t2);

    assert!(sht.measurement_ready());
    assert_eq!(sht.not_ready_count(), 0);
    assert_eq!(sht.state(), DriverState::Ready);
    let m = sht.get_measurement().unwrap();
    assert!((m.temperature_c - 42.5).abs() < 0.05);
    assert!((m.humidity_pct - 25.0).abs() < 0.05);
}

#[test]
fn read_nack_without_capability_is_a_real_failure() {
    // Seed scenario 3: no capability, so a read NACK cannot be trusted as
    // "not ready" and is remapped to a generic I2C failure.
    let (mut sht, transport, clock) = begun(&periodic_config(Capabilities::NONE));
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();

    let _ = sht.request_measurement().unwrap();
    transport.push_read_err(TransportError::NackRead);
    let t1 = sht.settings().measurement_ready_ms;
    clock.set_ms(t1);
    sht.tick(t1);

    assert!(!sht.measurement_ready());
    assert_eq!(sht.consecutive_failures(), 1);
    assert_eq!(sht.state(), DriverState::Degraded);
    let err = sht.last_error().expect("failure should be recorded");
    assert_eq!(err.kind(), ErrorKind::I2c);
    assert_health_invariant(&sht);
}

#[test]
fn not_ready_escalates_after_budget() {
    let (mut sht, transport, clock) = begun(&Config {
        capabilities: Capabilities::READ_HEADER_NACK,
        not_ready_timeout_ms: 5,
        ..Config::default()
    });
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();

    let _ = sht.request_measurement().unwrap();
    transport.push_read_err(TransportError::NackRead);
    let t1 = sht.settings().measurement_ready_ms;
    clock.set_ms(t1);
    sht.tick(t1);
    assert_eq!(sht.consecutive_failures(), 0);

    // Budget exhausted: the next NACK registers as a real failure, and this
    // time it keeps its own classification because the capability is
    // declared.
    transport.push_read_err(TransportError::NackRead);
    let t2 = t1 + 10;
    clock.set_ms(t2);
    sht.tick(t2);

    assert_eq!(sht.consecutive_failures(), 1);
    assert_eq!(sht.state(), DriverState::Degraded);
    assert_eq!(sht.last_error().map(|e| e.kind()), Some(ErrorKind::I2cNackRead));
    assert_health_invariant(&sht);
}

#[test]
fn fetch_margin_gates_the_first_fetch() {
    let (mut sht, transport, clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();
    let start = sht.settings().measurement_ready_ms; // 0 right after start
    assert_eq!(start, 0);
    transport.clear_log();

    let request_at = clock.now_ms();
    let _ = sht.request_measurement().unwrap();

    // Auto margin for 1 mps is period/20 = 50 ms past the 1000 ms period,
    // anchored at the stream start (a moment before `request_at`).
    let ready = sht.settings().measurement_ready_ms;
    assert!(ready >= request_at + 1000 + 45);
    assert!(ready <= request_at + 1000 + 55);

    clock.set_ms(ready - 1);
    sht.tick(ready - 1);
    assert_eq!(transport.op_count(), 0);

    clock.set_ms(ready);
    sht.tick(ready);
    assert!(transport.writes().contains(&vec![0xE0, 0x00]));
    assert!(sht.measurement_ready());
}

#[test]
fn configured_margin_overrides_auto() {
    let (mut sht, _transport, clock) = begun(&Config {
        periodic_fetch_margin_ms: 7,
        ..Config::default()
    });
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();

    let request_at = clock.now_ms();
    let _ = sht.request_measurement().unwrap();
    let ready = sht.settings().measurement_ready_ms;
    assert!(ready >= request_at + 1000 + 4);
    assert!(ready < request_at + 1000 + 45);
}

#[test]
fn missed_samples_accumulate() {
    let (mut sht, _transport, clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();

    let _ = sht.request_measurement().unwrap();
    let t1 = sht.settings().measurement_ready_ms;
    clock.set_ms(t1);
    sht.tick(t1);
    assert!(sht.measurement_ready());
    assert_eq!(sht.missed_samples_estimate(), 0);
    sht.get_measurement().unwrap();

    // Fetch again three and a half periods later: two samples were lost.
    let _ = sht.request_measurement().unwrap();
    let t2 = t1 + 3500;
    clock.set_ms(t2);
    sht.tick(t2);
    assert!(sht.measurement_ready());
    assert_eq!(sht.missed_samples_estimate(), 2);
}

#[test]
fn art_runs_at_fixed_period() {
    let (mut sht, transport, clock) = begun(&Config::default());
    sht.start_art().unwrap();

    assert_eq!(sht.mode(), Mode::Art);
    assert!(sht.settings().periodic_active);
    assert!(transport.writes().contains(&vec![0x2B, 0x32]));
    assert_eq!(sht.cached_settings().mode, Mode::Art);

    let request_at = clock.now_ms();
    let _ = sht.request_measurement().unwrap();
    let ready = sht.settings().measurement_ready_ms;
    // 250 ms period plus the auto margin max(2, 250/20) = 12 ms.
    assert!(ready >= request_at + 250 + 8);
    assert!(ready <= request_at + 250 + 14);
}

#[test]
fn rate_change_restarts_the_stream() {
    let (mut sht, transport, _clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();
    transport.clear_log();

    sht.set_periodic_rate(PeriodicRate::Mps2).unwrap();

    let writes = transport.writes();
    assert_eq!(writes[0], vec![0x30, 0x93], "break must precede the restart");
    assert_eq!(writes[1], vec![0x22, 0x36]);
    assert_eq!(sht.cached_settings().periodic_rate, PeriodicRate::Mps2);
    assert_eq!(sht.mode(), Mode::Periodic);
}

#[test]
fn repeatability_change_restarts_the_stream() {
    let (mut sht, transport, _clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps2, Repeatability::High).unwrap();
    transport.clear_log();

    sht.set_repeatability(Repeatability::Medium).unwrap();

    let writes = transport.writes();
    assert_eq!(writes[0], vec![0x30, 0x93]);
    assert_eq!(writes[1], vec![0x22, 0x20]);
    assert_eq!(sht.cached_settings().repeatability, Repeatability::Medium);
}

#[test]
fn device_commands_are_blocked_mid_stream() {
    let (mut sht, _transport, _clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();

    assert_eq!(sht.read_status().unwrap_err().kind(), ErrorKind::Busy);
    assert_eq!(sht.clear_status().unwrap_err().kind(), ErrorKind::Busy);
    assert_eq!(sht.set_heater(true).unwrap_err().kind(), ErrorKind::Busy);
    assert_eq!(
        sht.read_serial_number(sht3x::ClockStretching::Disabled).unwrap_err().kind(),
        ErrorKind::Busy
    );
    assert_eq!(
        sht.write_alert_limit_raw(sht3x::AlertLimitKind::HighSet, 0x1234).unwrap_err().kind(),
        ErrorKind::Busy
    );
    assert_eq!(sht.soft_reset().unwrap_err().kind(), ErrorKind::Busy);

    // The snapshot variant degrades gracefully instead of failing.
    let snapshot = sht.read_settings().unwrap();
    assert!(!snapshot.status_valid);
    assert!(snapshot.periodic_active);
}

#[test]
fn stop_periodic_returns_to_single_shot() {
    let (mut sht, transport, _clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();
    transport.clear_log();

    sht.stop_periodic().unwrap();

    assert_eq!(transport.writes()[0], vec![0x30, 0x93]);
    assert_eq!(sht.mode(), Mode::SingleShot);
    assert!(!sht.settings().periodic_active);
    assert_eq!(sht.cached_settings().mode, Mode::SingleShot);
    assert_eq!(sht.missed_samples_estimate(), 0);
}

#[test]
fn failed_fetch_at_same_instant_is_idle() {
    let (mut sht, transport, clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();

    let _ = sht.request_measurement().unwrap();
    transport.push_read_err(TransportError::Bus);
    let t1 = sht.settings().measurement_ready_ms;
    clock.set_ms(t1);
    sht.tick(t1);
    assert!(sht.settings().measurement_pending);
    assert_eq!(sht.consecutive_failures(), 1);

    // A repeat tick at the same instant must not reach the bus or
    // double-count the failure.
    let ops = transport.op_count();
    sht.tick(t1);
    assert_eq!(transport.op_count(), ops);
    assert_eq!(sht.consecutive_failures(), 1);
    assert_health_invariant(&sht);
}

#[test]
fn tick_between_fetches_is_idle() {
    let (mut sht, transport, clock) = begun(&Config::default());
    sht.start_periodic(PeriodicRate::Mps1, Repeatability::High).unwrap();

    let _ = sht.request_measurement().unwrap();
    let ready = sht.settings().measurement_ready_ms;
    clock.set_ms(ready);
    sht.tick(ready);
    assert!(sht.measurement_ready());

    // No new request: further ticks stay off the bus.
    let ops = transport.op_count();
    clock.set_ms(ready + 5000);
    sht.tick(ready + 5000);
    assert_eq!(transport.op_count(), ops);
}
