//! Diagnostics and configuration surfaces: status register, heater, serial
//! number and alert limits.

mod common;

use common::{assert_health_invariant, begun, status_bytes, BusOp};
use sht3x::{
    codec, AlertLimitKind, ClockStretching, Config, DriverState, ErrorKind, TransportError,
};

#[test]
fn probe_does_not_touch_health() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    transport.push_read_err(TransportError::Timeout);
    let err = sht.probe().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
    assert_eq!(sht.state(), DriverState::Ready);
    assert_eq!(sht.consecutive_failures(), 0);
    assert_eq!(sht.total_failures(), 0);
    assert_health_invariant(&sht);

    sht.probe().unwrap();
    assert_eq!(sht.total_success(), 0, "probe must stay untracked");
}

#[test]
fn status_register_parses_flags() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    transport.push_read_bytes(&status_bytes(0x2010));
    let status = sht.read_status().unwrap();

    assert!(status.heater_on);
    assert!(status.reset_detected);
    assert!(!status.alert_pending);
    assert_eq!(status.raw, 0x2010);
}

#[test]
fn heater_round_trip() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    sht.set_heater(true).unwrap();
    assert_eq!(transport.writes()[0], vec![0x30, 0x6D]);
    assert!(sht.cached_settings().heater_enabled);

    transport.push_read_bytes(&status_bytes(0x2000));
    assert!(sht.read_heater_status().unwrap());

    sht.set_heater(false).unwrap();
    assert!(transport.writes().contains(&vec![0x30, 0x66]));
    assert!(!sht.cached_settings().heater_enabled);

    assert!(!sht.read_heater_status().unwrap());
}

#[test]
fn serial_number_assembles_both_words() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    let word1 = 0xDEADu16.to_be_bytes();
    let word2 = 0xBEEFu16.to_be_bytes();
    transport.push_read_bytes(&[
        word1[0],
        word1[1],
        codec::crc8(&word1),
        word2[0],
        word2[1],
        codec::crc8(&word2),
    ]);

    let serial = sht.read_serial_number(ClockStretching::Disabled).unwrap();
    assert_eq!(serial, 0xDEAD_BEEF);

    let log = transport.log();
    assert_eq!(log[0], BusOp::Write(vec![0x36, 0x82]));
    assert_eq!(log[1], BusOp::Read(6));
}

#[test]
fn serial_number_stretch_variant_uses_its_command() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    let _ = sht.read_serial_number(ClockStretching::Enabled).unwrap();
    assert_eq!(transport.writes()[0], vec![0x37, 0x80]);
}

#[test]
fn serial_number_rejects_bad_crc() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    transport.push_read_bytes(&[0xDE, 0xAD, 0x00, 0xBE, 0xEF, 0x00]);
    let err = sht.read_serial_number(ClockStretching::Disabled).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CrcMismatch);
}

#[test]
fn alert_limit_write_appends_crc_and_verifies() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    sht.write_alert_limit_raw(AlertLimitKind::HighSet, 0x2222).unwrap();

    let writes = transport.writes();
    let crc = codec::crc8(&[0x22, 0x22]);
    assert_eq!(writes[0], vec![0x61, 0x1D, 0x22, 0x22, crc]);
    assert_eq!(writes[1], vec![0xF3, 0x2D], "write must be status-verified");

    let slot_cached = sht.cached_settings();
    assert!(slot_cached.alert_valid[0]);
    assert_eq!(slot_cached.alert_raw[0], 0x2222);
}

#[test]
fn alert_limit_write_detects_device_side_rejection() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    transport.push_read_bytes(&status_bytes(0x0002));
    let err = sht.write_alert_limit_raw(AlertLimitKind::LowClear, 0x0042).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandFailed);

    transport.push_read_bytes(&status_bytes(0x0001));
    let err = sht.write_alert_limit_raw(AlertLimitKind::LowClear, 0x0042).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteCrcError);

    // Failed writes must not be cached.
    assert!(!sht.cached_settings().alert_valid[2]);
}

#[test]
fn alert_limit_read_decodes_thresholds() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    let packed = codec::encode_alert_limit(60.0, 80.0);
    let bytes = packed.to_be_bytes();
    transport.push_read_bytes(&[bytes[0], bytes[1], codec::crc8(&bytes)]);

    let limit = sht.read_alert_limit(AlertLimitKind::HighSet).unwrap();
    assert_eq!(limit.raw, packed);
    assert!((limit.temperature_c - 60.0).abs() <= 0.6);
    assert!((limit.humidity_pct - 80.0).abs() <= 1.5);

    assert_eq!(transport.writes()[0], vec![0xE1, 0x1F]);
}

#[test]
fn disable_alerts_inverts_the_set_points() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    sht.disable_alerts().unwrap();

    let writes = transport.writes();
    // HIGH_SET := 0x0000 first, then LOW_SET := 0xFFFF.
    assert_eq!(writes[0][..4], [0x61, 0x1D, 0x00, 0x00]);
    assert_eq!(writes[2][..4], [0x61, 0x00, 0xFF, 0xFF]);
}

#[test]
fn read_settings_includes_device_status_when_idle() {
    let (mut sht, transport, _clock) = begun(&Config::default());

    transport.push_read_bytes(&status_bytes(0x8000));
    let snapshot = sht.read_settings().unwrap();

    assert!(snapshot.status_valid);
    assert!(snapshot.status.alert_pending);
    assert!(!snapshot.periodic_active);
    assert!(!snapshot.measurement_pending);
}

#[test]
fn settings_snapshot_reflects_measurement_state() {
    let (mut sht, _transport, clock) = begun(&Config::default());

    let _ = sht.request_measurement().unwrap();
    let snapshot = sht.settings();
    assert!(snapshot.measurement_pending);
    assert!(!snapshot.measurement_ready);

    clock.set_ms(100);
    sht.tick(100);
    let snapshot = sht.settings();
    assert!(!snapshot.measurement_pending);
    assert!(snapshot.measurement_ready);
    assert_eq!(snapshot.sample_timestamp_ms, 100);
}
