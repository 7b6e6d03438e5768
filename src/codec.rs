//! Wire codec: CRC-8 framing, raw↔physical conversions and alert-limit
//! packing.
//!
//! Everything in here is pure, so host test suites can exercise the math
//! without a bus.

use crc::{Crc, CRC_8_NRSC_5};

// NRSC-5 is the Sensirion checksum: poly 0x31, init 0xFF, no reflection.
const CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// CRC-8 over `data` as the sensor computes it.
pub fn crc8(data: &[u8]) -> u8 {
    CRC.checksum(data)
}

/// Parse one 16-bit word followed by its CRC byte.
///
/// Returns `None` when `buf` is not exactly three bytes or the checksum does
/// not match.
pub fn parse_word(buf: &[u8]) -> Option<u16> {
    let (data, crc) = match buf {
        [hi, lo, crc] => ([*hi, *lo], *crc),
        _ => return None,
    };
    if crc8(&data) != crc {
        return None;
    }
    Some(u16::from_be_bytes(data))
}

/// Append a data word and its CRC to `out`, returning the bytes written.
pub fn append_word(word: u16, out: &mut [u8; 3]) -> &[u8; 3] {
    let bytes = word.to_be_bytes();
    out[0] = bytes[0];
    out[1] = bytes[1];
    out[2] = crc8(&bytes);
    out
}

/// Raw temperature to degrees Celsius.
pub fn convert_temperature_c(raw: u16) -> f32 {
    -45.0 + (175.0 * raw as f32 / 65535.0)
}

/// Raw humidity to percent relative humidity.
pub fn convert_humidity_pct(raw: u16) -> f32 {
    100.0 * raw as f32 / 65535.0
}

/// Raw temperature to centi-degrees Celsius, half-up rounding.
///
/// raw=0 yields −4500, raw=65535 yields 13000.
pub fn convert_temperature_c_x100(raw: u16) -> i32 {
    let numerator = 17_500i32 * raw as i32;
    (numerator + 32_767) / 65_535 - 4_500
}

/// Raw humidity to centi-percent relative humidity, half-up rounding.
///
/// raw=0 yields 0, raw=65535 yields 10000.
pub fn convert_humidity_pct_x100(raw: u16) -> u32 {
    let numerator = 10_000u32 * raw as u32;
    (numerator + 32_767) / 65_535
}

/// Pack an alert threshold pair into the device's 16-bit limit word.
///
/// Inputs are clamped to the sensor range (−45..=130 °C, 0..=100 %RH). The
/// word keeps the 7 most significant raw humidity bits and the 9 most
/// significant raw temperature bits, so the stored thresholds are coarse:
/// about 0.7 %RH and 0.35 °C per step.
pub fn encode_alert_limit(temperature_c: f32, humidity_pct: f32) -> u16 {
    let rh = humidity_pct.clamp(0.0, 100.0);
    let t = temperature_c.clamp(-45.0, 130.0);

    let raw_rh_f = rh * 65535.0 / 100.0;
    let raw_t_f = (t + 45.0) * 65535.0 / 175.0;

    let raw_rh = ((raw_rh_f + 0.5) as u32).min(65_535);
    let raw_t = ((raw_t_f + 0.5) as u32).min(65_535);

    let rh7 = (raw_rh >> 9) as u16;
    let t9 = (raw_t >> 7) as u16;
    (rh7 << 9) | (t9 & 0x01FF)
}

/// Unpack a 16-bit limit word into approximate physical thresholds.
pub fn decode_alert_limit(limit: u16) -> (f32, f32) {
    let rh7 = (limit >> 9) & 0x7F;
    let t9 = limit & 0x01FF;

    let raw_rh = (rh7 as u32) << 9;
    let raw_t = (t9 as u32) << 7;

    let humidity_pct = 100.0 * raw_rh as f32 / 65535.0;
    let temperature_c = -45.0 + 175.0 * raw_t as f32 / 65535.0;
    (temperature_c, humidity_pct)
}
