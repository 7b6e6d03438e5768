//! This is a platform-agnostic Rust driver for the Sensirion SHT30, SHT31 and
//! SHT35 digital humidity and temperature sensors, built for firmware that
//! cannot afford to block: measurements are requested, then collected by a
//! cooperative [`Sht3x::tick`] call from the host loop.
//!
//! This driver allows you to:
//! - Trigger and collect single-shot measurements without blocking.
//! - Run periodic (0.5/1/2/4/10 mps) and ART (4 Hz) self-timed acquisition,
//!   with time-gated fetches and a missed-sample estimate.
//! - Classify "no data yet" read NACKs separately from real bus faults on
//!   transports that can prove the difference.
//! - Track device health (READY/DEGRADED/OFFLINE) from consecutive
//!   transaction outcomes.
//! - Recover communications through an escalating reset ladder (bus reset,
//!   soft reset, hard reset, opt-in general call reset).
//! - Optionally restore RAM-cached settings (mode, repeatability, rate,
//!   clock stretching, heater, alert limits) after a reset.
//! - Enable/disable the heater and read it back from the status register.
//! - Read, parse and clear the status register.
//! - Read the serial number.
//! - Read and write alert limits, raw or in physical units.
//!
//! This driver does not:
//! - Configure pins, bus clocks or other board-level I²C state; the host
//!   owns the bus and serializes access to it.
//! - Retry or recover on its own: the host decides when to call
//!   [`Sht3x::recover`].
//! - Use the heap, background threads or interrupt context.
//!
//! ## Features
//!
//! - `defmt`: Enables logging using the `defmt` framework.
//! - `log`: Enables logging using the `log` framework.
//!
//! ## Supported devices: SHT30, SHT31, SHT35
//!
//! The SHT3x is Sensirion's third-generation capacitive humidity and
//! temperature sensor family. The devices share one command set and differ
//! in accuracy grade: ±2 %RH / ±0.2 °C typical for the SHT30 up to
//! ±1.5 %RH / ±0.1 °C for the SHT35. Two I²C addresses are pin-selectable
//! (0x44/0x45), conversions complete in 4–15.5 ms depending on
//! repeatability, and an alert output with programmable limits plus an
//! on-die heater for diagnostics round out the feature set.
//!
//! Datasheet: [SHT3x-DIS](https://sensirion.com/media/documents/213E6A3B/63A5A569/Datasheet_SHT3x_DIS.pdf)
//!
//! To use this driver, implement [`Transport`] over your I²C stack (or wrap
//! an [`embedded_hal::i2c::I2c`] bus with [`hal::HalTransport`]), implement
//! [`Clock`] over your tick source, and drive the state machine from your
//! main loop.
//!
//! ## Example
//!
//! ```
//! use sht3x::{codec, Clock, Config, Sht3x, Transport, TransportError};
//!
//! // Stand-in bus: acknowledges everything and answers reads with zeroed,
//! // CRC-correct words. A real host wires this to its I²C peripheral.
//! struct DemoBus;
//! impl Transport for DemoBus {
//!     fn write(&mut self, _addr: u8, _data: &[u8], _timeout_ms: u32) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//!     fn write_read(
//!         &mut self,
//!         _addr: u8,
//!         _tx: &[u8],
//!         rx: &mut [u8],
//!         _timeout_ms: u32,
//!     ) -> Result<(), TransportError> {
//!         for word in rx.chunks_mut(3) {
//!             if word.len() == 3 {
//!                 word[0] = 0;
//!                 word[1] = 0;
//!                 word[2] = codec::crc8(&[0, 0]);
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! // Stand-in tick source; a real host reads its timer here.
//! struct DemoClock(u32);
//! impl Clock for DemoClock {
//!     fn millis(&mut self) -> u32 {
//!         self.0 += 100;
//!         self.0 / 1000
//!     }
//!     fn micros(&mut self) -> u32 {
//!         self.0 += 100;
//!         self.0
//!     }
//! }
//!
//! let mut sht = Sht3x::new(DemoBus, DemoClock(0));
//! sht.begin(&Config::default()).unwrap();
//!
//! let _ = sht.request_measurement().unwrap();
//! sht.tick(1_000); // past the conversion time
//! assert!(sht.measurement_ready());
//!
//! let m = sht.get_measurement().unwrap();
//! assert!((m.temperature_c - -45.0).abs() < 0.01);
//! assert!(m.humidity_pct.abs() < 0.01);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![no_std]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features \"defmt\" and \"log\" are mutually exclusive and cannot be enabled together");

#[cfg(test)]
extern crate std;

mod clock;
pub mod codec;
mod device_impl;
mod fmt;
pub mod hal;
mod hw_def;
mod measure;
mod recovery;
mod transport;
mod types;

pub use crate::clock::{time_elapsed, Clock};
pub use crate::transport::{Capabilities, Transport, TransportError};
pub use crate::{hw_def::*, types::*};
