//! [`Transport`] adapter for any [`embedded_hal`] 1.x blocking I²C bus.
//!
//! The HAL has no per-transaction timeout argument, so the driver's
//! `timeout_ms` request is ignored here; the bus implementation owns its own
//! timeout policy.
//!
//! Whether [`TransportError::NackRead`] is trustworthy depends on the HAL:
//! declare [`Capabilities::READ_HEADER_NACK`](crate::Capabilities) in the
//! driver config only when the bus implementation reports
//! [`NoAcknowledgeSource::Address`] accurately on reads.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, NoAcknowledgeSource};

use crate::transport::{Transport, TransportError};

/// Wraps an [`embedded_hal::i2c::I2c`] bus as a driver [`Transport`].
#[derive(Debug)]
pub struct HalTransport<I2C> {
    i2c: I2C,
}

impl<I2C> HalTransport<I2C> {
    /// Wrap a HAL bus.
    pub fn new(i2c: I2C) -> Self {
        HalTransport { i2c }
    }

    /// Hand the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn map_write_error(kind: ErrorKind) -> TransportError {
    match kind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => TransportError::NackAddr,
        ErrorKind::NoAcknowledge(_) => TransportError::NackData,
        ErrorKind::Bus | ErrorKind::ArbitrationLoss => TransportError::Bus,
        _ => TransportError::Other(0),
    }
}

fn map_read_error(kind: ErrorKind) -> TransportError {
    match kind {
        // On a pure read the address phase is the read header.
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address) => TransportError::NackRead,
        ErrorKind::NoAcknowledge(_) => TransportError::NackData,
        ErrorKind::Bus | ErrorKind::ArbitrationLoss => TransportError::Bus,
        _ => TransportError::Other(0),
    }
}

impl<I2C: I2c> Transport for HalTransport<I2C> {
    fn write(&mut self, addr: u8, data: &[u8], _timeout_ms: u32) -> Result<(), TransportError> {
        self.i2c.write(addr, data).map_err(|e| map_write_error(e.kind()))
    }

    fn write_read(
        &mut self,
        addr: u8,
        tx: &[u8],
        rx: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<(), TransportError> {
        if !tx.is_empty() {
            return Err(TransportError::InvalidParam);
        }
        self.i2c.read(addr, rx).map_err(|e| map_read_error(e.kind()))
    }
}
