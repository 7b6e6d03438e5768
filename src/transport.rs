//! The bus seam: a small trait the host implements over whatever I²C stack
//! the board provides.
//!
//! The driver issues only two transaction shapes: a STOP-terminated write,
//! and a pure read (`write_read` with an empty `tx`). Device reads are never
//! combined write+read transactions; the command engine writes the command,
//! enforces the inter-command idle time itself, then reads. A transport
//! handed both a non-empty `tx` and a non-empty `rx` must refuse with
//! [`TransportError::InvalidParam`].

use core::ops::BitOr;

#[cfg(feature = "defmt")]
use defmt::Format;

/// Transaction-level failures a transport may report.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The device did not acknowledge its address on a write.
    NackAddr,
    /// The device did not acknowledge a data byte.
    NackData,
    /// The device did not acknowledge the address+R header of a read.
    ///
    /// Only meaningful when the host declares
    /// [`Capabilities::READ_HEADER_NACK`]; transports that cannot tell this
    /// apart from other NACKs should report [`TransportError::NackData`] or
    /// [`TransportError::Other`] instead.
    NackRead,
    /// The transaction did not complete within the requested timeout.
    Timeout,
    /// Bus-level fault (arbitration loss, stuck line, protocol violation).
    Bus,
    /// The caller passed arguments this transport cannot service.
    InvalidParam,
    /// The optional hook is not provided by this transport.
    Unsupported,
    /// Any other failure, with an implementation-defined detail code.
    Other(i32),
}

/// Diagnostic fidelity a transport can promise.
///
/// An empty set is always safe: the driver then treats every read NACK as a
/// real bus fault instead of an expected "no data yet".
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No promises.
    pub const NONE: Capabilities = Capabilities(0);
    /// Read-header NACKs are reported distinctly as
    /// [`TransportError::NackRead`].
    pub const READ_HEADER_NACK: Capabilities = Capabilities(1 << 0);
    /// Timeouts are reported distinctly as [`TransportError::Timeout`].
    pub const TIMEOUT: Capabilities = Capabilities(1 << 1);
    /// Bus faults are reported distinctly as [`TransportError::Bus`].
    pub const BUS_ERROR: Capabilities = Capabilities(1 << 2);

    /// Whether every capability in `other` is present in `self`.
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

/// Byte-level access to the I²C bus, plus optional reset hooks.
///
/// `timeout_ms` is a request; a bus manager that owns its own timeout policy
/// may override it. Implementations must not retry internally on NACK — the
/// driver's health tracking depends on seeing each outcome.
pub trait Transport {
    /// Transmit `data` to `addr` and issue a STOP.
    fn write(&mut self, addr: u8, data: &[u8], timeout_ms: u32) -> Result<(), TransportError>;

    /// Optionally transmit `tx` to `addr`, then read `rx.len()` bytes.
    ///
    /// This driver always calls with `tx` empty (a pure read). An
    /// implementation given both buffers non-empty must return
    /// [`TransportError::InvalidParam`].
    fn write_read(
        &mut self,
        addr: u8,
        tx: &[u8],
        rx: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), TransportError>;

    /// Electrical bus recovery (e.g. clocking SCL until SDA releases).
    ///
    /// Semantics are opaque to the driver. The default declines.
    fn bus_reset(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }

    /// Power-cycle or reset-pin pulse for the sensor.
    ///
    /// Semantics are opaque to the driver. The default declines.
    fn hard_reset(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, addr: u8, data: &[u8], timeout_ms: u32) -> Result<(), TransportError> {
        T::write(self, addr, data, timeout_ms)
    }

    fn write_read(
        &mut self,
        addr: u8,
        tx: &[u8],
        rx: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), TransportError> {
        T::write_read(self, addr, tx, rx, timeout_ms)
    }

    fn bus_reset(&mut self) -> Result<(), TransportError> {
        T::bus_reset(self)
    }

    fn hard_reset(&mut self) -> Result<(), TransportError> {
        T::hard_reset(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_set_operations() {
        let caps = Capabilities::READ_HEADER_NACK | Capabilities::TIMEOUT;
        assert!(caps.contains(Capabilities::READ_HEADER_NACK));
        assert!(caps.contains(Capabilities::TIMEOUT));
        assert!(!caps.contains(Capabilities::BUS_ERROR));
        assert!(caps.contains(Capabilities::NONE));
        assert!(!caps.is_empty());
        assert!(Capabilities::default().is_empty());
    }

    #[test]
    fn contains_requires_all_members() {
        let caps = Capabilities::READ_HEADER_NACK;
        assert!(!caps.contains(Capabilities::READ_HEADER_NACK | Capabilities::BUS_ERROR));
    }
}
