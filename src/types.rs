//! Public types: the driver itself, its configuration, errors and the data
//! structures the measurement and diagnostic APIs exchange.

use core::fmt;

use crate::hw_def::{
    AlertLimitKind, ClockStretching, I2cAddress, Mode, PeriodicRate, Repeatability,
    STATUS_ALERT_PENDING, STATUS_COMMAND_ERROR, STATUS_HEATER_ON, STATUS_RESET_DETECTED,
    STATUS_RH_ALERT, STATUS_T_ALERT, STATUS_WRITE_CRC_ERROR,
};
use crate::transport::Capabilities;

#[cfg(feature = "defmt")]
use defmt::Format;

/// SHT3x device driver.
///
/// Owns the transport, the clock and all driver state. Create with
/// [`Sht3x::new`], then call [`Sht3x::begin`] before anything else and drive
/// pending work with [`Sht3x::tick`] from the host loop.
#[derive(Debug)]
pub struct Sht3x<T, C> {
    pub(crate) transport: T,
    pub(crate) clock: C,
    pub(crate) config: Config,
    pub(crate) initialized: bool,
    pub(crate) driver_state: DriverState,

    // Health tracking
    pub(crate) last_ok_ms: u32,
    pub(crate) last_error_ms: u32,
    pub(crate) last_bus_activity_ms: u32,
    pub(crate) last_error: Option<Error>,
    pub(crate) consecutive_failures: u8,
    pub(crate) total_failures: u32,
    pub(crate) total_success: u32,

    // Command spacing
    pub(crate) last_command_us: u32,

    // Measurement state machine
    pub(crate) measurement_requested: bool,
    pub(crate) measurement_ready: bool,
    pub(crate) measurement_ready_ms: u32,
    pub(crate) periodic_start_ms: u32,
    pub(crate) last_fetch_ms: u32,
    pub(crate) period_ms: u32,
    pub(crate) sample_timestamp_ms: u32,
    pub(crate) missed_samples: u32,
    pub(crate) not_ready_start_ms: u32,
    pub(crate) not_ready_count: u32,
    pub(crate) last_recover_ms: u32,

    pub(crate) cached_settings: CachedSettings,
    pub(crate) has_cached_settings: bool,

    pub(crate) raw_sample: RawSample,
    pub(crate) comp_sample: CompensatedSample,
    pub(crate) mode: Mode,
    pub(crate) periodic_active: bool,
}

/// Driver health, derived from consecutive tracked-transaction outcomes.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// `begin` not yet called, or `end` called.
    Uninit,
    /// Operational; no outstanding failures.
    Ready,
    /// At least one failure since the last success, below the offline
    /// threshold.
    Degraded,
    /// Consecutive failures reached the offline threshold.
    Offline,
}

/// Error classification for every fallible operation.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// `begin` has not completed successfully.
    NotInitialized,
    /// A configuration value is unusable.
    InvalidConfig,
    /// A parameter or internal buffer shape is unusable.
    InvalidParam,
    /// The device did not respond on the bus during `begin` or `probe`.
    DeviceNotFound,
    /// Unclassified I²C failure.
    I2c,
    /// Address byte not acknowledged.
    I2cNackAddr,
    /// Data byte not acknowledged.
    I2cNackData,
    /// Read header not acknowledged.
    I2cNackRead,
    /// The transport timed out.
    I2cTimeout,
    /// Bus-level fault.
    I2cBus,
    /// A bounded wait expired (includes a stalled millisecond clock).
    Timeout,
    /// A received word failed its checksum.
    CrcMismatch,
    /// The sensor flagged the last command as not processed.
    CommandFailed,
    /// The sensor flagged a write checksum error.
    WriteCrcError,
    /// No sample available yet.
    MeasurementNotReady,
    /// The driver or device is busy; retry later.
    Busy,
    /// The operation needs a hook this configuration does not provide.
    Unsupported,
}

/// Structured failure: classification, transport detail and a static
/// description.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    detail: i32,
    msg: &'static str,
}

impl Error {
    pub(crate) const fn new(kind: ErrorKind, msg: &'static str) -> Self {
        Error { kind, detail: 0, msg }
    }

    pub(crate) const fn with_detail(kind: ErrorKind, msg: &'static str, detail: i32) -> Self {
        Error { kind, detail, msg }
    }

    /// Error classification.
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Implementation-specific detail (e.g. a transport error code).
    pub const fn detail(&self) -> i32 {
        self.detail
    }

    /// Static description of the failure.
    pub const fn message(&self) -> &'static str {
        self.msg
    }

    /// Whether this is one of the six I²C transaction failures.
    pub const fn is_i2c_failure(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::I2c
                | ErrorKind::I2cNackAddr
                | ErrorKind::I2cNackData
                | ErrorKind::I2cNackRead
                | ErrorKind::I2cTimeout
                | ErrorKind::I2cBus
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}", self.msg, self.kind)?;
        if self.detail != 0 {
            write!(f, ", detail {}", self.detail)?;
        }
        write!(f, ")")
    }
}

/// Outcome of an accepted [`Sht3x::request_measurement`] call.
///
/// Either way the sample is not available yet: keep calling [`Sht3x::tick`]
/// until [`Sht3x::measurement_ready`] reports true.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum MeasurementStart {
    /// A single-shot conversion was started on the device.
    Triggered,
    /// A fetch of the self-timed stream was scheduled.
    Scheduled,
}

/// Converted measurement in engineering units.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Measurement {
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
    /// Relative humidity in percent.
    pub humidity_pct: f32,
}

/// Unconverted sample words as read from the device.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSample {
    /// Raw 16-bit temperature.
    pub raw_temperature: u16,
    /// Raw 16-bit humidity.
    pub raw_humidity: u16,
}

/// Fixed-point converted sample; no floating point involved.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompensatedSample {
    /// Temperature in centi-degrees Celsius (2534 = 25.34 °C).
    pub temp_c_x100: i32,
    /// Relative humidity in centi-percent (4234 = 42.34 %RH).
    pub humidity_pct_x100: u32,
}

/// Parsed status register.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusRegister {
    /// The raw 16-bit register value.
    pub raw: u16,
    /// At least one alert is pending.
    pub alert_pending: bool,
    /// Heater is on.
    pub heater_on: bool,
    /// Relative humidity tracking alert.
    pub rh_alert: bool,
    /// Temperature tracking alert.
    pub t_alert: bool,
    /// Reset detected since the last status clear.
    pub reset_detected: bool,
    /// The last command was not processed.
    pub command_error: bool,
    /// The last write failed its checksum.
    pub write_crc_error: bool,
}

impl From<u16> for StatusRegister {
    fn from(raw: u16) -> Self {
        StatusRegister {
            raw,
            alert_pending: raw & STATUS_ALERT_PENDING != 0,
            heater_on: raw & STATUS_HEATER_ON != 0,
            rh_alert: raw & STATUS_RH_ALERT != 0,
            t_alert: raw & STATUS_T_ALERT != 0,
            reset_detected: raw & STATUS_RESET_DETECTED != 0,
            command_error: raw & STATUS_COMMAND_ERROR != 0,
            write_crc_error: raw & STATUS_WRITE_CRC_ERROR != 0,
        }
    }
}

impl fmt::Display for StatusRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusRegister {{ 0x{:04x};", self.raw)?;
        if self.alert_pending {
            write!(f, " alert_pending")?;
        }
        if self.heater_on {
            write!(f, " heater_on")?;
        }
        if self.rh_alert {
            write!(f, " rh_alert")?;
        }
        if self.t_alert {
            write!(f, " t_alert")?;
        }
        if self.reset_detected {
            write!(f, " reset_detected")?;
        }
        if self.command_error {
            write!(f, " command_error")?;
        }
        if self.write_crc_error {
            write!(f, " write_crc_error")?;
        }
        write!(f, " }}")
    }
}

/// Decoded alert limit: the packed word plus its approximate thresholds.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AlertLimit {
    /// Packed 16-bit limit word.
    pub raw: u16,
    /// Approximate temperature threshold in degrees Celsius.
    pub temperature_c: f32,
    /// Approximate humidity threshold in percent.
    pub humidity_pct: f32,
}

/// Point-in-time view of driver settings and measurement state; no I/O.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SettingsSnapshot {
    /// Current operating mode.
    pub mode: Mode,
    /// Current repeatability.
    pub repeatability: Repeatability,
    /// Current periodic rate.
    pub periodic_rate: PeriodicRate,
    /// Current clock stretching setting.
    pub clock_stretching: ClockStretching,
    /// Whether a self-timed stream is running.
    pub periodic_active: bool,
    /// Whether a measurement is requested and not yet complete.
    pub measurement_pending: bool,
    /// Whether a completed sample awaits collection.
    pub measurement_ready: bool,
    /// When the pending measurement may first be read.
    pub measurement_ready_ms: u32,
    /// Timestamp of the last completed sample.
    pub sample_timestamp_ms: u32,
    /// Cumulative missed-sample estimate for the current stream.
    pub missed_samples: u32,
    /// Status register contents, when `status_valid`.
    pub status: StatusRegister,
    /// Whether `status` was actually read from the device.
    pub status_valid: bool,
}

/// RAM-only mirror of device-side configuration, used by
/// [`Sht3x::reset_and_restore`].
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachedSettings {
    /// Cached operating mode.
    pub mode: Mode,
    /// Cached repeatability.
    pub repeatability: Repeatability,
    /// Cached periodic rate.
    pub periodic_rate: PeriodicRate,
    /// Cached clock stretching setting.
    pub clock_stretching: ClockStretching,
    /// Cached heater state.
    pub heater_enabled: bool,
    /// Which alert limit slots hold a value written by the host.
    pub alert_valid: [bool; 4],
    /// Packed alert limit words, indexed like [`CachedSettings::slot`] orders
    /// the [`AlertLimitKind`] variants.
    pub alert_raw: [u16; 4],
}

impl Default for CachedSettings {
    fn default() -> Self {
        CachedSettings {
            mode: Mode::SingleShot,
            repeatability: Repeatability::High,
            periodic_rate: PeriodicRate::Mps1,
            clock_stretching: ClockStretching::Disabled,
            heater_enabled: false,
            alert_valid: [false; 4],
            alert_raw: [0; 4],
        }
    }
}

impl CachedSettings {
    /// Array index backing an alert limit slot.
    pub const fn slot(kind: AlertLimitKind) -> usize {
        match kind {
            AlertLimitKind::HighSet => 0,
            AlertLimitKind::HighClear => 1,
            AlertLimitKind::LowClear => 2,
            AlertLimitKind::LowSet => 3,
        }
    }
}

/// Driver configuration, captured by [`Sht3x::begin`].
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Device address (ADDR pin strap).
    pub address: I2cAddress,
    /// Diagnostic fidelity the transport promises. Leave empty when unsure.
    pub capabilities: Capabilities,

    /// Measurement repeatability.
    pub repeatability: Repeatability,
    /// Clock stretching for single-shot and serial reads.
    pub clock_stretching: ClockStretching,
    /// Rate used when `mode` is periodic.
    pub periodic_rate: PeriodicRate,
    /// Operating mode entered by `begin`.
    pub mode: Mode,
    /// Use the low-VDD conversion time limits.
    pub low_vdd: bool,

    /// Transaction timeout passed to the transport; must be > 0.
    pub i2c_timeout_ms: u32,
    /// Minimum inter-command idle (tIDLE); clamped to at least 1 ms.
    pub command_delay_ms: u16,
    /// How long periodic fetches may report "not ready" before the next NACK
    /// is escalated to a real failure. 0 disables escalation.
    pub not_ready_timeout_ms: u32,
    /// Extra delay after the nominal period before fetching. 0 selects
    /// `max(2 ms, period / 20)`.
    pub periodic_fetch_margin_ms: u32,
    /// Minimum spacing between `recover` attempts.
    pub recover_backoff_ms: u32,

    /// Consecutive failures before the driver reports OFFLINE; clamped to at
    /// least 1.
    pub offline_threshold: u8,

    /// Permit the bus-wide general call reset (address 0x00). Affects every
    /// device on the bus, hence opt-in.
    pub allow_general_call_reset: bool,
    /// Recovery ladder rung: electrical bus reset via the transport hook.
    pub recover_use_bus_reset: bool,
    /// Recovery ladder rung: soft reset command.
    pub recover_use_soft_reset: bool,
    /// Recovery ladder rung: hard reset via the transport hook.
    pub recover_use_hard_reset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: I2cAddress::Low,
            capabilities: Capabilities::NONE,
            repeatability: Repeatability::High,
            clock_stretching: ClockStretching::Disabled,
            periodic_rate: PeriodicRate::Mps1,
            mode: Mode::SingleShot,
            low_vdd: false,
            i2c_timeout_ms: 50,
            command_delay_ms: 1,
            not_ready_timeout_ms: 0,
            periodic_fetch_margin_ms: 0,
            recover_backoff_ms: 100,
            offline_threshold: 5,
            allow_general_call_reset: false,
            recover_use_bus_reset: true,
            recover_use_soft_reset: true,
            recover_use_hard_reset: true,
        }
    }
}
