//! Hardware definitions for the SHT3x: I²C addresses, the 16-bit command
//! table, status-register bit masks, wire lengths and datasheet timing.

#[cfg(feature = "defmt")]
use defmt::Format;

/// 7-bit I²C address, selected by the ADDR pin.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum I2cAddress {
    /// ADDR tied to GND: 0x44.
    Low,
    /// ADDR tied to VDD: 0x45.
    High,
}

impl I2cAddress {
    /// The raw 7-bit address.
    pub const fn as_u8(self) -> u8 {
        match self {
            I2cAddress::Low => 0x44,
            I2cAddress::High => 0x45,
        }
    }
}

impl Default for I2cAddress {
    fn default() -> Self {
        I2cAddress::Low
    }
}

/// General call address for the bus-wide reset sequence.
pub const GENERAL_CALL_ADDR: u8 = 0x00;
/// Payload byte of the general call reset.
pub const GENERAL_CALL_RESET_BYTE: u8 = 0x06;

/// Measurement repeatability, trading noise for conversion time and power.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Repeatability {
    /// Lowest repeatability, fastest conversion (~4 ms).
    Low,
    /// Medium repeatability (~6 ms).
    Medium,
    /// Highest repeatability, slowest conversion (~15 ms).
    #[default]
    High,
}

/// Clock stretching mode for single-shot and serial-number commands.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockStretching {
    /// The sensor releases SCL and NACKs reads until data is ready.
    #[default]
    Disabled,
    /// The sensor holds SCL low until the measurement completes.
    Enabled,
}

/// Periodic acquisition rate in measurements per second.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PeriodicRate {
    /// 0.5 measurements per second.
    Mps0_5,
    /// 1 measurement per second.
    #[default]
    Mps1,
    /// 2 measurements per second.
    Mps2,
    /// 4 measurements per second.
    Mps4,
    /// 10 measurements per second.
    Mps10,
}

/// Driver operating mode.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// One conversion per request.
    #[default]
    SingleShot,
    /// Self-timed acquisition at a configurable rate.
    Periodic,
    /// Accelerated response time: self-timed acquisition at a fixed 4 Hz.
    Art,
}

/// Alert limit slot selector.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertLimitKind {
    /// Threshold that raises the alert.
    HighSet,
    /// Threshold that clears a high alert.
    HighClear,
    /// Threshold that clears a low alert.
    LowClear,
    /// Threshold that raises a low alert.
    LowSet,
}

/// All alert limit slots, in the order `reset_and_restore` reapplies them.
pub const ALERT_LIMIT_KINDS: [AlertLimitKind; 4] = [
    AlertLimitKind::HighSet,
    AlertLimitKind::HighClear,
    AlertLimitKind::LowClear,
    AlertLimitKind::LowSet,
];

/// 16-bit commands understood by the sensor, transmitted MSB first.
///
/// The low bits of each constant embed the 3-bit command CRC from the
/// datasheet, so the values are sent verbatim.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    /// Single shot, clock stretching, high repeatability.
    SingleShotStretchHigh = 0x2C06,
    /// Single shot, clock stretching, medium repeatability.
    SingleShotStretchMedium = 0x2C0D,
    /// Single shot, clock stretching, low repeatability.
    SingleShotStretchLow = 0x2C10,
    /// Single shot, no clock stretching, high repeatability.
    SingleShotHigh = 0x2400,
    /// Single shot, no clock stretching, medium repeatability.
    SingleShotMedium = 0x240B,
    /// Single shot, no clock stretching, low repeatability.
    SingleShotLow = 0x2416,
    /// Periodic 0.5 mps, high repeatability.
    Periodic0_5High = 0x2032,
    /// Periodic 0.5 mps, medium repeatability.
    Periodic0_5Medium = 0x2024,
    /// Periodic 0.5 mps, low repeatability.
    Periodic0_5Low = 0x202F,
    /// Periodic 1 mps, high repeatability.
    Periodic1High = 0x2130,
    /// Periodic 1 mps, medium repeatability.
    Periodic1Medium = 0x2126,
    /// Periodic 1 mps, low repeatability.
    Periodic1Low = 0x212D,
    /// Periodic 2 mps, high repeatability.
    Periodic2High = 0x2236,
    /// Periodic 2 mps, medium repeatability.
    Periodic2Medium = 0x2220,
    /// Periodic 2 mps, low repeatability.
    Periodic2Low = 0x222B,
    /// Periodic 4 mps, high repeatability.
    Periodic4High = 0x2334,
    /// Periodic 4 mps, medium repeatability.
    Periodic4Medium = 0x2322,
    /// Periodic 4 mps, low repeatability.
    Periodic4Low = 0x2329,
    /// Periodic 10 mps, high repeatability.
    Periodic10High = 0x2737,
    /// Periodic 10 mps, medium repeatability.
    Periodic10Medium = 0x2721,
    /// Periodic 10 mps, low repeatability.
    Periodic10Low = 0x272A,
    /// Read the most recent periodic sample.
    FetchData = 0xE000,
    /// Start accelerated response time acquisition (4 Hz).
    Art = 0x2B32,
    /// Stop periodic/ART acquisition.
    Break = 0x3093,
    /// Read the status register.
    ReadStatus = 0xF32D,
    /// Clear the status register flags.
    ClearStatus = 0x3041,
    /// Soft reset (reload calibration, return to idle).
    SoftReset = 0x30A2,
    /// Enable the on-die heater.
    HeaterEnable = 0x306D,
    /// Disable the on-die heater.
    HeaterDisable = 0x3066,
    /// Read the serial number with clock stretching.
    SerialStretch = 0x3780,
    /// Read the serial number without clock stretching.
    SerialNoStretch = 0x3682,
    /// Read the high-set alert limit.
    AlertReadHighSet = 0xE11F,
    /// Read the high-clear alert limit.
    AlertReadHighClear = 0xE114,
    /// Read the low-clear alert limit.
    AlertReadLowClear = 0xE109,
    /// Read the low-set alert limit.
    AlertReadLowSet = 0xE102,
    /// Write the high-set alert limit.
    AlertWriteHighSet = 0x611D,
    /// Write the high-clear alert limit.
    AlertWriteHighClear = 0x6116,
    /// Write the low-clear alert limit.
    AlertWriteLowClear = 0x610B,
    /// Write the low-set alert limit.
    AlertWriteLowSet = 0x6100,
}

impl Command {
    /// The raw 16-bit command word.
    pub const fn bits(self) -> u16 {
        self as u16
    }

    /// The command as it appears on the wire, MSB first.
    pub const fn to_be_bytes(self) -> [u8; 2] {
        (self as u16).to_be_bytes()
    }
}

/// Select the single-shot command for a repeatability/stretching pair.
pub const fn single_shot_command(rep: Repeatability, stretch: ClockStretching) -> Command {
    match (stretch, rep) {
        (ClockStretching::Enabled, Repeatability::High) => Command::SingleShotStretchHigh,
        (ClockStretching::Enabled, Repeatability::Medium) => Command::SingleShotStretchMedium,
        (ClockStretching::Enabled, Repeatability::Low) => Command::SingleShotStretchLow,
        (ClockStretching::Disabled, Repeatability::High) => Command::SingleShotHigh,
        (ClockStretching::Disabled, Repeatability::Medium) => Command::SingleShotMedium,
        (ClockStretching::Disabled, Repeatability::Low) => Command::SingleShotLow,
    }
}

/// Select the periodic start command for a repeatability/rate pair.
pub const fn periodic_command(rep: Repeatability, rate: PeriodicRate) -> Command {
    match (rate, rep) {
        (PeriodicRate::Mps0_5, Repeatability::High) => Command::Periodic0_5High,
        (PeriodicRate::Mps0_5, Repeatability::Medium) => Command::Periodic0_5Medium,
        (PeriodicRate::Mps0_5, Repeatability::Low) => Command::Periodic0_5Low,
        (PeriodicRate::Mps1, Repeatability::High) => Command::Periodic1High,
        (PeriodicRate::Mps1, Repeatability::Medium) => Command::Periodic1Medium,
        (PeriodicRate::Mps1, Repeatability::Low) => Command::Periodic1Low,
        (PeriodicRate::Mps2, Repeatability::High) => Command::Periodic2High,
        (PeriodicRate::Mps2, Repeatability::Medium) => Command::Periodic2Medium,
        (PeriodicRate::Mps2, Repeatability::Low) => Command::Periodic2Low,
        (PeriodicRate::Mps4, Repeatability::High) => Command::Periodic4High,
        (PeriodicRate::Mps4, Repeatability::Medium) => Command::Periodic4Medium,
        (PeriodicRate::Mps4, Repeatability::Low) => Command::Periodic4Low,
        (PeriodicRate::Mps10, Repeatability::High) => Command::Periodic10High,
        (PeriodicRate::Mps10, Repeatability::Medium) => Command::Periodic10Medium,
        (PeriodicRate::Mps10, Repeatability::Low) => Command::Periodic10Low,
    }
}

/// Select the read command for an alert limit slot.
pub const fn alert_read_command(kind: AlertLimitKind) -> Command {
    match kind {
        AlertLimitKind::HighSet => Command::AlertReadHighSet,
        AlertLimitKind::HighClear => Command::AlertReadHighClear,
        AlertLimitKind::LowClear => Command::AlertReadLowClear,
        AlertLimitKind::LowSet => Command::AlertReadLowSet,
    }
}

/// Select the write command for an alert limit slot.
pub const fn alert_write_command(kind: AlertLimitKind) -> Command {
    match kind {
        AlertLimitKind::HighSet => Command::AlertWriteHighSet,
        AlertLimitKind::HighClear => Command::AlertWriteHighClear,
        AlertLimitKind::LowClear => Command::AlertWriteLowClear,
        AlertLimitKind::LowSet => Command::AlertWriteLowSet,
    }
}

/// Acquisition period in milliseconds for a periodic rate.
pub const fn period_ms_for_rate(rate: PeriodicRate) -> u32 {
    match rate {
        PeriodicRate::Mps0_5 => 2000,
        PeriodicRate::Mps1 => 1000,
        PeriodicRate::Mps2 => 500,
        PeriodicRate::Mps4 => 250,
        PeriodicRate::Mps10 => 100,
    }
}

/// Maximum conversion time in milliseconds for a repeatability setting.
///
/// The low-VDD column applies below 2.4 V, per the datasheet timing table.
pub const fn base_measurement_ms(rep: Repeatability, low_vdd: bool) -> u32 {
    if low_vdd {
        match rep {
            Repeatability::Low => 5,
            Repeatability::Medium => 7,
            Repeatability::High => 16,
        }
    } else {
        match rep {
            Repeatability::Low => 4,
            Repeatability::Medium => 6,
            Repeatability::High => 15,
        }
    }
}

// Status register bit masks (16-bit word read via `Command::ReadStatus`).

/// At least one alert is pending.
pub const STATUS_ALERT_PENDING: u16 = 0x8000;
/// Heater is on.
pub const STATUS_HEATER_ON: u16 = 0x2000;
/// Relative humidity tracking alert.
pub const STATUS_RH_ALERT: u16 = 0x0800;
/// Temperature tracking alert.
pub const STATUS_T_ALERT: u16 = 0x0400;
/// Reset detected since the last clear.
pub const STATUS_RESET_DETECTED: u16 = 0x0010;
/// The last command was not processed.
pub const STATUS_COMMAND_ERROR: u16 = 0x0002;
/// The last write failed its checksum.
pub const STATUS_WRITE_CRC_ERROR: u16 = 0x0001;

// Wire lengths.

/// Measurement response: temperature word + CRC, humidity word + CRC.
pub const MEASUREMENT_DATA_LEN: usize = 6;
/// Status response: one word + CRC.
pub const STATUS_DATA_LEN: usize = 3;
/// Serial number response: two words, each with CRC.
pub const SERIAL_DATA_LEN: usize = 6;
/// Alert limit response: one word + CRC.
pub const ALERT_DATA_LEN: usize = 3;
/// Largest write: command + data word + CRC.
pub const MAX_WRITE_LEN: usize = 5;

// Timing.

/// Settle time after a soft or hard reset.
pub const RESET_DELAY_MS: u32 = 2;
/// Settle time after a Break command.
pub const BREAK_DELAY_MS: u32 = 1;
/// Minimum inter-command idle (tIDLE).
pub const MIN_COMMAND_DELAY_MS: u16 = 1;
/// Safety margin added to the estimated conversion time.
pub const MEASUREMENT_MARGIN_MS: u32 = 1;
/// Acquisition period in ART mode.
pub const ART_PERIOD_MS: u32 = 250;
/// Consecutive polls without millisecond-clock movement before the bounded
/// waits give up (guards against a stalled timer).
pub const MAX_SPIN_ITERS: u32 = 500_000;
