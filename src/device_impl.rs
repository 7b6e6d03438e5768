use crate::clock::{time_elapsed, Clock};
use crate::codec;
use crate::fmt::{trace, warn};
use crate::hw_def::*;
use crate::transport::{Capabilities, Transport, TransportError};
use crate::types::*;

pub(crate) fn map_transport_err(err: TransportError) -> Error {
    match err {
        TransportError::NackAddr => Error::new(ErrorKind::I2cNackAddr, "address not acknowledged"),
        TransportError::NackData => Error::new(ErrorKind::I2cNackData, "data not acknowledged"),
        TransportError::NackRead => Error::new(ErrorKind::I2cNackRead, "read header not acknowledged"),
        TransportError::Timeout => Error::new(ErrorKind::I2cTimeout, "transport timeout"),
        TransportError::Bus => Error::new(ErrorKind::I2cBus, "bus fault"),
        TransportError::InvalidParam => Error::new(ErrorKind::InvalidParam, "transport rejected parameters"),
        TransportError::Unsupported => Error::new(ErrorKind::Unsupported, "transport hook not provided"),
        TransportError::Other(detail) => Error::with_detail(ErrorKind::I2c, "transport failure", detail),
    }
}

impl<T, C> Sht3x<T, C> {
    /// Create a driver instance around a transport and a clock.
    ///
    /// Nothing touches the bus until [`Sht3x::begin`] runs.
    pub fn new(transport: T, clock: C) -> Self {
        Sht3x {
            transport,
            clock,
            config: Config::default(),
            initialized: false,
            driver_state: DriverState::Uninit,
            last_ok_ms: 0,
            last_error_ms: 0,
            last_bus_activity_ms: 0,
            last_error: None,
            consecutive_failures: 0,
            total_failures: 0,
            total_success: 0,
            last_command_us: 0,
            measurement_requested: false,
            measurement_ready: false,
            measurement_ready_ms: 0,
            periodic_start_ms: 0,
            last_fetch_ms: 0,
            period_ms: 0,
            sample_timestamp_ms: 0,
            missed_samples: 0,
            not_ready_start_ms: 0,
            not_ready_count: 0,
            last_recover_ms: 0,
            cached_settings: CachedSettings::default(),
            has_cached_settings: false,
            raw_sample: RawSample::default(),
            comp_sample: CompensatedSample::default(),
            mode: Mode::SingleShot,
            periodic_active: false,
        }
    }

    /// Consume the driver and hand back the transport and clock.
    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }

    /// Current driver state.
    pub fn state(&self) -> DriverState {
        self.driver_state
    }

    /// Whether the driver accepts measurement traffic (READY or DEGRADED).
    pub fn is_online(&self) -> bool {
        matches!(self.driver_state, DriverState::Ready | DriverState::Degraded)
    }

    /// Timestamp of the last successful tracked transaction.
    pub fn last_ok_ms(&self) -> u32 {
        self.last_ok_ms
    }

    /// Timestamp of the last failed tracked transaction.
    pub fn last_error_ms(&self) -> u32 {
        self.last_error_ms
    }

    /// Timestamp of the last bus activity, expected NACKs included.
    pub fn last_bus_activity_ms(&self) -> u32 {
        self.last_bus_activity_ms
    }

    /// Most recent tracked failure, if any.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    /// Failures since the last tracked success.
    pub fn consecutive_failures(&self) -> u8 {
        self.consecutive_failures
    }

    /// Lifetime failure count (saturating).
    pub fn total_failures(&self) -> u32 {
        self.total_failures
    }

    /// Lifetime success count (saturating).
    pub fn total_success(&self) -> u32 {
        self.total_success
    }

    /// Current operating mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Current repeatability.
    pub fn repeatability(&self) -> Repeatability {
        self.config.repeatability
    }

    /// Current clock stretching setting.
    pub fn clock_stretching(&self) -> ClockStretching {
        self.config.clock_stretching
    }

    /// Current periodic rate.
    pub fn periodic_rate(&self) -> PeriodicRate {
        self.config.periodic_rate
    }

    /// RAM-cached device settings used by [`Sht3x::reset_and_restore`].
    pub fn cached_settings(&self) -> CachedSettings {
        self.cached_settings
    }

    /// Whether a cached settings snapshot exists (seeded by `begin`).
    pub fn has_cached_settings(&self) -> bool {
        self.has_cached_settings
    }

    /// Snapshot of settings and measurement state. No bus traffic.
    pub fn settings(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            mode: self.mode,
            repeatability: self.config.repeatability,
            periodic_rate: self.config.periodic_rate,
            clock_stretching: self.config.clock_stretching,
            periodic_active: self.periodic_active,
            measurement_pending: self.measurement_requested && !self.measurement_ready,
            measurement_ready: self.measurement_ready,
            measurement_ready_ms: self.measurement_ready_ms,
            sample_timestamp_ms: self.sample_timestamp_ms,
            missed_samples: self.missed_samples,
            status: StatusRegister::default(),
            status_valid: false,
        }
    }

    fn reset_runtime_state(&mut self) {
        self.initialized = false;
        self.driver_state = DriverState::Uninit;
        self.last_ok_ms = 0;
        self.last_error_ms = 0;
        self.last_bus_activity_ms = 0;
        self.last_error = None;
        self.consecutive_failures = 0;
        self.total_failures = 0;
        self.total_success = 0;
        self.last_command_us = 0;
        self.measurement_requested = false;
        self.measurement_ready = false;
        self.measurement_ready_ms = 0;
        self.periodic_start_ms = 0;
        self.last_fetch_ms = 0;
        self.period_ms = 0;
        self.sample_timestamp_ms = 0;
        self.missed_samples = 0;
        self.not_ready_start_ms = 0;
        self.not_ready_count = 0;
        self.last_recover_ms = 0;
        self.raw_sample = RawSample::default();
        self.comp_sample = CompensatedSample::default();
        self.mode = Mode::SingleShot;
        self.periodic_active = false;
    }
}

impl<T, C> Sht3x<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Initialize the driver: validate `config`, probe the device and enter
    /// the configured mode.
    ///
    /// A rejected configuration leaves the driver UNINIT with health state
    /// untouched. A device that does not answer the probe yields
    /// [`ErrorKind::DeviceNotFound`].
    pub fn begin(&mut self, config: &Config) -> Result<(), Error> {
        self.reset_runtime_state();

        if config.i2c_timeout_ms == 0 {
            return Err(Error::new(ErrorKind::InvalidConfig, "I2C timeout must be > 0"));
        }

        self.config = *config;
        if self.config.offline_threshold == 0 {
            self.config.offline_threshold = 1;
        }
        if self.config.command_delay_ms < MIN_COMMAND_DELAY_MS {
            self.config.command_delay_ms = MIN_COMMAND_DELAY_MS;
        }

        if let Err(err) = self.read_status_raw_internal(true) {
            if err.is_i2c_failure() {
                return Err(Error::with_detail(
                    ErrorKind::DeviceNotFound,
                    "device not responding",
                    err.detail(),
                ));
            }
            return Err(err);
        }

        self.mode = self.config.mode;
        match self.mode {
            Mode::Periodic => {
                self.enter_periodic(self.config.periodic_rate, self.config.repeatability, false)?
            }
            Mode::Art => {
                self.enter_periodic(self.config.periodic_rate, self.config.repeatability, true)?
            }
            Mode::SingleShot => {}
        }

        self.sync_cache_from_config();
        self.initialized = true;
        self.driver_state = DriverState::Ready;
        trace!("sht3x: begin complete, addr {}", self.config.address.as_u8());
        Ok(())
    }

    /// Shut the driver down. The device itself is left as-is.
    pub fn end(&mut self) {
        self.initialized = false;
        self.driver_state = DriverState::Uninit;
    }

    /// Check that the device answers on the bus, without touching health
    /// counters.
    pub fn probe(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        match self.read_status_raw_internal(false) {
            Ok(_) => Ok(()),
            Err(err) if err.is_i2c_failure() => Err(Error::with_detail(
                ErrorKind::DeviceNotFound,
                "device not responding",
                err.detail(),
            )),
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Status, heater, serial number, alert limits
    // =========================================================================

    /// Read the raw status register.
    ///
    /// Fails with BUSY while a periodic stream is running; the sensor does
    /// not service the status command mid-stream.
    pub fn read_status_raw(&mut self) -> Result<u16, Error> {
        self.ensure_initialized()?;
        self.ensure_not_periodic("stop periodic mode before reading status")?;
        self.read_status_raw_internal(true)
    }

    /// Read and parse the status register.
    pub fn read_status(&mut self) -> Result<StatusRegister, Error> {
        self.read_status_raw().map(StatusRegister::from)
    }

    /// Clear the status register flags.
    pub fn clear_status(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_not_periodic("stop periodic mode before clearing status")?;
        self.write_command(Command::ClearStatus, true)
    }

    /// Switch the on-die heater.
    pub fn set_heater(&mut self, enable: bool) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_not_periodic("stop periodic mode before changing heater")?;
        let cmd = if enable { Command::HeaterEnable } else { Command::HeaterDisable };
        self.write_command(cmd, true)?;
        self.cached_settings.heater_enabled = enable;
        Ok(())
    }

    /// Read the heater state from the status register.
    pub fn read_heater_status(&mut self) -> Result<bool, Error> {
        self.read_status().map(|st| st.heater_on)
    }

    /// Snapshot of settings and measurement state, plus a status-register
    /// read when the sensor can service one.
    ///
    /// While a periodic stream is running the status read is skipped and
    /// `status_valid` stays false; that is not an error.
    pub fn read_settings(&mut self) -> Result<SettingsSnapshot, Error> {
        self.ensure_initialized()?;
        let mut out = self.settings();
        match self.read_status() {
            Ok(status) => {
                out.status = status;
                out.status_valid = true;
                Ok(out)
            }
            Err(err) if err.kind() == ErrorKind::Busy => Ok(out),
            Err(err) => Err(err),
        }
    }

    /// Read the 32-bit electronic identification code.
    pub fn read_serial_number(&mut self, stretch: ClockStretching) -> Result<u32, Error> {
        self.ensure_initialized()?;
        self.ensure_not_periodic("stop periodic mode before reading serial")?;

        let cmd = match stretch {
            ClockStretching::Enabled => Command::SerialStretch,
            ClockStretching::Disabled => Command::SerialNoStretch,
        };
        self.write_command(cmd, true)?;

        let mut buf = [0u8; SERIAL_DATA_LEN];
        self.read_after_command(&mut buf, true, false)?;

        let word1 = codec::parse_word(&buf[0..3])
            .ok_or(Error::new(ErrorKind::CrcMismatch, "CRC mismatch (serial word 1)"))?;
        let word2 = codec::parse_word(&buf[3..6])
            .ok_or(Error::new(ErrorKind::CrcMismatch, "CRC mismatch (serial word 2)"))?;
        Ok((word1 as u32) << 16 | word2 as u32)
    }

    /// Read a raw alert limit word.
    pub fn read_alert_limit_raw(&mut self, kind: AlertLimitKind) -> Result<u16, Error> {
        self.ensure_initialized()?;
        self.ensure_not_periodic("stop periodic mode before reading alert limits")?;

        self.write_command(alert_read_command(kind), true)?;
        let mut buf = [0u8; ALERT_DATA_LEN];
        self.read_after_command(&mut buf, true, false)?;
        codec::parse_word(&buf).ok_or(Error::new(ErrorKind::CrcMismatch, "CRC mismatch (alert limit)"))
    }

    /// Read and decode an alert limit.
    pub fn read_alert_limit(&mut self, kind: AlertLimitKind) -> Result<AlertLimit, Error> {
        let raw = self.read_alert_limit_raw(kind)?;
        let (temperature_c, humidity_pct) = codec::decode_alert_limit(raw);
        Ok(AlertLimit { raw, temperature_c, humidity_pct })
    }

    /// Write a raw alert limit word and verify it through the status
    /// register.
    pub fn write_alert_limit_raw(&mut self, kind: AlertLimitKind, value: u16) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_not_periodic("stop periodic mode before writing alert limits")?;
        self.write_alert_limit_internal(kind, value)?;

        let slot = CachedSettings::slot(kind);
        self.cached_settings.alert_raw[slot] = value;
        self.cached_settings.alert_valid[slot] = true;
        Ok(())
    }

    /// Encode physical thresholds and write the alert limit.
    pub fn write_alert_limit(
        &mut self,
        kind: AlertLimitKind,
        temperature_c: f32,
        humidity_pct: f32,
    ) -> Result<(), Error> {
        let packed = codec::encode_alert_limit(temperature_c, humidity_pct);
        self.write_alert_limit_raw(kind, packed)
    }

    /// Disarm the alert output by making the low-set threshold exceed the
    /// high-set threshold.
    pub fn disable_alerts(&mut self) -> Result<(), Error> {
        self.write_alert_limit_raw(AlertLimitKind::HighSet, 0x0000)?;
        self.write_alert_limit_raw(AlertLimitKind::LowSet, 0xFFFF)
    }

    pub(crate) fn write_alert_limit_internal(
        &mut self,
        kind: AlertLimitKind,
        value: u16,
    ) -> Result<(), Error> {
        self.write_command_with_data(alert_write_command(kind), value, true)?;

        let status = self.read_status_raw_internal(true)?;
        if status & STATUS_WRITE_CRC_ERROR != 0 {
            return Err(Error::new(ErrorKind::WriteCrcError, "write checksum error"));
        }
        if status & STATUS_COMMAND_ERROR != 0 {
            return Err(Error::new(ErrorKind::CommandFailed, "command rejected"));
        }
        Ok(())
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Switch operating mode, stopping or starting the periodic stream as
    /// needed.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_no_pending_measurement()?;

        if mode == self.mode {
            return Ok(());
        }
        match mode {
            Mode::SingleShot => self.stop_periodic(),
            Mode::Periodic => self.start_periodic(self.config.periodic_rate, self.config.repeatability),
            Mode::Art => self.start_art(),
        }
    }

    /// Set measurement repeatability.
    ///
    /// Restarts the stream when periodic mode is live, since the setting is
    /// encoded in the start command.
    pub fn set_repeatability(&mut self, rep: Repeatability) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_no_pending_measurement()?;

        self.config.repeatability = rep;
        if self.mode == Mode::Periodic {
            return self.start_periodic(self.config.periodic_rate, rep);
        }
        self.cached_settings.repeatability = rep;
        Ok(())
    }

    /// Set clock stretching for single-shot and serial reads.
    pub fn set_clock_stretching(&mut self, stretch: ClockStretching) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_no_pending_measurement()?;

        self.config.clock_stretching = stretch;
        self.cached_settings.clock_stretching = stretch;
        Ok(())
    }

    /// Set the periodic rate.
    ///
    /// Restarts the stream when periodic mode is live.
    pub fn set_periodic_rate(&mut self, rate: PeriodicRate) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_no_pending_measurement()?;

        self.config.periodic_rate = rate;
        if self.mode == Mode::Periodic {
            return self.start_periodic(rate, self.config.repeatability);
        }
        self.cached_settings.periodic_rate = rate;
        Ok(())
    }

    // =========================================================================
    // Guards
    // =========================================================================

    pub(crate) fn ensure_initialized(&self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::new(ErrorKind::NotInitialized, "begin not called"));
        }
        Ok(())
    }

    pub(crate) fn ensure_not_periodic(&self, msg: &'static str) -> Result<(), Error> {
        if self.periodic_active {
            return Err(Error::new(ErrorKind::Busy, msg));
        }
        Ok(())
    }

    pub(crate) fn ensure_no_pending_measurement(&self) -> Result<(), Error> {
        if self.measurement_requested && !self.measurement_ready {
            return Err(Error::new(ErrorKind::Busy, "measurement in progress"));
        }
        Ok(())
    }

    // =========================================================================
    // Command engine
    // =========================================================================

    pub(crate) fn write_command(&mut self, cmd: Command, tracked: bool) -> Result<(), Error> {
        self.ensure_command_delay()?;

        let buf = cmd.to_be_bytes();
        if tracked {
            self.i2c_write_tracked(&buf)?;
        } else {
            self.i2c_write_raw(&buf)?;
        }
        self.last_command_us = self.clock.micros();
        Ok(())
    }

    pub(crate) fn write_command_with_data(
        &mut self,
        cmd: Command,
        data: u16,
        tracked: bool,
    ) -> Result<(), Error> {
        self.ensure_command_delay()?;

        let mut payload = [0u8; MAX_WRITE_LEN];
        payload[0..2].copy_from_slice(&cmd.to_be_bytes());
        let mut word = [0u8; 3];
        codec::append_word(data, &mut word);
        payload[2..5].copy_from_slice(&word);

        if tracked {
            self.i2c_write_tracked(&payload)?;
        } else {
            self.i2c_write_raw(&payload)?;
        }
        self.last_command_us = self.clock.micros();
        Ok(())
    }

    pub(crate) fn read_after_command(
        &mut self,
        buf: &mut [u8],
        tracked: bool,
        allow_no_data: bool,
    ) -> Result<(), Error> {
        self.ensure_command_delay()?;
        self.read_only(buf, tracked, allow_no_data)
    }

    fn read_only(&mut self, buf: &mut [u8], tracked: bool, allow_no_data: bool) -> Result<(), Error> {
        if tracked {
            self.i2c_read_tracked(buf, allow_no_data)
        } else {
            self.i2c_write_read_raw(&[], buf)
        }
    }

    pub(crate) fn read_status_raw_internal(&mut self, tracked: bool) -> Result<u16, Error> {
        self.write_command(Command::ReadStatus, tracked)?;

        let mut buf = [0u8; STATUS_DATA_LEN];
        self.read_after_command(&mut buf, tracked, false)?;
        codec::parse_word(&buf).ok_or(Error::new(ErrorKind::CrcMismatch, "CRC mismatch (status)"))
    }

    // =========================================================================
    // Timing gate
    // =========================================================================

    pub(crate) fn ensure_command_delay(&mut self) -> Result<(), Error> {
        if self.last_command_us == 0 {
            return Ok(());
        }

        let delay_us = u32::from(self.config.command_delay_ms) * 1000;
        let target = self.last_command_us.wrapping_add(delay_us);
        let start_ms = self.clock.millis();
        let timeout_ms = u32::from(self.config.command_delay_ms) + self.config.i2c_timeout_ms;
        let mut last_ms = start_ms;
        let mut stable_loops: u32 = 0;

        while !time_elapsed(self.clock.micros(), target) {
            let now_ms = self.clock.millis();
            if now_ms.wrapping_sub(start_ms) > timeout_ms {
                return Err(Error::new(ErrorKind::Timeout, "command delay timeout"));
            }
            if now_ms != last_ms {
                last_ms = now_ms;
                stable_loops = 0;
            } else {
                stable_loops += 1;
                if stable_loops >= MAX_SPIN_ITERS {
                    return Err(Error::new(ErrorKind::Timeout, "command delay timeout"));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn wait_ms(&mut self, delay_ms: u32) -> Result<(), Error> {
        if delay_ms == 0 {
            return Ok(());
        }

        let start_ms = self.clock.millis();
        let deadline = start_ms.wrapping_add(delay_ms);
        let timeout_ms = delay_ms + self.config.i2c_timeout_ms;
        let mut last_ms = start_ms;
        let mut stable_loops: u32 = 0;

        loop {
            let now_ms = self.clock.millis();
            if time_elapsed(now_ms, deadline) {
                break;
            }
            if now_ms.wrapping_sub(start_ms) > timeout_ms {
                return Err(Error::new(ErrorKind::Timeout, "wait timeout"));
            }
            if now_ms != last_ms {
                last_ms = now_ms;
                stable_loops = 0;
            } else {
                stable_loops += 1;
                if stable_loops >= MAX_SPIN_ITERS {
                    return Err(Error::new(ErrorKind::Timeout, "wait timeout"));
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Transport wrappers
    // =========================================================================

    fn i2c_write_raw(&mut self, buf: &[u8]) -> Result<(), Error> {
        let addr = self.config.address.as_u8();
        self.i2c_write_raw_addr(addr, buf)
    }

    fn i2c_write_raw_addr(&mut self, addr: u8, buf: &[u8]) -> Result<(), Error> {
        if buf.is_empty() {
            return Err(Error::new(ErrorKind::InvalidParam, "empty write buffer"));
        }
        self.transport
            .write(addr, buf, self.config.i2c_timeout_ms)
            .map_err(map_transport_err)
    }

    fn i2c_write_read_raw(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Error> {
        // Device reads are two-phase; a combined transaction would bypass the
        // idle gate between command and read.
        if !tx.is_empty() && !rx.is_empty() {
            return Err(Error::new(ErrorKind::InvalidParam, "combined write+read not supported"));
        }
        if rx.is_empty() {
            return Err(Error::new(ErrorKind::InvalidParam, "empty read buffer"));
        }
        let addr = self.config.address.as_u8();
        self.transport
            .write_read(addr, tx, rx, self.config.i2c_timeout_ms)
            .map_err(map_transport_err)
    }

    fn i2c_write_tracked(&mut self, buf: &[u8]) -> Result<(), Error> {
        let res = self.i2c_write_raw(buf);
        self.track(res)
    }

    pub(crate) fn i2c_write_raw_addr_tracked(&mut self, addr: u8, buf: &[u8]) -> Result<(), Error> {
        let res = self.i2c_write_raw_addr(addr, buf);
        self.track(res)
    }

    fn i2c_read_tracked(&mut self, rx: &mut [u8], allow_no_data: bool) -> Result<(), Error> {
        let can_report_nack = self.config.capabilities.contains(Capabilities::READ_HEADER_NACK);
        let res = self.i2c_write_read_raw(&[], rx);

        match res {
            Err(err) if err.kind() == ErrorKind::I2cNackRead => {
                if allow_no_data && can_report_nack {
                    // Expected NACK: the device simply has no sample yet.
                    let now = self.clock.millis();
                    self.record_bus_activity(now);
                    return Err(Error::with_detail(
                        ErrorKind::MeasurementNotReady,
                        "no new data",
                        err.detail(),
                    ));
                }
                if !can_report_nack {
                    // The transport cannot prove a read-header NACK; treat it
                    // as a generic bus failure.
                    let remapped =
                        Error::with_detail(ErrorKind::I2c, "unexpected read NACK", err.detail());
                    return self.track(Err(remapped));
                }
                self.track(Err(err))
            }
            other => self.track(other),
        }
    }

    /// Funnel a transaction result through the health tracker.
    ///
    /// Caller bugs (invalid parameters/configuration) pass through without
    /// counting against the device.
    fn track(&mut self, res: Result<(), Error>) -> Result<(), Error> {
        if let Err(err) = &res {
            if matches!(err.kind(), ErrorKind::InvalidParam | ErrorKind::InvalidConfig) {
                return res;
            }
        }
        self.update_health(res)
    }

    // =========================================================================
    // Health tracking
    // =========================================================================

    fn update_health(&mut self, res: Result<(), Error>) -> Result<(), Error> {
        let now = self.clock.millis();
        self.record_bus_activity(now);

        if !self.initialized {
            // During begin: stamp timestamps, leave counters and state alone.
            match &res {
                Ok(()) => self.last_ok_ms = now,
                Err(err) => {
                    self.last_error = Some(*err);
                    self.last_error_ms = now;
                }
            }
            return res;
        }

        match &res {
            Ok(()) => {
                self.last_ok_ms = now;
                self.total_success = self.total_success.saturating_add(1);
                self.consecutive_failures = 0;
                self.driver_state = DriverState::Ready;
            }
            Err(err) => {
                self.last_error = Some(*err);
                self.last_error_ms = now;
                self.total_failures = self.total_failures.saturating_add(1);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);

                if self.consecutive_failures >= self.config.offline_threshold {
                    if self.driver_state != DriverState::Offline {
                        warn!("sht3x: offline after {} consecutive failures", self.consecutive_failures);
                    }
                    self.driver_state = DriverState::Offline;
                } else {
                    self.driver_state = DriverState::Degraded;
                }
            }
        }
        res
    }

    pub(crate) fn record_bus_activity(&mut self, now_ms: u32) {
        self.last_bus_activity_ms = now_ms;
    }

    pub(crate) fn stamp_command_time(&mut self) {
        self.last_command_us = self.clock.micros();
    }
}
