//! Communications recovery: the escalating reset ladder, the individual
//! reset surfaces and the cached-settings restore path.
//!
//! Recovery is never automatic. The host decides when to call
//! [`Sht3x::recover`]; the driver only keeps score in the health tracker.

use crate::clock::{time_elapsed, Clock};
use crate::device_impl::map_transport_err;
use crate::fmt::{trace, warn};
use crate::hw_def::*;
use crate::transport::{Transport, TransportError};
use crate::types::*;

impl<T, C> Sht3x<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Walk the reset ladder until the device answers a probe.
    ///
    /// Communications only: on success the driver is READY in single-shot
    /// mode with no stream running, and the cached settings are untouched.
    /// Use [`Sht3x::reset_and_restore`] to also reapply them. Fails with
    /// BUSY while the configured backoff since the previous attempt has not
    /// elapsed.
    pub fn recover(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;

        let now = self.clock.millis();
        if self.config.recover_backoff_ms > 0 {
            let earliest = self.last_recover_ms.wrapping_add(self.config.recover_backoff_ms);
            if !time_elapsed(now, earliest) {
                return Err(Error::new(ErrorKind::Busy, "recovery backoff active"));
            }
        }
        self.last_recover_ms = now;

        self.perform_recovery_ladder()
    }

    /// Run the ladder, then clear the cached settings (and the measurement
    /// configuration) back to library defaults.
    pub fn reset_to_defaults(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.perform_recovery_ladder()?;
        self.set_defaults_to_config_and_cache();
        Ok(())
    }

    /// Run the ladder, then reapply the cached settings in order:
    /// repeatability, clock stretching, periodic rate, heater, valid alert
    /// limits, and finally the cached mode.
    pub fn reset_and_restore(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.perform_recovery_ladder()?;
        self.apply_cached_settings_after_reset()
    }

    /// Soft reset the device (0x30A2) and wait out the settle time.
    ///
    /// Fails with BUSY while a periodic stream is running; the sensor
    /// ignores the command mid-stream.
    pub fn soft_reset(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.ensure_not_periodic("stop periodic mode before reset")?;
        self.soft_reset_internal()
    }

    /// Invoke the transport's electrical bus recovery hook.
    ///
    /// The device itself is not reset; a running stream keeps producing, so
    /// only the fetch bookkeeping is restarted.
    pub fn interface_reset(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;

        self.transport.bus_reset().map_err(map_transport_err)?;

        self.measurement_requested = false;
        self.measurement_ready = false;
        self.measurement_ready_ms = 0;
        self.last_fetch_ms = 0;
        self.sample_timestamp_ms = 0;
        self.missed_samples = 0;
        self.not_ready_start_ms = 0;
        self.not_ready_count = 0;
        if self.periodic_active {
            self.periodic_start_ms = self.clock.millis();
        }
        Ok(())
    }

    /// Issue the bus-wide general call reset (address 0x00, byte 0x06).
    ///
    /// Resets every device on the bus that honors the sequence; disabled
    /// unless [`Config::allow_general_call_reset`] opts in.
    pub fn general_call_reset(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        if !self.config.allow_general_call_reset {
            return Err(Error::new(ErrorKind::InvalidConfig, "general call reset disabled"));
        }
        self.general_call_reset_internal()
    }

    // =========================================================================
    // Ladder internals
    // =========================================================================

    fn perform_recovery_ladder(&mut self) -> Result<(), Error> {
        let mut last = Error::new(ErrorKind::I2c, "recovery failed");

        if self.config.recover_use_bus_reset {
            match self.interface_reset() {
                Ok(()) => match self.probe_tracked() {
                    Ok(()) => {
                        trace!("sht3x: recovered via bus reset");
                        self.set_safe_baseline();
                        return Ok(());
                    }
                    Err(err) => last = err,
                },
                // No hook provided: this rung simply does not exist.
                Err(err) if err.kind() == ErrorKind::Unsupported => {}
                Err(err) => last = err,
            }
        }

        if self.config.recover_use_soft_reset {
            let mut stopped = true;
            if self.periodic_active {
                if let Err(err) = self.stop_periodic_internal() {
                    last = err;
                    stopped = false;
                }
            }
            if stopped {
                match self.soft_reset_internal().and_then(|()| self.probe_tracked()) {
                    Ok(()) => {
                        trace!("sht3x: recovered via soft reset");
                        self.set_safe_baseline();
                        return Ok(());
                    }
                    Err(err) => last = err,
                }
            }
        }

        if self.config.recover_use_hard_reset {
            match self.transport.hard_reset() {
                Ok(()) => {
                    self.wait_ms(RESET_DELAY_MS)?;
                    match self.probe_tracked() {
                        Ok(()) => {
                            trace!("sht3x: recovered via hard reset");
                            self.set_safe_baseline();
                            return Ok(());
                        }
                        Err(err) => last = err,
                    }
                }
                Err(TransportError::Unsupported) => {}
                Err(err) => last = map_transport_err(err),
            }
        }

        if self.config.allow_general_call_reset {
            match self.general_call_reset_internal().and_then(|()| self.probe_tracked()) {
                Ok(()) => {
                    trace!("sht3x: recovered via general call reset");
                    self.set_safe_baseline();
                    return Ok(());
                }
                Err(err) => last = err,
            }
        }

        warn!("sht3x: recovery exhausted all enabled steps");
        Err(last)
    }

    fn probe_tracked(&mut self) -> Result<(), Error> {
        self.read_status_raw_internal(true).map(|_| ())
    }

    fn soft_reset_internal(&mut self) -> Result<(), Error> {
        self.write_command(Command::SoftReset, true)?;
        self.wait_ms(RESET_DELAY_MS)?;

        self.measurement_requested = false;
        self.measurement_ready = false;
        self.mode = Mode::SingleShot;
        self.config.mode = Mode::SingleShot;
        self.periodic_active = false;
        self.periodic_start_ms = 0;
        self.last_fetch_ms = 0;
        self.period_ms = 0;
        self.sample_timestamp_ms = 0;
        self.missed_samples = 0;
        self.not_ready_start_ms = 0;
        self.not_ready_count = 0;
        Ok(())
    }

    fn general_call_reset_internal(&mut self) -> Result<(), Error> {
        self.ensure_command_delay()?;

        let byte = [GENERAL_CALL_RESET_BYTE];
        self.i2c_write_raw_addr_tracked(GENERAL_CALL_ADDR, &byte)?;
        self.stamp_command_time();
        self.wait_ms(RESET_DELAY_MS)?;

        self.measurement_requested = false;
        self.measurement_ready = false;
        self.measurement_ready_ms = 0;
        self.mode = Mode::SingleShot;
        self.config.mode = Mode::SingleShot;
        self.periodic_active = false;
        self.periodic_start_ms = 0;
        self.last_fetch_ms = 0;
        self.period_ms = 0;
        self.sample_timestamp_ms = 0;
        self.missed_samples = 0;
        self.not_ready_start_ms = 0;
        self.not_ready_count = 0;
        Ok(())
    }

    fn set_safe_baseline(&mut self) {
        self.measurement_requested = false;
        self.measurement_ready = false;
        self.measurement_ready_ms = 0;
        self.periodic_active = false;
        self.periodic_start_ms = 0;
        self.last_fetch_ms = 0;
        self.period_ms = 0;
        self.sample_timestamp_ms = 0;
        self.missed_samples = 0;
        self.not_ready_start_ms = 0;
        self.not_ready_count = 0;
        self.mode = Mode::SingleShot;
        self.config.mode = Mode::SingleShot;
    }

    // =========================================================================
    // Settings cache
    // =========================================================================

    pub(crate) fn sync_cache_from_config(&mut self) {
        self.cached_settings = CachedSettings {
            mode: self.config.mode,
            repeatability: self.config.repeatability,
            periodic_rate: self.config.periodic_rate,
            clock_stretching: self.config.clock_stretching,
            heater_enabled: false,
            alert_valid: [false; 4],
            alert_raw: [0; 4],
        };
        self.has_cached_settings = true;
    }

    fn set_defaults_to_config_and_cache(&mut self) {
        self.config.repeatability = Repeatability::High;
        self.config.clock_stretching = ClockStretching::Disabled;
        self.config.periodic_rate = PeriodicRate::Mps1;
        self.config.mode = Mode::SingleShot;
        self.cached_settings = CachedSettings::default();
        self.has_cached_settings = true;
    }

    fn apply_cached_settings_after_reset(&mut self) -> Result<(), Error> {
        let cached = self.cached_settings;

        // Repeatability, stretching and rate live in the driver; the device
        // sees them encoded in the next start command.
        self.config.repeatability = cached.repeatability;
        self.config.clock_stretching = cached.clock_stretching;
        self.config.periodic_rate = cached.periodic_rate;

        if cached.heater_enabled {
            self.write_command(Command::HeaterEnable, true)?;
        }

        for kind in ALERT_LIMIT_KINDS {
            let slot = CachedSettings::slot(kind);
            if cached.alert_valid[slot] {
                self.write_alert_limit_internal(kind, cached.alert_raw[slot])?;
            }
        }

        match cached.mode {
            Mode::Periodic => self.enter_periodic(cached.periodic_rate, cached.repeatability, false),
            Mode::Art => self.enter_periodic(cached.periodic_rate, cached.repeatability, true),
            Mode::SingleShot => Ok(()),
        }
    }
}
