//! Measurement lifecycle: non-blocking request/ready/fetch across
//! single-shot, periodic and ART modes.
//!
//! Nothing here blocks on the sensor. `request_measurement` fires or
//! schedules work and returns; [`Sht3x::tick`] performs the bus traffic once
//! the sample can plausibly exist.

use crate::clock::{time_elapsed, Clock};
use crate::codec;
use crate::fmt::{trace, warn};
use crate::hw_def::*;
use crate::transport::{Capabilities, Transport};
use crate::types::*;

impl<T, C> Sht3x<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Request a measurement without blocking.
    ///
    /// Single-shot mode triggers a conversion on the device; periodic and
    /// ART modes schedule the next fetch of the self-timed stream. Fails
    /// with BUSY while a previous request is still pending.
    pub fn request_measurement(&mut self) -> Result<MeasurementStart, Error> {
        self.ensure_initialized()?;
        if self.measurement_requested && !self.measurement_ready {
            return Err(Error::new(ErrorKind::Busy, "measurement in progress"));
        }

        self.measurement_ready = false;

        match self.mode {
            Mode::SingleShot => {
                self.start_single_shot()?;
                self.measurement_requested = true;
                let now = self.clock.millis();
                self.measurement_ready_ms = now.wrapping_add(self.estimate_measurement_time_ms());
                Ok(MeasurementStart::Triggered)
            }
            Mode::Periodic | Mode::Art => {
                if !self.periodic_active {
                    return Err(Error::new(ErrorKind::InvalidParam, "periodic mode not active"));
                }

                let now = self.clock.millis();
                let anchor = if self.last_fetch_ms != 0 {
                    self.last_fetch_ms
                } else {
                    self.periodic_start_ms
                };
                let mut ready_ms = anchor
                    .wrapping_add(self.period_ms)
                    .wrapping_add(self.periodic_fetch_margin_ms());
                if time_elapsed(now, ready_ms) {
                    ready_ms = now;
                }

                self.measurement_requested = true;
                self.measurement_ready_ms = ready_ms;
                Ok(MeasurementStart::Scheduled)
            }
        }
    }

    /// Drive pending work. Call regularly from the host loop with a
    /// monotonic millisecond timestamp.
    ///
    /// Performs bus traffic only when a requested measurement has reached
    /// its due time; calling again with the same `now_ms` does nothing
    /// further.
    pub fn tick(&mut self, now_ms: u32) {
        if !self.initialized || !self.measurement_requested {
            return;
        }
        if !time_elapsed(now_ms, self.measurement_ready_ms) {
            return;
        }

        match self.mode {
            Mode::SingleShot => self.tick_single_shot(now_ms),
            Mode::Periodic | Mode::Art => self.tick_periodic(now_ms),
        }
    }

    fn tick_single_shot(&mut self, now_ms: u32) {
        let mut sample = RawSample::default();
        if self.read_measurement_raw(&mut sample, true, false).is_err() {
            // Health is already updated; stay pending but push the retry one
            // command-delay out, so a repeat tick at the same instant stays
            // off the bus.
            self.measurement_ready_ms =
                now_ms.wrapping_add(u32::from(self.config.command_delay_ms));
            return;
        }

        self.store_sample(sample, now_ms);
        self.measurement_ready = true;
        self.measurement_requested = false;
    }

    fn tick_periodic(&mut self, now_ms: u32) {
        match self.fetch_periodic(now_ms) {
            Ok(()) => {}
            Err(_) => {
                // Not ready or a real failure: stay pending and retry one
                // command-delay later, keeping a repeat tick at the same
                // instant off the bus.
                self.measurement_ready_ms =
                    now_ms.wrapping_add(u32::from(self.config.command_delay_ms));
                return;
            }
        }

        if self.last_fetch_ms != 0 && self.period_ms > 0 {
            let elapsed = now_ms.wrapping_sub(self.last_fetch_ms);
            if elapsed > self.period_ms {
                let missed = elapsed / self.period_ms - 1;
                if missed > 0 {
                    trace!("sht3x: estimated {} missed periodic samples", missed);
                }
                self.missed_samples = self.missed_samples.saturating_add(missed);
            }
        }

        self.measurement_ready = true;
        self.measurement_requested = false;
        self.last_fetch_ms = now_ms;
        self.sample_timestamp_ms = now_ms;
    }

    fn fetch_periodic(&mut self, now_ms: u32) -> Result<(), Error> {
        if !self.periodic_active {
            return Err(Error::new(ErrorKind::InvalidParam, "periodic mode not active"));
        }

        self.write_command(Command::FetchData, true)?;

        let mut allow_no_data = self.config.capabilities.contains(Capabilities::READ_HEADER_NACK);
        if allow_no_data && self.config.not_ready_timeout_ms > 0 && self.not_ready_start_ms != 0 {
            let deadline = self.not_ready_start_ms.wrapping_add(self.config.not_ready_timeout_ms);
            if time_elapsed(now_ms, deadline) {
                // The not-ready budget is spent: let the next NACK register
                // as a real failure.
                warn!("sht3x: periodic fetch not ready for {} ms, escalating", self.config.not_ready_timeout_ms);
                allow_no_data = false;
            }
        }

        let mut sample = RawSample::default();
        match self.read_measurement_raw(&mut sample, true, allow_no_data) {
            Err(err) if err.kind() == ErrorKind::MeasurementNotReady => {
                if self.not_ready_start_ms == 0 {
                    self.not_ready_start_ms = now_ms;
                }
                self.not_ready_count = self.not_ready_count.saturating_add(1);
                return Err(err);
            }
            res => {
                self.not_ready_start_ms = 0;
                self.not_ready_count = 0;
                res?;
            }
        }

        self.store_sample(sample, now_ms);
        Ok(())
    }

    fn read_measurement_raw(
        &mut self,
        out: &mut RawSample,
        tracked: bool,
        allow_no_data: bool,
    ) -> Result<(), Error> {
        let mut buf = [0u8; MEASUREMENT_DATA_LEN];
        self.read_after_command(&mut buf, tracked, allow_no_data)?;

        let raw_temperature = codec::parse_word(&buf[0..3])
            .ok_or(Error::new(ErrorKind::CrcMismatch, "CRC mismatch (temperature)"))?;
        let raw_humidity = codec::parse_word(&buf[3..6])
            .ok_or(Error::new(ErrorKind::CrcMismatch, "CRC mismatch (humidity)"))?;

        out.raw_temperature = raw_temperature;
        out.raw_humidity = raw_humidity;
        Ok(())
    }

    fn store_sample(&mut self, sample: RawSample, now_ms: u32) {
        self.raw_sample = sample;
        self.comp_sample.temp_c_x100 = codec::convert_temperature_c_x100(sample.raw_temperature);
        self.comp_sample.humidity_pct_x100 = codec::convert_humidity_pct_x100(sample.raw_humidity);
        self.sample_timestamp_ms = now_ms;
    }

    fn start_single_shot(&mut self) -> Result<(), Error> {
        if self.periodic_active {
            return Err(Error::new(ErrorKind::Busy, "periodic mode active"));
        }
        let cmd = single_shot_command(self.config.repeatability, self.config.clock_stretching);
        self.write_command(cmd, true)
    }

    pub(crate) fn enter_periodic(
        &mut self,
        rate: PeriodicRate,
        rep: Repeatability,
        art: bool,
    ) -> Result<(), Error> {
        if self.periodic_active {
            self.stop_periodic_internal()?;
        }

        let cmd = if art { Command::Art } else { periodic_command(rep, rate) };
        self.write_command(cmd, true)?;

        self.measurement_requested = false;
        self.measurement_ready = false;
        self.measurement_ready_ms = 0;
        self.periodic_active = true;
        self.not_ready_start_ms = 0;
        self.not_ready_count = 0;
        self.missed_samples = 0;
        self.mode = if art { Mode::Art } else { Mode::Periodic };
        self.config.mode = self.mode;
        if art {
            self.period_ms = ART_PERIOD_MS;
        } else {
            self.config.periodic_rate = rate;
            self.config.repeatability = rep;
            self.period_ms = period_ms_for_rate(rate);
        }
        self.periodic_start_ms = self.clock.millis();
        self.last_fetch_ms = 0;
        Ok(())
    }

    pub(crate) fn stop_periodic_internal(&mut self) -> Result<(), Error> {
        if !self.periodic_active {
            self.mode = Mode::SingleShot;
            self.config.mode = Mode::SingleShot;
            self.clear_periodic_bookkeeping();
            return Ok(());
        }

        self.write_command(Command::Break, true)?;
        self.wait_ms(BREAK_DELAY_MS)?;

        self.measurement_requested = false;
        self.measurement_ready = false;
        self.measurement_ready_ms = 0;
        self.periodic_active = false;
        self.mode = Mode::SingleShot;
        self.config.mode = Mode::SingleShot;
        self.clear_periodic_bookkeeping();
        Ok(())
    }

    fn clear_periodic_bookkeeping(&mut self) {
        self.periodic_start_ms = 0;
        self.last_fetch_ms = 0;
        self.period_ms = 0;
        self.not_ready_start_ms = 0;
        self.not_ready_count = 0;
        self.missed_samples = 0;
    }

    /// Start periodic acquisition at `rate` with `rep`.
    ///
    /// Restarts the stream when one is already running.
    pub fn start_periodic(&mut self, rate: PeriodicRate, rep: Repeatability) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.enter_periodic(rate, rep, false)?;

        self.cached_settings.mode = Mode::Periodic;
        self.cached_settings.periodic_rate = rate;
        self.cached_settings.repeatability = rep;
        Ok(())
    }

    /// Start accelerated response time acquisition (fixed 4 Hz).
    pub fn start_art(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.enter_periodic(self.config.periodic_rate, self.config.repeatability, true)?;

        self.cached_settings.mode = Mode::Art;
        Ok(())
    }

    /// Stop periodic/ART acquisition and return to single-shot mode.
    pub fn stop_periodic(&mut self) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.stop_periodic_internal()?;

        self.cached_settings.mode = Mode::SingleShot;
        Ok(())
    }

    // =========================================================================
    // Sample access
    // =========================================================================

    /// Whether a completed sample awaits collection.
    pub fn measurement_ready(&self) -> bool {
        self.measurement_ready
    }

    /// Collect the measurement in engineering units and clear the ready
    /// flag.
    pub fn get_measurement(&mut self) -> Result<Measurement, Error> {
        self.ensure_initialized()?;
        if !self.measurement_ready {
            return Err(Error::new(ErrorKind::MeasurementNotReady, "measurement not ready"));
        }

        let out = Measurement {
            temperature_c: self.comp_sample.temp_c_x100 as f32 / 100.0,
            humidity_pct: self.comp_sample.humidity_pct_x100 as f32 / 100.0,
        };
        self.measurement_ready = false;
        Ok(out)
    }

    /// The raw sample words; requires a ready measurement.
    pub fn raw_sample(&self) -> Result<RawSample, Error> {
        self.ensure_initialized()?;
        if !self.measurement_ready {
            return Err(Error::new(ErrorKind::MeasurementNotReady, "measurement not ready"));
        }
        Ok(self.raw_sample)
    }

    /// The fixed-point converted sample; requires a ready measurement.
    pub fn compensated_sample(&self) -> Result<CompensatedSample, Error> {
        self.ensure_initialized()?;
        if !self.measurement_ready {
            return Err(Error::new(ErrorKind::MeasurementNotReady, "measurement not ready"));
        }
        Ok(self.comp_sample)
    }

    /// Timestamp of the last completed sample (0 before the first one).
    pub fn sample_timestamp_ms(&self) -> u32 {
        self.sample_timestamp_ms
    }

    /// Age of the last sample relative to `now_ms` (0 before the first one).
    pub fn sample_age_ms(&self, now_ms: u32) -> u32 {
        if self.sample_timestamp_ms == 0 {
            return 0;
        }
        now_ms.wrapping_sub(self.sample_timestamp_ms)
    }

    /// Cumulative estimate of periodic samples the host never fetched.
    pub fn missed_samples_estimate(&self) -> u32 {
        self.missed_samples
    }

    /// Consecutive not-ready periodic fetch attempts in the current window.
    pub fn not_ready_count(&self) -> u32 {
        self.not_ready_count
    }

    // =========================================================================
    // Timing estimates
    // =========================================================================

    /// Worst-case conversion time for the current repeatability, plus a
    /// safety margin.
    pub fn estimate_measurement_time_ms(&self) -> u32 {
        base_measurement_ms(self.config.repeatability, self.config.low_vdd) + MEASUREMENT_MARGIN_MS
    }

    pub(crate) fn periodic_fetch_margin_ms(&self) -> u32 {
        if self.config.periodic_fetch_margin_ms > 0 {
            return self.config.periodic_fetch_margin_ms;
        }
        // Auto margin: a twentieth of the period, but never under 2 ms.
        core::cmp::max(2, self.period_ms / 20)
    }
}
