//! Scripted transport and stepping clock shared by the integration suites.
#![allow(dead_code)] // each suite uses a different subset of the harness

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use sht3x::{codec, Clock, Config, Sht3x, Transport, TransportError};

/// One bus interaction as seen by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusOp {
    /// Write to the configured device address.
    Write(Vec<u8>),
    /// Write to some other address (general call).
    WriteAddr(u8, Vec<u8>),
    /// Pure read of the given length.
    Read(usize),
    BusReset,
    HardReset,
}

#[derive(Default)]
pub struct ScriptState {
    pub write_results: VecDeque<Result<(), TransportError>>,
    pub read_results: VecDeque<Result<Vec<u8>, TransportError>>,
    pub bus_reset_results: VecDeque<Result<(), TransportError>>,
    pub hard_reset_results: VecDeque<Result<(), TransportError>>,
    pub has_bus_reset: bool,
    pub has_hard_reset: bool,
    pub log: Vec<BusOp>,
}

/// Scripted transport: unscripted writes succeed, unscripted reads return
/// zeroed CRC-correct words. Tests push deviations onto the queues and
/// assert on the recorded log.
#[derive(Clone, Default)]
pub struct ScriptTransport(Rc<RefCell<ScriptState>>);

impl ScriptTransport {
    pub fn with_hooks(bus_reset: bool, hard_reset: bool) -> Self {
        let t = ScriptTransport::default();
        t.0.borrow_mut().has_bus_reset = bus_reset;
        t.0.borrow_mut().has_hard_reset = hard_reset;
        t
    }

    pub fn push_write_result(&self, res: Result<(), TransportError>) {
        self.0.borrow_mut().write_results.push_back(res);
    }

    pub fn push_read_err(&self, err: TransportError) {
        self.0.borrow_mut().read_results.push_back(Err(err));
    }

    pub fn push_read_bytes(&self, bytes: &[u8]) {
        self.0.borrow_mut().read_results.push_back(Ok(bytes.to_vec()));
    }

    pub fn push_bus_reset_result(&self, res: Result<(), TransportError>) {
        self.0.borrow_mut().bus_reset_results.push_back(res);
    }

    pub fn log(&self) -> Vec<BusOp> {
        self.0.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    /// The command writes issued to the device address, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0
            .borrow()
            .log
            .iter()
            .filter_map(|op| match op {
                BusOp::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn op_count(&self) -> usize {
        self.0.borrow().log.len()
    }
}

fn fill_zero_words(rx: &mut [u8]) {
    for word in rx.chunks_mut(3) {
        if word.len() == 3 {
            word[0] = 0;
            word[1] = 0;
            word[2] = codec::crc8(&[0, 0]);
        }
    }
}

impl Transport for ScriptTransport {
    fn write(&mut self, addr: u8, data: &[u8], _timeout_ms: u32) -> Result<(), TransportError> {
        let mut st = self.0.borrow_mut();
        if addr == 0x44 || addr == 0x45 {
            st.log.push(BusOp::Write(data.to_vec()));
        } else {
            st.log.push(BusOp::WriteAddr(addr, data.to_vec()));
        }
        st.write_results.pop_front().unwrap_or(Ok(()))
    }

    fn write_read(
        &mut self,
        _addr: u8,
        tx: &[u8],
        rx: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<(), TransportError> {
        assert!(tx.is_empty(), "driver must never issue combined write+read");
        let mut st = self.0.borrow_mut();
        st.log.push(BusOp::Read(rx.len()));
        match st.read_results.pop_front() {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(rx.len());
                rx[..n].copy_from_slice(&bytes[..n]);
                Ok(())
            }
            Some(Err(err)) => Err(err),
            None => {
                fill_zero_words(rx);
                Ok(())
            }
        }
    }

    fn bus_reset(&mut self) -> Result<(), TransportError> {
        let mut st = self.0.borrow_mut();
        if !st.has_bus_reset {
            return Err(TransportError::Unsupported);
        }
        st.log.push(BusOp::BusReset);
        st.bus_reset_results.pop_front().unwrap_or(Ok(()))
    }

    fn hard_reset(&mut self) -> Result<(), TransportError> {
        let mut st = self.0.borrow_mut();
        if !st.has_hard_reset {
            return Err(TransportError::Unsupported);
        }
        st.log.push(BusOp::HardReset);
        st.hard_reset_results.pop_front().unwrap_or(Ok(()))
    }
}

/// Microsecond counter that steps forward on every poll, so the driver's
/// bounded spin waits terminate. Setting the step to 0 freezes time.
#[derive(Clone)]
pub struct TestClock {
    now_us: Rc<Cell<u32>>,
    step_us: Rc<Cell<u32>>,
}

impl TestClock {
    pub fn new(step_us: u32) -> Self {
        TestClock { now_us: Rc::new(Cell::new(0)), step_us: Rc::new(Cell::new(step_us)) }
    }

    pub fn set_ms(&self, ms: u32) {
        self.now_us.set(ms * 1000);
    }

    pub fn set_step_us(&self, step_us: u32) {
        self.step_us.set(step_us);
    }

    pub fn now_ms(&self) -> u32 {
        self.now_us.get() / 1000
    }

    fn step(&self) {
        let next = self.now_us.get().wrapping_add(self.step_us.get());
        self.now_us.set(next);
    }
}

impl Clock for TestClock {
    fn millis(&mut self) -> u32 {
        self.step();
        self.now_us.get() / 1000
    }

    fn micros(&mut self) -> u32 {
        self.step();
        self.now_us.get()
    }
}

/// A six-byte measurement response for the given raw words.
pub fn measurement_bytes(raw_temperature: u16, raw_humidity: u16) -> Vec<u8> {
    let t = raw_temperature.to_be_bytes();
    let h = raw_humidity.to_be_bytes();
    vec![t[0], t[1], codec::crc8(&t), h[0], h[1], codec::crc8(&h)]
}

/// A three-byte status response for the given register value.
pub fn status_bytes(raw: u16) -> Vec<u8> {
    let b = raw.to_be_bytes();
    vec![b[0], b[1], codec::crc8(&b)]
}

/// Transport + clock, not yet initialized.
pub fn parts() -> (ScriptTransport, TestClock) {
    (ScriptTransport::default(), TestClock::new(50))
}

/// An initialized driver over a scripted transport and stepping clock.
pub fn begun(config: &Config) -> (Sht3x<ScriptTransport, TestClock>, ScriptTransport, TestClock) {
    let (transport, clock) = parts();
    let mut sht = Sht3x::new(transport.clone(), clock.clone());
    sht.begin(config).expect("begin should succeed against the default script");
    transport.clear_log();
    (sht, transport, clock)
}

/// An initialized driver over a caller-prepared transport (hooks, scripts).
pub fn begun_with(
    transport: ScriptTransport,
    config: &Config,
) -> (Sht3x<ScriptTransport, TestClock>, TestClock) {
    let clock = TestClock::new(50);
    let mut sht = Sht3x::new(transport.clone(), clock.clone());
    sht.begin(config).expect("begin should succeed against the default script");
    transport.clear_log();
    (sht, clock)
}

/// The health/state invariant that must hold after any call sequence.
pub fn assert_health_invariant(sht: &Sht3x<ScriptTransport, TestClock>) {
    use sht3x::DriverState;
    let zero = sht.consecutive_failures() == 0;
    let calm = matches!(sht.state(), DriverState::Uninit | DriverState::Ready);
    assert_eq!(zero, calm, "consecutive_failures == 0 must match UNINIT/READY");
}
