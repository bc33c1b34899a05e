//! A simulated ADS1256 on the other end of the bus, pins and clock.
//!
//! Conversions are started by WAKEUP and finish the next time /DRDY is read
//! while `ready` is set, which is how the pipelining looks from the host.

use std::{cell::RefCell, collections::HashMap, convert::Infallible, rc::Rc};

use embedded_hal::{
    blocking::{
        delay::DelayUs,
        spi::{Transfer, Write},
    },
    digital::v2::{InputPin, OutputPin},
};

use crate::{Ads1256, Bus, Clock, Instant, Mux, Pins, ResetMethod};

pub const POWER_ON: [u8; 11] = [0x30, 0x01, 0x20, 0xF0, 0xE1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Select,
    Deselect,
    BusEnabled,
    BusDisabled,
    TransactionBegin,
    TransactionEnd,
    Sclk(bool),
    Reset(bool),
    Sync(bool),
    Delay(u32),
}

#[derive(Debug, Clone, Copy)]
enum Parse {
    Command,
    Count { write: bool, addr: usize },
    Write { addr: usize, left: usize },
    Read { addr: usize, left: usize },
    Data { index: usize },
}

pub struct Model {
    pub regs: [u8; 11],
    /// Level of /DRDY: `true` means asserted (low).
    pub ready: bool,
    /// Deassert /DRDY for good once the settings block has been written, like
    /// a calibration that never finishes.
    pub calibration_hangs: bool,
    /// Conversion result per multiplexer byte. Missing entries convert to the
    /// multiplexer byte itself.
    pub samples: HashMap<u8, [u8; 3]>,
    /// Multiplexer byte of every conversion started.
    pub started: Vec<u8>,
    /// Every byte clocked in while selected.
    pub mosi: Vec<u8>,
    /// Stand-alone commands other than WAKEUP, RDATA and RESET.
    pub commands: Vec<u8>,
    pub events: Vec<Event>,
    pub stray_bytes: usize,
    pub resets: usize,
    pub now_ms: u32,
    /// Number of [`SimBus`] writes that succeed before one fails.
    pub writes_before_failure: Option<usize>,
    in_flight: Option<u8>,
    output: [u8; 3],
    selected: bool,
    parse: Parse,
}

pub type Shared = Rc<RefCell<Model>>;

impl Model {
    pub fn new() -> Self {
        Self {
            regs: POWER_ON,
            ready: true,
            calibration_hangs: false,
            samples: HashMap::new(),
            started: Vec::new(),
            mosi: Vec::new(),
            commands: Vec::new(),
            events: Vec::new(),
            stray_bytes: 0,
            resets: 0,
            now_ms: 0,
            writes_before_failure: None,
            in_flight: None,
            output: [0; 3],
            selected: false,
            parse: Parse::Command,
        }
    }

    /// Number of transactions (chip select assertions) seen.
    pub fn selections(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Select).count()
    }

    fn power_on(&mut self) {
        self.regs = POWER_ON;
        self.in_flight = None;
        self.output = [0; 3];
        self.resets += 1;
    }

    fn sample_for(&self, mux: u8) -> [u8; 3] {
        self.samples.get(&mux).copied().unwrap_or([0, 0, mux])
    }

    fn drdy_low(&mut self) -> bool {
        if self.ready {
            if let Some(mux) = self.in_flight.take() {
                self.output = self.sample_for(mux);
            }
        }
        self.ready
    }

    fn exchange(&mut self, mosi: u8) -> u8 {
        if !self.selected {
            self.stray_bytes += 1;
            return 0xFF;
        }
        self.mosi.push(mosi);

        match self.parse {
            Parse::Command => {
                match mosi {
                    0x50..=0x5F => {
                        self.parse = Parse::Count {
                            write: true,
                            addr: (mosi & 0x0F) as usize,
                        }
                    }
                    0x10..=0x1F => {
                        self.parse = Parse::Count {
                            write: false,
                            addr: (mosi & 0x0F) as usize,
                        }
                    }
                    // WAKEUP
                    0x00 => {
                        let mux = self.regs[1];
                        self.in_flight = Some(mux);
                        self.started.push(mux);
                    }
                    // RDATA
                    0x01 => self.parse = Parse::Data { index: 0 },
                    // RESET
                    0xFE => self.power_on(),
                    other => self.commands.push(other),
                }
                0
            }
            Parse::Count { write, addr } => {
                let left = (mosi & 0x0F) as usize + 1;
                self.parse = if write {
                    Parse::Write { addr, left }
                } else {
                    Parse::Read { addr, left }
                };
                0
            }
            Parse::Write { addr, left } => {
                if let Some(reg) = self.regs.get_mut(addr) {
                    *reg = match addr {
                        // ID and /DRDY are read-only.
                        0 => (*reg & !0x0E) | (mosi & 0x0E),
                        2 => mosi & 0x7F,
                        _ => mosi,
                    };
                }
                if left > 1 {
                    self.parse = Parse::Write {
                        addr: addr + 1,
                        left: left - 1,
                    };
                } else {
                    self.parse = Parse::Command;
                    if addr == 3 && self.calibration_hangs {
                        self.ready = false;
                    }
                }
                0
            }
            Parse::Read { addr, left } => {
                let value = self.regs.get(addr).copied().unwrap_or(0);
                self.parse = if left > 1 {
                    Parse::Read {
                        addr: addr + 1,
                        left: left - 1,
                    }
                } else {
                    Parse::Command
                };
                value
            }
            Parse::Data { index } => {
                let value = self.output[index];
                self.parse = if index < 2 {
                    Parse::Data { index: index + 1 }
                } else {
                    Parse::Command
                };
                value
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Cs,
    Drdy,
    Reset,
    Sync,
    Sclk,
}

pub struct SimPin {
    model: Shared,
    role: Role,
}

impl OutputPin for SimPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut m = self.model.borrow_mut();
        match self.role {
            Role::Cs => {
                m.selected = true;
                m.parse = Parse::Command;
                m.events.push(Event::Select);
            }
            Role::Reset => m.events.push(Event::Reset(false)),
            Role::Sync => m.events.push(Event::Sync(false)),
            Role::Sclk => m.events.push(Event::Sclk(false)),
            Role::Drdy => {}
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut m = self.model.borrow_mut();
        match self.role {
            Role::Cs => {
                m.selected = false;
                m.parse = Parse::Command;
                m.events.push(Event::Deselect);
            }
            Role::Reset => {
                m.events.push(Event::Reset(true));
                m.power_on();
            }
            Role::Sync => m.events.push(Event::Sync(true)),
            Role::Sclk => m.events.push(Event::Sclk(true)),
            Role::Drdy => {}
        }
        Ok(())
    }
}

impl InputPin for SimPin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(self.role == Role::Drdy && self.model.borrow_mut().drdy_low())
    }
}

/// Bus with visible bracket and enable hooks.
pub struct SimBus {
    model: Shared,
}

impl Bus for SimBus {
    type Error = ();

    fn releases_clock(&self) -> bool {
        true
    }

    fn enable(&mut self) {
        self.model.borrow_mut().events.push(Event::BusEnabled);
    }

    fn disable(&mut self) {
        self.model.borrow_mut().events.push(Event::BusDisabled);
    }

    fn begin_transaction(&mut self) {
        self.model.borrow_mut().events.push(Event::TransactionBegin);
    }

    fn end_transaction(&mut self) {
        self.model.borrow_mut().events.push(Event::TransactionEnd);
    }

    fn write(&mut self, words: &[u8]) -> Result<(), ()> {
        let mut m = self.model.borrow_mut();
        match m.writes_before_failure {
            Some(0) => {
                m.writes_before_failure = None;
                return Err(());
            }
            Some(n) => m.writes_before_failure = Some(n - 1),
            None => {}
        }
        for &word in words {
            m.exchange(word);
        }
        Ok(())
    }

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), ()> {
        let mut m = self.model.borrow_mut();
        for word in words.iter_mut() {
            *word = m.exchange(*word);
        }
        Ok(())
    }
}

/// Plain `embedded-hal` SPI, for use through [`crate::SpiBus`].
pub struct SimSpi {
    model: Shared,
}

impl Write<u8> for SimSpi {
    type Error = Infallible;

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut m = self.model.borrow_mut();
        for &word in words {
            m.exchange(word);
        }
        Ok(())
    }
}

impl Transfer<u8> for SimSpi {
    type Error = Infallible;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Infallible> {
        let mut m = self.model.borrow_mut();
        for word in words.iter_mut() {
            *word = m.exchange(*word);
        }
        Ok(words)
    }
}

pub struct SimDelay {
    model: Shared,
}

impl DelayUs<u32> for SimDelay {
    fn delay_us(&mut self, us: u32) {
        self.model.borrow_mut().events.push(Event::Delay(us));
    }
}

/// Advances one millisecond every time it is read.
pub struct SimClock {
    model: Shared,
}

impl Clock for SimClock {
    fn now(&mut self) -> Instant {
        let mut m = self.model.borrow_mut();
        m.now_ms += 1;
        Instant::from_ticks(m.now_ms)
    }
}

pub type SimAdc<const N: usize> =
    Ads1256<SimBus, SimPin, SimPin, SimPin, SimPin, SimDelay, SimClock, N>;

#[derive(Debug, Clone, Copy)]
pub enum ResetKind {
    ControlPin,
    ClockPin,
    Undefined,
}

pub fn pin(model: &Shared, role: Role) -> SimPin {
    SimPin {
        model: model.clone(),
        role,
    }
}

pub fn spi(model: &Shared) -> SimSpi {
    SimSpi {
        model: model.clone(),
    }
}

pub fn delay(model: &Shared) -> SimDelay {
    SimDelay {
        model: model.clone(),
    }
}

pub fn clock(model: &Shared) -> SimClock {
    SimClock {
        model: model.clone(),
    }
}

pub fn reset_method(model: &Shared, kind: ResetKind) -> ResetMethod<SimPin> {
    match kind {
        ResetKind::ControlPin => ResetMethod::ControlPin(pin(model, Role::Reset)),
        ResetKind::ClockPin => ResetMethod::ClockPin(pin(model, Role::Sclk)),
        ResetKind::Undefined => ResetMethod::Undefined,
    }
}

/// A driver in [`crate::State::Uninitialized`] wired to a fresh model.
pub fn adc<const N: usize>(kind: ResetKind, muxes: [Mux; N]) -> (SimAdc<N>, Shared) {
    let model = Rc::new(RefCell::new(Model::new()));
    let pins = Pins::new(pin(&model, Role::Cs), pin(&model, Role::Drdy))
        .with_sync(pin(&model, Role::Sync));

    let adc = Ads1256::new(
        SimBus {
            model: model.clone(),
        },
        pins,
        reset_method(&model, kind),
        delay(&model),
        clock(&model),
        muxes,
    );

    (adc, model)
}
