//! Non-blocking driver for the Texas Instruments ADS1256, a 24-bit
//! delta-sigma ADC with an 8-input multiplexer.
//!
//! Nothing in the driver waits for calibration or conversion settling. The
//! caller ticks [`Ads1256::update`] from its own loop or timer, and the driver
//! advances whenever the /DRDY line is asserted.
//!
//! While capturing, a fixed table of multiplexer selections is cycled. Each
//! transaction retargets the multiplexer, starts the next conversion and reads
//! back the previous one, so settling of channel *k + 1* overlaps the readout
//! of channel *k*.
//!
//! ```ignore
//! let mut adc = Ads1256::new(
//!     SpiBus::new(spi),
//!     Pins::new(cs, drdy),
//!     ResetMethod::ControlPin(reset),
//!     delay,
//!     clock,
//!     [Mux::single_ended(Input::AIN0), Mux::single_ended(Input::AIN1)],
//! );
//! adc.config_mut().data_rate = DataRate::Sps1000;
//! adc.blocking_init(DEFAULT_INIT_TIMEOUT)?;
//! adc.begin_capture(DEFAULT_TIMEOUT)?;
//!
//! loop {
//!     if let Ok((channel, code)) = adc.poll_sample() {
//!         // ...
//!     }
//! }
//! ```
#![cfg_attr(not(test), no_std)]

// This must go first so the logging macros are visible to the other modules.
mod fmt;

pub mod bus;
pub mod config;
pub mod consts;
mod error;
pub mod timing;

#[cfg(test)]
mod sim;

use core::convert::Infallible;

use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
    spi::{Mode, MODE_1},
};
use fugit::HertzU32;

pub use self::bus::{Bus, Interface, SpiBus};
pub use self::config::{BitOrder, ClockOut, Config, DataRate, Gain, Input, Mux, SensorDetect};
pub use self::consts::{Command, Reg};
pub use self::error::Error;
pub use self::timing::Timing;

use self::consts::{cmd, SETTINGS_REGISTERS};

/// SPI mode the converter expects: data is shifted out on the rising edge and
/// captured on the falling edge, MSB first.
pub const MODE: Mode = MODE_1;

/// Fastest serial clock for the nominal 7.68 MHz master clock (CLKIN / 4).
pub const MAX_SCLK: HertzU32 = HertzU32::from_raw(1_920_000);

/// Millisecond timestamp from a [`Clock`].
pub type Instant = fugit::TimerInstantU32<1_000>;
pub type Duration = fugit::MillisDurationU32;

/// Ready-wait budget used by the `begin_*` operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_ticks(10);
/// Overall budget for [`Ads1256::blocking_init`].
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_ticks(1000);

/// Width of the low pulse on the RESET pin.
const RESET_PULSE_US: u32 = 5;

/// Monotonic millisecond clock used for timeouts.
pub trait Clock {
    fn now(&mut self) -> Instant;
}

/// Placeholder for a line that is not connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl OutputPin for NoPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// How the converter is put back into its power-on state.
#[derive(Debug)]
pub enum ResetMethod<RST> {
    /// Pulse the dedicated /RESET line low.
    ControlPin(RST),
    /// No /RESET line: release the bus and toggle SCLK in the pattern the
    /// converter recognises as a reset while chip select is high.
    ///
    /// The pin is the SCLK line itself, so the [`Bus`] must hand it over in
    /// [`Bus::disable`] and report so through [`Bus::releases_clock`].
    /// [`SpiBus`] does not.
    ClockPin(RST),
    Undefined,
}

/// Lines owned by the driver besides the bus itself.
pub struct Pins<CS, DRDY, SYNC = NoPin> {
    pub cs: CS,
    /// Data ready, asserted low.
    pub drdy: DRDY,
    /// /SYNC, held high.
    pub sync: SYNC,
}

impl<CS, DRDY> Pins<CS, DRDY, NoPin> {
    pub fn new(cs: CS, drdy: DRDY) -> Self {
        Self {
            cs,
            drdy,
            sync: NoPin,
        }
    }
}

impl<CS, DRDY, SYNC> Pins<CS, DRDY, SYNC> {
    pub fn with_sync<S>(self, sync: S) -> Pins<CS, DRDY, S> {
        Pins {
            cs: self.cs,
            drdy: self.drdy,
            sync,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Uninitialized,
    /// Waiting for /DRDY after a reset.
    Resetting,
    /// Waiting for /DRDY after the settings were written (and, with
    /// auto-calibration on, for the calibration to finish).
    WritingSettings,
    Idle,
    Capturing,
    /// Capture was ended; the conversion still in flight is read on the next
    /// /DRDY.
    FinishingCapture,
}

/// Decode a 24-bit big-endian two's complement conversion result.
pub const fn decode_sample(raw: [u8; 3]) -> i32 {
    let sample = (raw[0] as u32) << 16 | (raw[1] as u32) << 8 | raw[2] as u32;
    (if sample & (1 << 23) != 0 {
        sample | 0xFF00_0000
    } else {
        sample
    }) as i32
}

/// ADS1256 driver cycling through `N` multiplexer selections.
pub struct Ads1256<BUS, CS, DRDY, SYNC, RST, DELAY, CLK, const N: usize> {
    iface: Interface<BUS, CS, DELAY>,
    drdy: DRDY,
    sync: SYNC,
    reset: ResetMethod<RST>,
    clock: CLK,

    state: State,
    config: Config,
    settings_out_of_sync: bool,

    muxes: [Mux; N],
    next_mux: usize,
    current_mux: Option<usize>,
    values: [i32; N],
    new_data: Option<usize>,
}

impl<BUS, CS, DRDY, SYNC, RST, DELAY, CLK, const N: usize>
    Ads1256<BUS, CS, DRDY, SYNC, RST, DELAY, CLK, N>
where
    BUS: Bus,
    CS: OutputPin,
    DRDY: InputPin,
    SYNC: OutputPin,
    RST: OutputPin,
    DELAY: DelayUs<u32>,
    CLK: Clock,
{
    const AT_LEAST_ONE_CHANNEL: () = assert!(N > 0, "the channel table must not be empty");

    /// Create a driver in the [`State::Uninitialized`] state. No pin or bus is
    /// touched until [`begin_reset`](Self::begin_reset).
    pub fn new(
        bus: BUS,
        pins: Pins<CS, DRDY, SYNC>,
        reset: ResetMethod<RST>,
        delay: DELAY,
        clock: CLK,
        muxes: [Mux; N],
    ) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::AT_LEAST_ONE_CHANNEL;

        Self {
            iface: Interface::new(bus, pins.cs, delay, Timing::default()),
            drdy: pins.drdy,
            sync: pins.sync,
            reset,
            clock,
            state: State::Uninitialized,
            config: Config::default(),
            settings_out_of_sync: false,
            muxes,
            next_mux: 0,
            current_mux: None,
            values: [0; N],
            new_data: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Changes take effect on the next [`begin_write_settings`](Self::begin_write_settings).
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Advisory flag for the caller's own bookkeeping. The driver never sets
    /// or clears it.
    pub fn settings_out_of_sync(&self) -> bool {
        self.settings_out_of_sync
    }

    pub fn set_settings_out_of_sync(&mut self, out_of_sync: bool) {
        self.settings_out_of_sync = out_of_sync;
    }

    pub fn timing(&self) -> &Timing {
        self.iface.timing()
    }

    /// Use different settle delays, e.g. [`Timing::for_clock`] for a master
    /// clock other than 7.68 MHz.
    pub fn set_timing(&mut self, timing: Timing) {
        self.iface.set_timing(timing);
    }

    pub fn muxes(&self) -> &[Mux; N] {
        &self.muxes
    }

    pub fn muxes_mut(&mut self) -> &mut [Mux; N] {
        &mut self.muxes
    }

    /// Index of the channel whose conversion is started next.
    pub fn next_mux(&self) -> usize {
        self.next_mux
    }

    /// Index of the channel currently converting, if any.
    pub fn current_mux(&self) -> Option<usize> {
        self.current_mux
    }

    /// Latest sign-extended result per channel. A slot only holds real data
    /// once [`new_data`](Self::new_data) has pointed at it.
    pub fn values(&self) -> &[i32; N] {
        &self.values
    }

    /// Channel written most recently and not yet taken.
    ///
    /// This is a single slot, not a queue: a second result arriving before the
    /// first is taken replaces the notification.
    pub fn new_data(&self) -> Option<usize> {
        self.new_data
    }

    pub fn take_new_data(&mut self) -> Option<usize> {
        self.new_data.take()
    }

    /// Whether /DRDY is currently asserted.
    pub fn data_ready(&mut self) -> bool {
        matches!(self.drdy.is_low(), Ok(true))
    }

    /// Write `values` to consecutive registers starting at `first`, outside
    /// of the state machine.
    pub fn write_registers(&mut self, first: Reg, values: &[u8]) -> Result<(), Error<BUS::Error>> {
        Ok(self.iface.write_registers(first, values)?)
    }

    /// Read consecutive registers starting at `first`, outside of the state
    /// machine.
    pub fn read_registers(
        &mut self,
        first: Reg,
        values: &mut [u8],
    ) -> Result<(), Error<BUS::Error>> {
        Ok(self.iface.read_registers(first, values)?)
    }

    /// Send a stand-alone command such as [`Command::SELFCAL`] or
    /// [`Command::STANDBY`], outside of the state machine.
    pub fn send_command(&mut self, command: Command) -> Result<(), Error<BUS::Error>> {
        Ok(self.iface.command(command)?)
    }

    /// Advance the state machine if /DRDY is asserted. Never blocks.
    ///
    /// Only fails if a capture transfer fails on the bus.
    pub fn update(&mut self) -> Result<(), Error<BUS::Error>> {
        match self.state {
            State::Resetting | State::WritingSettings => {
                if self.data_ready() {
                    self.set_state(State::Idle);
                }
            }
            State::Capturing | State::FinishingCapture => {
                if self.data_ready() {
                    self.continue_capture()?;
                }
            }
            State::Uninitialized | State::Idle => {}
        }

        Ok(())
    }

    /// [`update`](Self::update), then report whether the driver is idle.
    pub fn poll_idle(&mut self) -> nb::Result<(), Error<BUS::Error>> {
        self.update()?;

        if self.state == State::Idle {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// [`update`](Self::update), then take the pending result if there is one.
    pub fn poll_sample(&mut self) -> nb::Result<(usize, i32), Error<BUS::Error>> {
        self.update()?;

        match self.new_data.take() {
            Some(channel) => Ok((channel, self.values[channel])),
            None => Err(nb::Error::WouldBlock),
        }
    }

    /// Start a reset. Accepted in every state; a capture in progress is
    /// abandoned.
    ///
    /// The driver stays in [`State::Resetting`] until [`update`](Self::update)
    /// sees /DRDY.
    pub fn begin_reset(&mut self) -> Result<(), Error<BUS::Error>> {
        if let ResetMethod::Undefined = self.reset {
            error!("no reset method configured");
            return Err(Error::ResetMethodNotValid);
        }

        let _ = self.sync.set_high();
        self.iface.deselect();

        let timing = *self.iface.timing();
        match &mut self.reset {
            ResetMethod::ControlPin(reset) => {
                debug!("resetting through the RESET pin");
                let _ = reset.set_low();
                self.iface.delay_us(RESET_PULSE_US);
                let _ = reset.set_high();
            }
            ResetMethod::ClockPin(sclk) => {
                debug!("resetting through SCLK");
                if !self.iface.releases_clock() {
                    warn!("bus does not release SCLK, clock-pin reset may not reach the device");
                }
                self.iface.disable_bus();
                let _ = sclk.set_high();
                self.iface.delay_us(timing.t12);
                let _ = sclk.set_low();
                self.iface.delay_us(timing.t13);
                let _ = sclk.set_high();
                self.iface.delay_us(timing.t14);
                let _ = sclk.set_low();
                self.iface.delay_us(timing.t13);
                let _ = sclk.set_high();
                self.iface.delay_us(timing.t15);
                let _ = sclk.set_low();
            }
            ResetMethod::Undefined => return Err(Error::ResetMethodNotValid),
        }

        self.iface.enable_bus();
        self.current_mux = None;
        self.set_state(State::Resetting);
        Ok(())
    }

    /// Write STATUS, MUX, ADCON and DRATE from the local configuration.
    ///
    /// Waits up to `timeout` for /DRDY first. Afterwards the driver is in
    /// [`State::WritingSettings`] until /DRDY signals that any
    /// auto-calibration has finished.
    pub fn begin_write_settings(&mut self, timeout: Duration) -> Result<(), Error<BUS::Error>> {
        if self.state != State::Idle {
            return Err(Error::CanOnlyWriteSettingsWhenIdle);
        }
        if !self.wait_ready(timeout) {
            warn!("not ready to write settings");
            return Err(Error::NotReadyToWriteSettings);
        }

        let regs = self.config.registers(self.scheduled_mux());
        self.iface.write_registers(Reg::STATUS, &regs)?;

        self.set_state(State::WritingSettings);
        Ok(())
    }

    /// Read back STATUS, MUX, ADCON and DRATE.
    ///
    /// With `update_local` the hardware values replace the local
    /// configuration and the first channel table entry. Otherwise they are
    /// compared against the local configuration, failing with
    /// [`Error::SettingsOutOfSync`] on any difference.
    pub fn read_settings(
        &mut self,
        update_local: bool,
        timeout: Duration,
    ) -> Result<(), Error<BUS::Error>> {
        if self.state != State::Idle {
            return Err(Error::CanOnlyReadSettingsWhenIdle);
        }
        if !self.wait_ready(timeout) {
            warn!("not ready to read settings");
            return Err(Error::NotReadyToReadSettings);
        }

        let mut regs = [0; SETTINGS_REGISTERS];
        self.iface.read_registers(Reg::STATUS, &mut regs)?;

        if update_local {
            if !self.config.adopt(&regs) {
                warn!("undefined data rate register value {}", regs[3]);
            }
            self.muxes[0] = Mux::from_bits(regs[1]);
        } else if let Some(reg) = self.config.mismatch(self.scheduled_mux(), &regs) {
            warn!("{:?} does not match the local settings", reg);
            return Err(Error::SettingsOutOfSync);
        }

        Ok(())
    }

    /// Reset, write the settings and adopt what the device reports, all
    /// within `timeout`.
    pub fn blocking_init(&mut self, timeout: Duration) -> Result<(), Error<BUS::Error>> {
        let start = self.clock.now();

        self.begin_reset()?;
        self.wait_idle(start, timeout, Error::TimeoutWhileResetting)?;

        let remaining = self.remaining(start, timeout);
        self.begin_write_settings(remaining)?;
        self.wait_idle(start, timeout, Error::TimeoutWhileWritingSettings)?;

        let remaining = self.remaining(start, timeout);
        self.read_settings(true, remaining)?;

        info!("initialized");
        Ok(())
    }

    /// Start cycling through the channel table.
    ///
    /// Waits up to `timeout` for /DRDY, then starts the conversion of the next
    /// scheduled channel.
    pub fn begin_capture(&mut self, timeout: Duration) -> Result<(), Error<BUS::Error>> {
        if self.state != State::Idle {
            return Err(Error::CanOnlyBeginCaptureWhenIdle);
        }
        if !self.wait_ready(timeout) {
            warn!("not ready to begin capture");
            return Err(Error::NotReadyToBeginCapture);
        }

        self.set_state(State::Capturing);
        self.continue_capture()
    }

    /// One pipelined step: start the next scheduled conversion (unless the
    /// capture is finishing) and read the result of the one in flight.
    ///
    /// [`update`](Self::update) calls this whenever /DRDY is asserted. Outside
    /// of a capture it does nothing.
    pub fn continue_capture(&mut self) -> Result<(), Error<BUS::Error>> {
        let starting = match self.state {
            State::Capturing => true,
            State::FinishingCapture => false,
            _ => return Ok(()),
        };

        let this_mux = self.current_mux;
        let next_mux = self.next_mux;
        let mux = self.muxes[next_mux];

        let step = self.iface.transaction(|frame| {
            let timing = *frame.timing();

            if starting {
                let [wreg, count] = cmd::wreg(Reg::MUX as u8, 1);
                frame.write(&[wreg, count, mux.bits()])?;
                frame.delay_us(timing.t11_short);

                frame.write(&[Command::SYNC as u8])?;
                frame.delay_us(timing.t11_long);

                frame.write(&[Command::WAKEUP as u8])?;
            }

            if this_mux.is_none() {
                return Ok(None);
            }

            frame.write(&[Command::RDATA as u8])?;
            frame.delay_us(timing.t6);

            let mut raw = [0; 3];
            frame.read(&mut raw)?;
            Ok(Some(decode_sample(raw)))
        });

        // A failed step may already have started a conversion, so the result
        // in flight can no longer be attributed to a channel.
        let sample = match step {
            Ok(sample) => sample,
            Err(e) => {
                warn!("capture step failed, dropping the conversion in flight");
                self.current_mux = None;
                return Err(Error::SpiError(e));
            }
        };

        if starting {
            self.current_mux = Some(next_mux);
            self.next_mux = (next_mux + 1) % N;
        } else {
            self.current_mux = None;
            self.set_state(State::Idle);
        }

        if let Some((channel, value)) = this_mux.zip(sample) {
            trace!("channel {}: {}", channel, value);
            self.values[channel] = value;
            self.new_data = Some(channel);
        }

        Ok(())
    }

    /// Stop after the conversion in flight has been read. Takes effect on the
    /// next /DRDY, not immediately.
    pub fn end_capture(&mut self) -> Result<(), Error<BUS::Error>> {
        if self.state != State::Capturing {
            return Err(Error::CannotEndWhenNotCapturing);
        }

        self.set_state(State::FinishingCapture);
        Ok(())
    }

    /// Release the bus, pins and timing sources.
    #[allow(clippy::type_complexity)]
    pub fn free(self) -> (BUS, Pins<CS, DRDY, SYNC>, ResetMethod<RST>, DELAY, CLK) {
        let (bus, cs, delay) = self.iface.free();
        let pins = Pins {
            cs,
            drdy: self.drdy,
            sync: self.sync,
        };
        (bus, pins, self.reset, delay, self.clock)
    }

    /// The selection written along with the settings: the channel in flight,
    /// or the one scheduled next.
    fn scheduled_mux(&self) -> Mux {
        self.muxes[self.current_mux.unwrap_or(self.next_mux)]
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Busy-wait for /DRDY. Returns `false` once `timeout` has passed.
    fn wait_ready(&mut self, timeout: Duration) -> bool {
        let deadline = self.clock.now() + timeout;
        while !self.data_ready() {
            if self.clock.now() > deadline {
                return false;
            }
        }
        true
    }

    fn elapsed(&mut self, start: Instant) -> Duration {
        self.clock
            .now()
            .checked_duration_since(start)
            .unwrap_or(Duration::from_ticks(0))
    }

    fn remaining(&mut self, start: Instant, timeout: Duration) -> Duration {
        let elapsed = self.elapsed(start);
        if elapsed >= timeout {
            Duration::from_ticks(0)
        } else {
            timeout - elapsed
        }
    }

    fn wait_idle(
        &mut self,
        start: Instant,
        timeout: Duration,
        on_timeout: Error<BUS::Error>,
    ) -> Result<(), Error<BUS::Error>> {
        loop {
            match self.poll_idle() {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {
                    if self.elapsed(start) > timeout {
                        warn!("timed out waiting for {:?}", self.state);
                        return Err(on_timeout);
                    }
                }
            }
        }
    }
}
