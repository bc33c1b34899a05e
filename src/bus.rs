//! Serial bus access and the framed register transfers built on it.

use embedded_hal::{
    blocking::{
        delay::DelayUs,
        spi::{Transfer, Write},
    },
    digital::v2::OutputPin,
};

use crate::consts::{cmd, Command, Reg, IRRELEVANT, REGISTERS};
use crate::error::Error;
use crate::timing::Timing;

/// The serial bus the converter sits on.
///
/// The bracket and enable hooks default to no-ops, which is right for a bus
/// that is permanently configured for this device.
pub trait Bus {
    type Error;

    /// Take (back) ownership of the clock and data lines. Must tolerate being
    /// called while already enabled.
    fn enable(&mut self) {}

    /// Release the clock line so it can be driven as a plain output. Must
    /// tolerate being called while already disabled.
    fn disable(&mut self) {}

    /// Whether [`disable`](Self::disable) really hands the clock line over.
    /// A reset through [`crate::ResetMethod::ClockPin`] needs this.
    fn releases_clock(&self) -> bool {
        false
    }

    /// Claim the bus for a group of transfers.
    fn begin_transaction(&mut self) {}

    fn end_transaction(&mut self) {}

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error>;

    /// Full-duplex transfer, replacing `words` with what was clocked in.
    fn transfer(&mut self, words: &mut [u8]) -> Result<(), Self::Error>;
}

/// [`Bus`] over a blocking `embedded-hal` SPI implementation.
///
/// Any proxy that implements the SPI traits works here, so several converters
/// can share one peripheral through a bus manager such as `shared-bus`.
///
/// The SPI peripheral keeps driving SCLK at all times, so this bus cannot be
/// used with [`crate::ResetMethod::ClockPin`]. Implement [`Bus`] directly with
/// working `enable`/`disable` hooks for that.
pub struct SpiBus<SPI> {
    spi: SPI,
}

impl<SPI> SpiBus<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    pub fn free(self) -> SPI {
        self.spi
    }
}

impl<SPI, E> Bus for SpiBus<SPI>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
{
    type Error = E;

    fn write(&mut self, words: &[u8]) -> Result<(), E> {
        self.spi.write(words)
    }

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), E> {
        self.spi.transfer(words).map(|_| ())
    }
}

/// Bus, chip select and delay source, bundled so every transfer is framed the
/// same way.
pub struct Interface<BUS, CS, DELAY> {
    bus: BUS,
    cs: CS,
    delay: DELAY,
    timing: Timing,
}

/// The open end of a transaction. Chip select is low for its whole lifetime.
pub struct Frame<'a, BUS, DELAY> {
    bus: &'a mut BUS,
    delay: &'a mut DELAY,
    timing: &'a Timing,
}

impl<BUS, DELAY> Frame<'_, BUS, DELAY>
where
    BUS: Bus,
    DELAY: DelayUs<u32>,
{
    pub fn write(&mut self, words: &[u8]) -> Result<(), BUS::Error> {
        self.bus.write(words)
    }

    /// Clock in `buf.len()` bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<(), BUS::Error> {
        buf.fill(IRRELEVANT);
        self.bus.transfer(buf)
    }

    pub fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    pub fn timing(&self) -> &Timing {
        self.timing
    }
}

impl<BUS, CS, DELAY> Interface<BUS, CS, DELAY>
where
    BUS: Bus,
    CS: OutputPin,
    DELAY: DelayUs<u32>,
{
    pub fn new(bus: BUS, cs: CS, delay: DELAY, timing: Timing) -> Self {
        Self {
            bus,
            cs,
            delay,
            timing,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    /// Drive chip select to its idle (high) level.
    pub fn deselect(&mut self) {
        let _ = self.cs.set_high();
    }

    pub fn enable_bus(&mut self) {
        self.bus.enable();
    }

    pub fn disable_bus(&mut self) {
        self.bus.disable();
    }

    /// Run `f` with chip select asserted and the bus claimed.
    ///
    /// Chip select is held for t10 after the last transfer and released even
    /// if `f` fails.
    pub fn transaction<R>(
        &mut self,
        f: impl FnOnce(&mut Frame<'_, BUS, DELAY>) -> Result<R, BUS::Error>,
    ) -> Result<R, BUS::Error> {
        let _ = self.cs.set_low();
        self.bus.begin_transaction();

        let result = f(&mut Frame {
            bus: &mut self.bus,
            delay: &mut self.delay,
            timing: &self.timing,
        });

        self.bus.end_transaction();
        self.delay.delay_us(self.timing.t10);
        let _ = self.cs.set_high();

        result
    }

    pub fn releases_clock(&self) -> bool {
        self.bus.releases_clock()
    }

    /// Write `values` to consecutive registers starting at `first`.
    pub fn write_registers(
        &mut self,
        first: Reg,
        values: &[u8],
    ) -> Result<(), Error<BUS::Error>> {
        check_range(first, values.len())?;
        if values.is_empty() {
            return Ok(());
        }

        Ok(self.transaction(|frame| {
            frame.write(&cmd::wreg(first as u8, values.len() as u8))?;
            frame.write(values)
        })?)
    }

    /// Fill `values` from consecutive registers starting at `first`.
    pub fn read_registers(
        &mut self,
        first: Reg,
        values: &mut [u8],
    ) -> Result<(), Error<BUS::Error>> {
        check_range(first, values.len())?;
        if values.is_empty() {
            return Ok(());
        }

        Ok(self.transaction(|frame| {
            frame.write(&cmd::rreg(first as u8, values.len() as u8))?;
            let t6 = frame.timing().t6;
            frame.delay_us(t6);
            frame.read(values)
        })?)
    }

    /// Send a single command byte in its own transaction.
    pub fn command(&mut self, command: Command) -> Result<(), BUS::Error> {
        self.transaction(|frame| frame.write(&[command as u8]))
    }

    pub fn free(self) -> (BUS, CS, DELAY) {
        (self.bus, self.cs, self.delay)
    }
}

fn check_range<E>(first: Reg, count: usize) -> Result<(), Error<E>> {
    if first as usize + count > REGISTERS {
        return Err(Error::RegisterRangeInvalid);
    }
    Ok(())
}
