//! Minimum settle times between serial operations.
//!
//! The datasheet specifies these as counts of the master clock (CLKIN) period.

use fugit::HertzU32;

/// Settle delays in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// After RDATA/RREG, before clocking data out (50 periods).
    pub t6: u32,
    /// After the last clock edge, before releasing chip select (8 periods).
    pub t10: u32,
    /// After a register write, before the next command (4 periods).
    pub t11_short: u32,
    /// After SYNC, before WAKEUP (24 periods).
    pub t11_long: u32,
    /// Clock-pin reset, first high hold (300 to 500 periods).
    pub t12: u32,
    /// Clock-pin reset, low holds (5 periods).
    pub t13: u32,
    /// Clock-pin reset, second high hold (550 to 750 periods).
    pub t14: u32,
    /// Clock-pin reset, final high hold (1050 to 1250 periods).
    pub t15: u32,
}

/// Nominal master clock of the ADS1256 evaluation boards.
pub const NOMINAL_CLOCK: HertzU32 = HertzU32::from_raw(7_680_000);

impl Timing {
    const T6_PERIODS: u32 = 50;
    const T10_PERIODS: u32 = 8;
    const T11_SHORT_PERIODS: u32 = 4;
    const T11_LONG_PERIODS: u32 = 24;
    const T12_PERIODS: u32 = 400;
    const T13_PERIODS: u32 = 5;
    const T14_PERIODS: u32 = 650;
    const T15_PERIODS: u32 = 1150;

    /// Delays for [`NOMINAL_CLOCK`].
    pub const NOMINAL: Timing = Timing {
        t6: 7,
        t10: 2,
        t11_short: 1,
        t11_long: 4,
        t12: 52,
        t13: 1,
        t14: 85,
        t15: 150,
    };

    /// Scale the datasheet period counts to a different master clock.
    pub fn for_clock(clock: HertzU32) -> Self {
        let hz = clock.to_Hz().max(1) as u64;
        let us = |periods: u32| -> u32 {
            let us = (periods as u64 * 1_000_000 + hz - 1) / hz;
            us.clamp(1, u32::MAX as u64) as u32
        };

        Timing {
            t6: us(Self::T6_PERIODS),
            t10: us(Self::T10_PERIODS),
            t11_short: us(Self::T11_SHORT_PERIODS),
            t11_long: us(Self::T11_LONG_PERIODS),
            t12: us(Self::T12_PERIODS),
            t13: us(Self::T13_PERIODS),
            t14: us(Self::T14_PERIODS),
            t15: us(Self::T15_PERIODS),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::NOMINAL
    }
}
