//! Typed settings and their register encodings.

use crate::consts::*;

/// Order in which the converter shifts out data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

/// Clock output on the D0/CLKOUT pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockOut {
    #[default]
    Off = 0b00,
    FClk = 0b01,
    FClkDiv2 = 0b10,
    FClkDiv4 = 0b11,
}

impl ClockOut {
    pub const fn bits(self) -> u8 {
        (self as u8) << ADCON_CLK_SHIFT
    }

    pub const fn from_bits(adcon: u8) -> Self {
        match (adcon & ADCON_CLK_MASK) >> ADCON_CLK_SHIFT {
            0b00 => Self::Off,
            0b01 => Self::FClk,
            0b10 => Self::FClkDiv2,
            _ => Self::FClkDiv4,
        }
    }
}

/// Sensor detect current sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SensorDetect {
    #[default]
    Off = 0b00,
    /// 0.5 µA
    Ua0_5 = 0b01,
    /// 2 µA
    Ua2 = 0b10,
    /// 10 µA
    Ua10 = 0b11,
}

impl SensorDetect {
    pub const fn bits(self) -> u8 {
        (self as u8) << ADCON_SDCS_SHIFT
    }

    pub const fn from_bits(adcon: u8) -> Self {
        match (adcon & ADCON_SDCS_MASK) >> ADCON_SDCS_SHIFT {
            0b00 => Self::Off,
            0b01 => Self::Ua0_5,
            0b10 => Self::Ua2,
            _ => Self::Ua10,
        }
    }
}

/// Programmable gain amplifier setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Gain {
    #[default]
    X1 = 0b000,
    X2 = 0b001,
    X4 = 0b010,
    X8 = 0b011,
    X16 = 0b100,
    X32 = 0b101,
    X64 = 0b110,
}

impl Gain {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// `0b111` is documented as a second encoding of ×64.
    pub const fn from_bits(adcon: u8) -> Self {
        match adcon & ADCON_PGA_MASK {
            0b000 => Self::X1,
            0b001 => Self::X2,
            0b010 => Self::X4,
            0b011 => Self::X8,
            0b100 => Self::X16,
            0b101 => Self::X32,
            _ => Self::X64,
        }
    }

    pub const fn multiplier(self) -> u8 {
        1 << self as u8
    }
}

/// Output data rate. The discriminant is the DRATE register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DataRate {
    Sps30000 = 0b1111_0000,
    Sps15000 = 0b1110_0000,
    Sps7500 = 0b1101_0000,
    Sps3750 = 0b1100_0000,
    Sps2000 = 0b1011_0000,
    Sps1000 = 0b1010_0001,
    Sps500 = 0b1001_0010,
    Sps100 = 0b1000_0010,
    Sps60 = 0b0111_0010,
    Sps50 = 0b0110_0011,
    Sps30 = 0b0101_0011,
    Sps25 = 0b0100_0011,
    Sps15 = 0b0011_0011,
    Sps10 = 0b0010_0011,
    Sps5 = 0b0001_0011,
    #[default]
    Sps2 = 0b0000_0011,
}

impl DataRate {
    const ALL: [DataRate; 16] = [
        Self::Sps30000,
        Self::Sps15000,
        Self::Sps7500,
        Self::Sps3750,
        Self::Sps2000,
        Self::Sps1000,
        Self::Sps500,
        Self::Sps100,
        Self::Sps60,
        Self::Sps50,
        Self::Sps30,
        Self::Sps25,
        Self::Sps15,
        Self::Sps10,
        Self::Sps5,
        Self::Sps2,
    ];

    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Returns `None` for DRATE values the datasheet does not define.
    pub fn from_bits(drate: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|rate| rate.bits() == drate)
    }

    /// Nominal rate with the 7.68 MHz master clock.
    pub const fn samples_per_second(self) -> u16 {
        match self {
            Self::Sps30000 => 30000,
            Self::Sps15000 => 15000,
            Self::Sps7500 => 7500,
            Self::Sps3750 => 3750,
            Self::Sps2000 => 2000,
            Self::Sps1000 => 1000,
            Self::Sps500 => 500,
            Self::Sps100 => 100,
            Self::Sps60 => 60,
            Self::Sps50 => 50,
            Self::Sps30 => 30,
            Self::Sps25 => 25,
            Self::Sps15 => 15,
            Self::Sps10 => 10,
            Self::Sps5 => 5,
            Self::Sps2 => 2,
        }
    }
}

/// One analog input of the multiplexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Input {
    AIN0 = 0b0000,
    AIN1 = 0b0001,
    AIN2 = 0b0010,
    AIN3 = 0b0011,
    AIN4 = 0b0100,
    AIN5 = 0b0101,
    AIN6 = 0b0110,
    AIN7 = 0b0111,
    AINCOM = 0b1000,
}

impl Input {
    pub const fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0b0000 => Self::AIN0,
            0b0001 => Self::AIN1,
            0b0010 => Self::AIN2,
            0b0011 => Self::AIN3,
            0b0100 => Self::AIN4,
            0b0101 => Self::AIN5,
            0b0110 => Self::AIN6,
            0b0111 => Self::AIN7,
            0b1000 => Self::AINCOM,
            _ => return None,
        })
    }
}

/// Multiplexer register value: positive input in the high nibble, negative
/// input in the low nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Mux(u8);

impl Mux {
    pub const fn differential(positive: Input, negative: Input) -> Self {
        Mux((positive as u8) << MUX_PSEL_SHIFT | negative as u8)
    }

    /// `positive` measured against AINCOM.
    pub const fn single_ended(positive: Input) -> Self {
        Self::differential(positive, Input::AINCOM)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Mux(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn positive(self) -> Option<Input> {
        Input::from_bits(self.0 >> MUX_PSEL_SHIFT)
    }

    pub const fn negative(self) -> Option<Input> {
        Input::from_bits(self.0 & MUX_NSEL_MASK)
    }
}

impl Default for Mux {
    /// Power-on selection, AIN0 against AIN1.
    fn default() -> Self {
        Self::differential(Input::AIN0, Input::AIN1)
    }
}

/// Settings written to STATUS, ADCON and DRATE. The multiplexer comes from the
/// driver's channel table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub bit_order: BitOrder,
    /// Self-calibrate whenever the gain, data rate or buffer setting changes.
    pub auto_calibration: bool,
    /// Analog input buffer.
    pub buffer: bool,
    pub clock_out: ClockOut,
    pub sensor_detect: SensorDetect,
    pub gain: Gain,
    pub data_rate: DataRate,
}

impl Config {
    pub const fn status_register(&self) -> u8 {
        let mut status = 0;
        if let BitOrder::LsbFirst = self.bit_order {
            status |= STATUS_ORDER_LSB;
        }
        if self.auto_calibration {
            status |= STATUS_ACAL;
        }
        if self.buffer {
            status |= STATUS_BUFEN;
        }
        status
    }

    pub const fn control_register(&self) -> u8 {
        self.clock_out.bits() | self.sensor_detect.bits() | self.gain.bits()
    }

    pub const fn data_rate_register(&self) -> u8 {
        self.data_rate.bits()
    }

    /// The STATUS, MUX, ADCON, DRATE block for `mux`.
    pub const fn registers(&self, mux: Mux) -> [u8; SETTINGS_REGISTERS] {
        [
            self.status_register(),
            mux.bits(),
            self.control_register(),
            self.data_rate_register(),
        ]
    }

    /// First settings register whose writable bits differ from what this
    /// configuration would write with `mux` selected.
    pub fn mismatch(&self, mux: Mux, regs: &[u8; SETTINGS_REGISTERS]) -> Option<Reg> {
        if regs[0] & STATUS_WRITE_MASK != self.status_register() {
            Some(Reg::STATUS)
        } else if regs[1] != mux.bits() {
            Some(Reg::MUX)
        } else if regs[2] & ADCON_WRITE_MASK != self.control_register() {
            Some(Reg::ADCON)
        } else if regs[3] != self.data_rate_register() {
            Some(Reg::DRATE)
        } else {
            None
        }
    }

    /// Take over the fields encoded in a STATUS, MUX, ADCON, DRATE block.
    ///
    /// An undefined DRATE value leaves `data_rate` untouched and is reported
    /// back as `false`.
    pub fn adopt(&mut self, regs: &[u8; SETTINGS_REGISTERS]) -> bool {
        let status = regs[0];
        self.bit_order = if status & STATUS_ORDER_LSB != 0 {
            BitOrder::LsbFirst
        } else {
            BitOrder::MsbFirst
        };
        self.auto_calibration = status & STATUS_ACAL != 0;
        self.buffer = status & STATUS_BUFEN != 0;

        let adcon = regs[2];
        self.clock_out = ClockOut::from_bits(adcon);
        self.sensor_detect = SensorDetect::from_bits(adcon);
        self.gain = Gain::from_bits(adcon);

        match DataRate::from_bits(regs[3]) {
            Some(rate) => {
                self.data_rate = rate;
                true
            }
            None => false,
        }
    }
}
