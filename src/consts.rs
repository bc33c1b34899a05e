//! Command opcodes, register addresses and register field layouts.
//!
//! Values follow tables 23 and 24 of the ADS1256 datasheet. Field constants are
//! already shifted into position unless their name ends in `_SHIFT`.

/// Register map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Reg {
    STATUS = 0x00,
    MUX = 0x01,
    ADCON = 0x02,
    DRATE = 0x03,
    IO = 0x04,
    OFC0 = 0x05,
    OFC1 = 0x06,
    OFC2 = 0x07,
    FSC0 = 0x08,
    FSC1 = 0x09,
    FSC2 = 0x0A,
}

/// Stand-alone commands. Register reads and writes carry an address and are
/// framed by [`cmd::rreg`] and [`cmd::wreg`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    /// Complete SYNC and exit standby mode
    WAKEUP = 0x00,
    /// Read data
    RDATA = 0x01,
    /// Read data continuously
    RDATAC = 0x03,
    /// Stop read data continuously
    SDATAC = 0x0F,
    /// Offset and gain self-calibration
    SELFCAL = 0xF0,
    /// Offset self-calibration
    SELFOCAL = 0xF1,
    /// Gain self-calibration
    SELFGCAL = 0xF2,
    /// System offset calibration
    SYSOCAL = 0xF3,
    /// System gain calibration
    SYSGCAL = 0xF4,
    /// Synchronize the A/D conversion
    SYNC = 0xFC,
    /// Begin standby mode
    STANDBY = 0xFD,
    /// Reset to power-up values
    RESET = 0xFE,
}

pub mod cmd {
    const RREG: u8 = 0b0001_0000;
    const WREG: u8 = 0b0101_0000;

    /// Read `num_regs` registers starting at address `start_addr`.
    pub fn rreg(start_addr: u8, num_regs: u8) -> [u8; 2] {
        [RREG | (start_addr & 0b1111), num_regs.wrapping_sub(1) & 0b1111]
    }

    /// Write `num_regs` registers starting at address `start_addr`.
    pub fn wreg(start_addr: u8, num_regs: u8) -> [u8; 2] {
        [WREG | (start_addr & 0b1111), num_regs.wrapping_sub(1) & 0b1111]
    }
}

/// Number of registers in the map, STATUS through FSC2.
pub const REGISTERS: usize = 11;

/// STATUS, MUX, ADCON and DRATE are always moved as one block.
pub const SETTINGS_REGISTERS: usize = 4;

// STATUS
pub const STATUS_ID_SHIFT: u8 = 4;
pub const STATUS_ORDER_LSB: u8 = 1 << 3;
pub const STATUS_ACAL: u8 = 1 << 2;
pub const STATUS_BUFEN: u8 = 1 << 1;
pub const STATUS_NDRDY: u8 = 1 << 0;
pub const STATUS_WRITE_MASK: u8 = STATUS_ORDER_LSB | STATUS_ACAL | STATUS_BUFEN;

// MUX
pub const MUX_PSEL_SHIFT: u8 = 4;
pub const MUX_NSEL_MASK: u8 = 0b1111;

// ADCON
pub const ADCON_CLK_SHIFT: u8 = 5;
pub const ADCON_CLK_MASK: u8 = 0b11 << ADCON_CLK_SHIFT;
pub const ADCON_SDCS_SHIFT: u8 = 3;
pub const ADCON_SDCS_MASK: u8 = 0b11 << ADCON_SDCS_SHIFT;
pub const ADCON_PGA_MASK: u8 = 0b111;
pub const ADCON_WRITE_MASK: u8 = ADCON_CLK_MASK | ADCON_SDCS_MASK | ADCON_PGA_MASK;

/// Clocked out while reading so the converter sees a defined input level.
pub const IRRELEVANT: u8 = 0xFF;
