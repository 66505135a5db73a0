//! # GPIO Function Select and Level Registers
//!
//! Pins 0..=31 sit in bank 0. `GPSET0`/`GPCLR0` are write-one-to-act
//! registers, which is what makes them a convenient DMA destination: a word
//! with bit `n` set drives pin `n` and leaves every other pin alone.

use bitfield_struct::bitfield;

/// Byte offset of the output set register for bank 0.
pub const GPSET0: usize = 0x1C;
/// Byte offset of the output clear register for bank 0.
pub const GPCLR0: usize = 0x28;
/// Byte offset of the level register for bank 0.
pub const GPLEV0: usize = 0x34;

/// Highest pin number in bank 0.
pub const MAX_BANK0_PIN: u8 = 31;

/// Byte offset of the `GPFSELn` register holding `pin`.
#[inline]
#[must_use]
pub const fn fsel_offset(pin: u8) -> usize {
    (pin as usize / 10) * 4
}

/// Bit mask selecting `pin` in `GPSET0`/`GPCLR0`/`GPLEV0`.
#[inline]
#[must_use]
pub const fn pin_mask(pin: u8) -> u32 {
    1 << (pin & 31)
}

/// The 3-bit function of a pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Function {
    Input = 0b000,
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    Alt5 = 0b010,
}

impl Function {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b111 {
            0b000 => Self::Input,
            0b001 => Self::Output,
            0b100 => Self::Alt0,
            0b101 => Self::Alt1,
            0b110 => Self::Alt2,
            0b111 => Self::Alt3,
            0b011 => Self::Alt4,
            _ => Self::Alt5,
        }
    }
}

/// `GPFSELn`: function of ten consecutive pins.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct FunctionSelect {
    #[bits(3)]
    pub slot0: Function,
    #[bits(3)]
    pub slot1: Function,
    #[bits(3)]
    pub slot2: Function,
    #[bits(3)]
    pub slot3: Function,
    #[bits(3)]
    pub slot4: Function,
    #[bits(3)]
    pub slot5: Function,
    #[bits(3)]
    pub slot6: Function,
    #[bits(3)]
    pub slot7: Function,
    #[bits(3)]
    pub slot8: Function,
    #[bits(3)]
    pub slot9: Function,
    #[bits(2)]
    _reserved_30_31: u8,
}

impl FunctionSelect {
    /// Function of `pin`, which must belong to this register.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn function(self, pin: u8) -> Function {
        let shift = (pin % 10) * 3;
        Function::from_bits(((self.into_bits() >> shift) & 0b111) as u8)
    }

    /// Replace the function of `pin`, leaving the other nine slots intact.
    #[inline]
    #[must_use]
    pub const fn with_function(self, pin: u8, function: Function) -> Self {
        let shift = (pin % 10) * 3;
        let cleared = self.into_bits() & !(0b111 << shift);
        Self::from_bits(cleared | ((function.into_bits() as u32) << shift))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsel_layout() {
        assert_eq!(fsel_offset(4), 0x00);
        assert_eq!(fsel_offset(17), 0x04);
        assert_eq!(fsel_offset(25), 0x08);
        assert_eq!(fsel_offset(31), 0x0C);
    }

    #[test]
    fn set_function_keeps_neighbours() {
        let reg = FunctionSelect::from_bits(0x0000_001C); // slots 0/1: Alt0/Alt4
        let reg = reg.with_function(17, Function::Output);
        assert_eq!(reg.into_bits(), 0x0020_001C);
        assert_eq!(reg.slot7(), Function::Output);
        assert_eq!(reg.function(17), Function::Output);
        assert_eq!(reg.function(10), Function::Alt0);
        assert_eq!(reg.function(11), Function::Alt4);
    }

    #[test]
    fn masks() {
        assert_eq!(pin_mask(0), 1);
        assert_eq!(pin_mask(31), 0x8000_0000);
    }
}
