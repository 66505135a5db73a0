//! # Clock Manager
//!
//! General purpose clocks are configured through a `CTL`/`DIV` register pair.
//! Every write must carry the password `0x5A` in the top byte or it is
//! silently ignored.

use bitfield_struct::bitfield;

/// Value expected in bits 24..31 of every clock manager write.
pub const PASSWORD: u8 = 0x5A;

/// Which serializer clock a register pair belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockChannel {
    /// `CM_PCMCTL` / `CM_PCMDIV`.
    Pcm,
    /// `CM_PWMCTL` / `CM_PWMDIV`.
    Pwm,
}

impl ClockChannel {
    #[inline]
    #[must_use]
    pub const fn control_offset(self) -> usize {
        match self {
            Self::Pcm => 0x98,
            Self::Pwm => 0xA0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn divisor_offset(self) -> usize {
        self.control_offset() + 4
    }
}

/// Clock source selector (`CTL.SRC`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ClockSource {
    Gnd = 0,
    Oscillator = 1,
    TestDebug0 = 2,
    TestDebug1 = 3,
    PllA = 4,
    PllC = 5,
    PllD = 6,
    HdmiAux = 7,
}

impl ClockSource {
    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    /// Sources 8..15 are wired to ground.
    #[inline]
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0xF {
            1 => Self::Oscillator,
            2 => Self::TestDebug0,
            3 => Self::TestDebug1,
            4 => Self::PllA,
            5 => Self::PllC,
            6 => Self::PllD,
            7 => Self::HdmiAux,
            _ => Self::Gnd,
        }
    }
}

/// `CM_xxxCTL`: clock generator control.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct ClockControl {
    #[bits(4)]
    pub src: ClockSource,
    /// Bit 4: enable the generator. Takes effect once `BUSY` settles.
    pub enab: bool,
    /// Bit 5: stop the generator immediately.
    pub kill: bool,
    #[bits(1)]
    _reserved_6: u8,
    /// Bit 7: generator is running.
    #[bits(access = RO)]
    pub busy: bool,
    /// Bit 8: invert the output.
    pub flip: bool,
    /// Bits 9..10: MASH noise shaping stages.
    #[bits(2)]
    pub mash: u8,
    #[bits(13)]
    _reserved_11_23: u16,
    #[bits(8)]
    pub passwd: u8,
}

impl ClockControl {
    /// Select `src` with the generator stopped.
    #[inline]
    #[must_use]
    pub const fn stopped(src: ClockSource) -> Self {
        Self::new().with_passwd(PASSWORD).with_src(src)
    }

    /// Select `src` and run.
    #[inline]
    #[must_use]
    pub const fn running(src: ClockSource) -> Self {
        Self::stopped(src).with_enab(true)
    }
}

/// `CM_xxxDIV`: fractional divisor.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct ClockDivisor {
    #[bits(12)]
    pub divf: u16,
    #[bits(12)]
    pub divi: u16,
    #[bits(8)]
    pub passwd: u8,
}

impl ClockDivisor {
    /// Integer divisor with the password applied.
    #[inline]
    #[must_use]
    pub const fn integer(divi: u16) -> Self {
        Self::new().with_passwd(PASSWORD).with_divi(divi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plld_sequence_values() {
        assert_eq!(ClockControl::stopped(ClockSource::PllD).into_bits(), 0x5A00_0006);
        assert_eq!(ClockDivisor::integer(50).into_bits(), 0x5A03_2000);
        assert_eq!(ClockControl::running(ClockSource::PllD).into_bits(), 0x5A00_0016);
    }

    #[test]
    fn register_pairs() {
        assert_eq!(ClockChannel::Pcm.control_offset(), 0x98);
        assert_eq!(ClockChannel::Pcm.divisor_offset(), 0x9C);
        assert_eq!(ClockChannel::Pwm.control_offset(), 0xA0);
        assert_eq!(ClockChannel::Pwm.divisor_offset(), 0xA4);
    }

    #[test]
    fn high_sources_are_ground() {
        assert_eq!(ClockSource::from_bits(0xC), ClockSource::Gnd);
        assert_eq!(ClockControl::from_bits(0x96).src(), ClockSource::PllD);
        assert!(ClockControl::from_bits(0x96).busy());
    }
}
