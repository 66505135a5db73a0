//! # PWM Controller
//!
//! Only channel 1 is used, and only as a DREQ source: in FIFO mode the
//! controller drains one word per range period and requests the next one,
//! which is what paces the DMA chain.

use bitfield_struct::bitfield;

/// Byte offset of the channel 1 FIFO input.
pub const FIF1: usize = 0x18;

/// `CTL`: control register.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct PwmCtl {
    pub pwen1: bool,
    /// Serializer mode instead of PWM.
    pub mode1: bool,
    /// Repeat the last word when the FIFO is empty.
    pub rptl1: bool,
    /// Idle output level.
    pub sbit1: bool,
    pub pola1: bool,
    /// Feed channel 1 from the FIFO.
    pub usef1: bool,
    /// Clear the FIFO. Write only.
    pub clrf1: bool,
    /// Mark/space instead of the balanced algorithm.
    pub msen1: bool,
    pub pwen2: bool,
    pub mode2: bool,
    pub rptl2: bool,
    pub sbit2: bool,
    pub pola2: bool,
    pub usef2: bool,
    #[bits(1)]
    _reserved_14: u8,
    pub msen2: bool,
    #[bits(16)]
    _reserved_16_31: u16,
}

impl PwmCtl {
    /// Channel 1 enabled and fed from the FIFO.
    pub const FIFO_PACING: Self = Self::new().with_usef1(true).with_pwen1(true);
}

register!(PwmCtl @ 0x00);

/// `DMAC`: DMA request configuration.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct PwmDmac {
    /// FIFO level below which DREQ is raised.
    #[bits(8)]
    pub dreq: u8,
    /// FIFO level below which PANIC is raised.
    #[bits(8)]
    pub panic: u8,
    #[bits(15)]
    _reserved_16_30: u16,
    pub enab: bool,
}

impl PwmDmac {
    pub const PACING: Self = Self::new().with_enab(true).with_panic(15).with_dreq(15);
}

register!(PwmDmac @ 0x08);

/// `RNG1`: channel 1 range, in clock ticks per FIFO word.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PwmRng1(pub u32);

impl crate::Register for PwmRng1 {
    const OFFSET: usize = 0x10;
    const NAME: &'static str = "PwmRng1";

    #[inline]
    fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    fn into_raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_values() {
        assert_eq!(PwmCtl::FIFO_PACING.into_bits(), 0x21);
        assert_eq!(PwmCtl::new().with_clrf1(true).into_bits(), 0x40);
        assert_eq!(PwmDmac::PACING.into_bits(), 0x8000_0F0F);
    }
}
