//! # DMA Channel Registers
//!
//! Each of the 15 "full" DMA channels owns a 0x100 byte register block at
//! `DMA base + n * 0x100`. Channel 15 lives elsewhere and is not modeled.
//!
//! ```text
//! 0x00 CS         control and status
//! 0x04 CONBLK_AD  bus address of the current control block
//! 0x08 TI         (read-only copy of the loaded control block)
//! 0x20 DEBUG      error flags, write 1 to clear
//! ```

use bitfield_struct::bitfield;
use pwm_addresses::BusAddress;

/// Number of channels reachable through the main DMA block.
pub const CHANNEL_COUNT: u8 = 15;

/// Size of one channel's register block.
pub const CHANNEL_STRIDE: usize = 0x100;

/// Byte offset of channel `n` inside the DMA block.
#[inline]
#[must_use]
pub const fn channel_offset(n: u8) -> usize {
    n as usize * CHANNEL_STRIDE
}

/// `CS`: control and status.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct DmaCs {
    /// Bit 0: start/pause the channel.
    pub active: bool,
    /// Bit 1: transfer complete. Write 1 to clear.
    pub end: bool,
    /// Bit 2: interrupt status. Write 1 to clear.
    pub int: bool,
    /// Bit 3: DREQ state.
    #[bits(access = RO)]
    pub dreq: bool,
    /// Bit 4: channel paused.
    #[bits(access = RO)]
    pub paused: bool,
    /// Bit 5: paused by inactive DREQ.
    #[bits(access = RO)]
    pub dreq_stops_dma: bool,
    /// Bit 6: waiting for the last write response.
    #[bits(access = RO)]
    pub waiting_for_outstanding_writes: bool,
    #[bits(1)]
    _reserved_7: u8,
    /// Bit 8: the channel has an error flagged in `DEBUG`.
    #[bits(access = RO)]
    pub error: bool,
    #[bits(7)]
    _reserved_9_15: u8,
    /// Bits 16..19: AXI priority of normal transactions.
    #[bits(4)]
    pub priority: u8,
    /// Bits 20..23: AXI priority of panicking transactions.
    #[bits(4)]
    pub panic_priority: u8,
    #[bits(4)]
    _reserved_24_27: u8,
    /// Bit 28: wait for outstanding writes before finishing a block.
    pub wait_for_outstanding_writes: bool,
    /// Bit 29: keep running while the debugger pauses the system.
    pub disdebug: bool,
    /// Bit 30: abort the current control block.
    pub abort: bool,
    /// Bit 31: reset the channel.
    pub reset: bool,
}

impl DmaCs {
    /// Run with priority 8, panic priority 8, waiting for outstanding writes.
    pub const START: Self = Self::new()
        .with_active(true)
        .with_priority(8)
        .with_panic_priority(8)
        .with_wait_for_outstanding_writes(true);

    pub const RESET: Self = Self::new().with_reset(true);

    /// Clear pending `INT` and `END` flags.
    pub const CLEAR_FLAGS: Self = Self::new().with_int(true).with_end(true);
}

register!(DmaCs @ 0x00);

/// `CONBLK_AD`: bus address of the control block to load on activation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DmaConblkAd(pub BusAddress);

impl crate::Register for DmaConblkAd {
    const OFFSET: usize = 0x04;
    const NAME: &'static str = "DmaConblkAd";

    #[inline]
    fn from_raw(raw: u32) -> Self {
        Self(BusAddress::new(raw))
    }

    #[inline]
    fn into_raw(self) -> u32 {
        self.0.as_u32()
    }
}

/// `DEBUG`: sticky error flags and engine identification.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct DmaDebug {
    /// Bit 0: AXI read last signal was not set when expected.
    pub read_last_not_set_error: bool,
    /// Bit 1: FIFO error.
    pub fifo_error: bool,
    /// Bit 2: slave read response error.
    pub read_error: bool,
    #[bits(1)]
    _reserved_3: u8,
    #[bits(4, access = RO)]
    pub outstanding_writes: u8,
    #[bits(8, access = RO)]
    pub dma_id: u8,
    #[bits(9, access = RO)]
    pub dma_state: u16,
    #[bits(3, access = RO)]
    pub version: u8,
    /// Bit 28: this is a DMA Lite channel.
    #[bits(access = RO)]
    pub lite: bool,
    #[bits(3)]
    _reserved_29_31: u8,
}

impl DmaDebug {
    /// Writing the three error bits clears them.
    pub const CLEAR_ERRORS: Self = Self::new()
        .with_read_last_not_set_error(true)
        .with_fifo_error(true)
        .with_read_error(true);
}

register!(DmaDebug @ 0x20);

/// Peripheral whose DREQ line paces a transfer (`TI.PERMAP`).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Permap(u8);

impl Permap {
    /// Unpaced; always requesting.
    pub const NONE: Self = Self(0);
    pub const PCM_TX: Self = Self(2);
    pub const PWM: Self = Self(5);

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        Self(value & 0x1F)
    }
}

/// `TI`: transfer information word of a control block.
///
/// Lives in memory as the first word of each control block; the channel
/// keeps a read-only copy at `0x08` while running.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct TransferInfo {
    /// Bit 0: raise an interrupt when this block completes.
    pub inten: bool,
    /// Bit 1: 2D mode.
    pub tdmode: bool,
    #[bits(1)]
    _reserved_2: u8,
    /// Bit 3: wait for the AXI write response before continuing.
    pub wait_resp: bool,
    /// Bit 4: increment the destination address.
    pub dest_inc: bool,
    /// Bit 5: 128-bit destination writes.
    pub dest_width: bool,
    /// Bit 6: gate writes on the peripheral's DREQ.
    pub dest_dreq: bool,
    /// Bit 7: do not perform destination writes.
    pub dest_ignore: bool,
    /// Bit 8: increment the source address.
    pub src_inc: bool,
    /// Bit 9: 128-bit source reads.
    pub src_width: bool,
    /// Bit 10: gate reads on the peripheral's DREQ.
    pub src_dreq: bool,
    /// Bit 11: do not perform source reads.
    pub src_ignore: bool,
    /// Bits 12..15: burst length in words, minus one.
    #[bits(4)]
    pub burst_length: u8,
    /// Bits 16..20: DREQ source.
    #[bits(5)]
    pub permap: Permap,
    /// Bits 21..25: dummy cycles after each read or write.
    #[bits(5)]
    pub waits: u8,
    /// Bit 26: never use two-beat bursts.
    pub no_wide_bursts: bool,
    #[bits(5)]
    _reserved_27_31: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_value() {
        assert_eq!(DmaCs::START.into_bits(), 0x1088_0001);
        assert_eq!(DmaCs::RESET.into_bits(), 0x8000_0000);
        assert_eq!(DmaCs::CLEAR_FLAGS.into_bits(), 0b110);
    }

    #[test]
    fn debug_clear_value() {
        assert_eq!(DmaDebug::CLEAR_ERRORS.into_bits(), 7);
    }

    #[test]
    fn paced_transfer_info() {
        let ti = TransferInfo::new()
            .with_no_wide_bursts(true)
            .with_wait_resp(true)
            .with_dest_dreq(true)
            .with_permap(Permap::PWM);
        assert_eq!(ti.into_bits(), 0x0405_0048);

        let ti = ti.with_permap(Permap::PCM_TX);
        assert_eq!(ti.into_bits(), 0x0402_0048);
    }

    #[test]
    fn status_bits_decode() {
        let cs = DmaCs::from_bits(0x0000_0109);
        assert!(cs.active());
        assert!(cs.dreq());
        assert!(cs.error());
        assert!(!cs.paused());
    }

    #[test]
    fn channel_offsets() {
        assert_eq!(channel_offset(0), 0);
        assert_eq!(channel_offset(14), 0xE00);
    }
}
