//! # PCM / I2S Controller
//!
//! Used as an alternative DREQ source: one TX channel is enabled with a frame
//! length of `sample_us * 10 - 1` bit clocks, so the TX FIFO requests one
//! word per sample slice.

use bitfield_struct::bitfield;

/// Byte offset of the FIFO data register.
pub const FIFO_A: usize = 0x04;

/// Largest frame length the 10-bit `FLEN` field can hold.
pub const MAX_FRAME_LENGTH: u16 = 0x3FF;

/// `CS_A`: control and status.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct PcmCs {
    pub en: bool,
    pub rxon: bool,
    pub txon: bool,
    /// Clear the TX FIFO. Write only.
    pub txclr: bool,
    /// Clear the RX FIFO. Write only.
    pub rxclr: bool,
    #[bits(2)]
    pub txthr: u8,
    #[bits(2)]
    pub rxthr: u8,
    /// Bit 9: raise DREQ for the FIFOs.
    pub dmaen: bool,
    #[bits(3)]
    _reserved_10_12: u8,
    pub txsync: bool,
    pub rxsync: bool,
    pub txerr: bool,
    pub rxerr: bool,
    #[bits(access = RO)]
    pub txw: bool,
    #[bits(access = RO)]
    pub rxr: bool,
    #[bits(access = RO)]
    pub txd: bool,
    #[bits(access = RO)]
    pub rxd: bool,
    #[bits(access = RO)]
    pub txe: bool,
    #[bits(access = RO)]
    pub rxf: bool,
    pub rxsex: bool,
    pub sync: bool,
    pub stby: bool,
    #[bits(6)]
    _reserved_26_31: u8,
}

register!(PcmCs @ 0x00);

/// `MODE_A`: frame and clock mode.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct PcmMode {
    #[bits(10)]
    pub fslen: u16,
    /// Frame length in bit clocks, minus one.
    #[bits(10)]
    pub flen: u16,
    pub fsi: bool,
    pub fsm: bool,
    pub clki: bool,
    pub clkm: bool,
    pub ftxp: bool,
    pub frxp: bool,
    pub pdme: bool,
    pub pdmn: bool,
    pub clk_dis: bool,
    #[bits(3)]
    _reserved_29_31: u8,
}

register!(PcmMode @ 0x08);

/// `TXC_A`: transmit channel configuration.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct PcmTxc {
    #[bits(4)]
    pub ch2wid: u8,
    #[bits(10)]
    pub ch2pos: u16,
    pub ch2en: bool,
    pub ch2wex: bool,
    #[bits(4)]
    pub ch1wid: u8,
    #[bits(10)]
    pub ch1pos: u16,
    pub ch1en: bool,
    pub ch1wex: bool,
}

register!(PcmTxc @ 0x10);

/// `DREQ_A`: FIFO levels that raise DREQ and PANIC.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct PcmDreq {
    #[bits(7)]
    pub rx: u8,
    #[bits(1)]
    _reserved_7: u8,
    #[bits(7)]
    pub tx: u8,
    #[bits(1)]
    _reserved_15: u8,
    #[bits(7)]
    pub rx_panic: u8,
    #[bits(1)]
    _reserved_23: u8,
    #[bits(7)]
    pub tx_panic: u8,
    #[bits(1)]
    _reserved_31: u8,
}

impl PcmDreq {
    pub const PACING: Self = Self::new().with_tx_panic(64).with_tx(64);
}

register!(PcmDreq @ 0x14);
