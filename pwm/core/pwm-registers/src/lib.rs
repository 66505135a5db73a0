//! # Typed BCM283x Peripheral Registers
//!
//! Bit-level models of the few peripheral blocks a DMA-paced PWM generator
//! touches: a DMA channel, the clock manager, the PWM and PCM serializers and
//! the GPIO function/level registers.
//!
//! Every register is a `#[bitfield(u32)]` type implementing [`Register`], so
//! it knows its own byte offset inside its block. Access goes through a
//! [`RegisterWindow`], which is either a real `/dev/mem` mapping or, with the
//! `sim` feature, a [`sim::SimulatedRegisters`] that journals every access.
//!
//! ```rust
//! # use pwm_registers::{RegisterWindow, dma::DmaCs, sim::{Journal, SimulatedRegisters}};
//! let journal = Journal::new();
//! let mut dma = SimulatedRegisters::new("dma", 0x100, journal.clone());
//! dma.store(DmaCs::START);
//! assert_eq!(dma.load::<DmaCs>().into_bits(), 0x1088_0001);
//! assert_eq!(journal.stores("dma"), vec![(0x00, 0x1088_0001)]);
//! ```

#![cfg_attr(not(any(test, doctest, feature = "sim")), no_std)]

/// Implements [`Register`] for a `#[bitfield(u32)]` type at a fixed offset.
macro_rules! register {
    ($ty:ident @ $offset:expr) => {
        impl $crate::Register for $ty {
            const OFFSET: usize = $offset;
            const NAME: &'static str = stringify!($ty);

            #[inline]
            fn from_raw(raw: u32) -> Self {
                Self::from_bits(raw)
            }

            #[inline]
            fn into_raw(self) -> u32 {
                self.into_bits()
            }
        }
    };
}

#[cfg(feature = "clock")]
pub mod clock;
#[cfg(feature = "dma")]
pub mod dma;
#[cfg(feature = "gpio")]
pub mod gpio;
#[cfg(feature = "pcm")]
pub mod pcm;
#[cfg(feature = "pwm")]
pub mod pwm;
#[cfg(feature = "sim")]
pub mod sim;

/// A 32-bit register at a fixed byte offset inside its peripheral block.
pub trait Register: Copy {
    /// Byte offset from the start of the block.
    const OFFSET: usize;
    /// Human readable name, used in traces.
    const NAME: &'static str;

    fn from_raw(raw: u32) -> Self;
    fn into_raw(self) -> u32;
}

/// A window of 32-bit registers belonging to one peripheral block.
///
/// Offsets are in bytes and must be word aligned. Implementations perform
/// exactly one access per call; nothing is cached.
pub trait RegisterWindow {
    /// Short block name (`"dma"`, `"clk"`, ...), used in traces.
    fn block(&self) -> &'static str;

    /// Read the word at `offset`.
    fn load_raw(&self, offset: usize) -> u32;

    /// Write `value` to the word at `offset`.
    fn store_raw(&mut self, offset: usize, value: u32);

    #[inline]
    fn load<R: Register>(&self) -> R {
        R::from_raw(self.load_raw(R::OFFSET))
    }

    #[inline]
    fn store<R: Register>(&mut self, value: R) {
        self.store_raw(R::OFFSET, value.into_raw());
    }

    /// Read-modify-write a register.
    #[inline]
    fn modify<R: Register>(&mut self, f: impl FnOnce(R) -> R) {
        let value = f(self.load::<R>());
        self.store(value);
    }
}

impl<W: RegisterWindow + ?Sized> RegisterWindow for &mut W {
    #[inline]
    fn block(&self) -> &'static str {
        (**self).block()
    }

    #[inline]
    fn load_raw(&self, offset: usize) -> u32 {
        (**self).load_raw(offset)
    }

    #[inline]
    fn store_raw(&mut self, offset: usize, value: u32) {
        (**self).store_raw(offset, value);
    }
}
