use crate::PhysicalAddress;
use core::fmt;

/// Size of the DRAM window visible to the VideoCore bus.
pub const BUS_DRAM_WINDOW: u64 = 0x4000_0000;

/// Bus address of the peripheral block, independent of the ARM-side mapping.
const BUS_PERIPHERAL_BASE: u32 = 0x7E00_0000;

/// The bus alias under which SDRAM is presented to the DMA engine.
///
/// The top two bits of a bus address select the cache behaviour of the
/// access. Which one the ARM side expects depends on the SoC.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DramAlias(u32);

impl DramAlias {
    /// `0x4...` alias: L2 cache coherent, used on the BCM2835.
    pub const L2_COHERENT: Self = Self(0x4000_0000);
    /// `0xC...` alias: direct uncached, used from the BCM2836 onwards.
    pub const UNCACHED: Self = Self(0xC000_0000);

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for DramAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DramAlias({:#010X})", self.0)
    }
}

/// A 32-bit VideoCore bus address, as consumed by the DMA engine.
///
/// Control blocks, source and destination fields and the `CONBLK_AD` register
/// all carry bus addresses; an ARM physical address written there would point
/// somewhere else entirely.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BusAddress(u32);

impl BusAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    /// Translate a physical SDRAM address through the given alias.
    ///
    /// Returns `None` if the address lies beyond the 1 GiB window the
    /// bus can reach.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_physical(pa: PhysicalAddress, alias: DramAlias) -> Option<Self> {
        if pa.as_u64() >= BUS_DRAM_WINDOW {
            return None;
        }
        // fits: checked against the window above
        Some(Self(pa.as_u64() as u32 | alias.as_u32()))
    }

    /// Bus address of a peripheral register at `offset` from the peripheral base.
    #[inline]
    #[must_use]
    pub const fn peripheral(offset: u32) -> Self {
        Self(BUS_PERIPHERAL_BASE + offset)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// `true` if the address is aligned to `align` bytes (power of two).
    #[inline]
    #[must_use]
    pub const fn is_aligned(self, align: u32) -> bool {
        self.0 & (align - 1) == 0
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u32) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BUS({:#010X})", self.0)
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

impl From<BusAddress> for u32 {
    #[inline]
    fn from(value: BusAddress) -> Self {
        value.0
    }
}
