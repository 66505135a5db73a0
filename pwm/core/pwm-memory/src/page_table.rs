//! # Arena Page Table
//!
//! Arena pages are virtually contiguous but physically scattered. The page
//! table records, per page, where it lives in each address space, so that an
//! arena byte offset can be turned into the bus address the DMA engine needs.
//! It is filled once while the arena is built and never changes afterwards.

use crate::pagemap::{PageResolver, ResolveError};
use pwm_addresses::{
    ArenaOffset, BusAddress, DramAlias, PhysicalPage, Size4K, VirtualAddress, VirtualPage,
};

/// Where one arena page lives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageMapEntry {
    pub virtual_base: VirtualPage<Size4K>,
    pub physical_base: PhysicalPage<Size4K>,
    /// `physical_base` as seen by the DMA engine.
    pub bus_base: BusAddress,
}

impl PageMapEntry {
    /// Build an entry, rejecting pages the DMA engine cannot reach.
    ///
    /// # Errors
    /// [`ResolveError::BeyondBusWindow`] if the page is outside the bus window.
    pub fn new(
        virtual_base: VirtualPage<Size4K>,
        physical_base: PhysicalPage<Size4K>,
        alias: DramAlias,
    ) -> Result<Self, ResolveError> {
        let bus_base = BusAddress::from_physical(physical_base.base(), alias)
            .ok_or(ResolveError::BeyondBusWindow(physical_base.base()))?;
        Ok(Self {
            virtual_base,
            physical_base,
            bus_base,
        })
    }
}

/// One [`PageMapEntry`] per arena page, in arena order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PageTable {
    entries: Vec<PageMapEntry>,
}

impl PageTable {
    /// Resolve `pages` consecutive pages starting at the page-aligned `base`.
    ///
    /// The pages must already be resident.
    ///
    /// # Errors
    /// Propagates the first resolution failure.
    pub fn resolve<R: PageResolver + ?Sized>(
        base: VirtualAddress,
        pages: usize,
        resolver: &R,
        alias: DramAlias,
    ) -> Result<Self, ResolveError> {
        debug_assert!(base.is_aligned::<Size4K>());
        let entries = (0..pages)
            .map(|i| {
                let va = base + i * crate::PAGE_SIZE;
                let pa = resolver.resolve(va)?;
                PageMapEntry::new(va.page(), pa.page(), alias)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, entry) in entries.iter().enumerate() {
            log::debug!(
                "arena page {i}: {:?} -> {:?} (bus {})",
                entry.virtual_base,
                entry.physical_base,
                entry.bus_base
            );
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub const fn from_entries(entries: Vec<PageMapEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[PageMapEntry] {
        &self.entries
    }

    /// Bus address of the arena byte at `offset`, or `None` past the end.
    #[must_use]
    pub fn offset_to_bus(&self, offset: ArenaOffset) -> Option<BusAddress> {
        let entry = self.entries.get(offset.page_index::<Size4K>())?;
        let in_page = u32::try_from(offset.in_page::<Size4K>().as_usize()).ok()?;
        entry.bus_base.checked_add(in_page)
    }

    /// Inverse of [`offset_to_bus`](Self::offset_to_bus).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn bus_to_offset(&self, bus: BusAddress) -> Option<ArenaOffset> {
        let page_mask = crate::PAGE_SIZE as u32 - 1;
        let page = BusAddress::new(bus.as_u32() & !page_mask);
        let index = self.entries.iter().position(|e| e.bus_base == page)?;
        Some(ArenaOffset::new(
            index * crate::PAGE_SIZE + (bus.as_u32() & page_mask) as usize,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwm_addresses::PhysicalAddress;

    /// Maps virtual page `n` of the test range to physical page `0x800 - n`.
    struct Reversed;

    impl PageResolver for Reversed {
        fn resolve(&self, va: VirtualAddress) -> Result<PhysicalAddress, ResolveError> {
            let n = (va.as_usize() - 0x7000_0000) >> 12;
            let frame = 0x800 - n as u64;
            Ok(PhysicalAddress::new((frame << 12) | (va.as_usize() as u64 & 0xFFF)))
        }
    }

    struct HighMemory;

    impl PageResolver for HighMemory {
        fn resolve(&self, va: VirtualAddress) -> Result<PhysicalAddress, ResolveError> {
            Ok(PhysicalAddress::new(0x4000_0000 + va.as_usize() as u64 % 0x1000))
        }
    }

    #[test]
    fn offsets_follow_scattered_pages() {
        let base = VirtualAddress::new(0x7000_0000);
        let table = PageTable::resolve(base, 3, &Reversed, DramAlias::UNCACHED).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.offset_to_bus(ArenaOffset::new(0x10)).unwrap().as_u32(),
            0xC080_0010
        );
        assert_eq!(
            table.offset_to_bus(ArenaOffset::new(0x1FFC)).unwrap().as_u32(),
            0xC07F_FFFC
        );
        assert_eq!(
            table.offset_to_bus(ArenaOffset::new(0x2000)).unwrap().as_u32(),
            0xC07F_E000
        );
        assert!(table.offset_to_bus(ArenaOffset::new(0x3000)).is_none());
    }

    #[test]
    fn bus_addresses_map_back_to_offsets() {
        let base = VirtualAddress::new(0x7000_0000);
        let table = PageTable::resolve(base, 2, &Reversed, DramAlias::L2_COHERENT).unwrap();
        let bus = table.offset_to_bus(ArenaOffset::new(0x1040)).unwrap();
        assert_eq!(table.bus_to_offset(bus), Some(ArenaOffset::new(0x1040)));
        assert_eq!(table.bus_to_offset(BusAddress::new(0x7E20_C018)), None);
    }

    #[test]
    fn unreachable_memory_is_rejected() {
        let base = VirtualAddress::new(0x7000_0000);
        let err = PageTable::resolve(base, 1, &HighMemory, DramAlias::UNCACHED).unwrap_err();
        assert!(matches!(err, ResolveError::BeyondBusWindow(pa) if pa.as_u64() == 0x4000_0000));
    }
}
