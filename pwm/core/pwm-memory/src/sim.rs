//! # Simulated Arena
//!
//! Heap-backed [`DmaMemory`] with a synthetic page table. Physical frames are
//! handed out in descending order with a gap between them, so code that
//! assumes physically contiguous arenas computes visibly wrong bus addresses.
//! The sequence wraps around inside the bus window and never repeats a frame
//! or yields frame 0.

use crate::arena::{ArenaError, DmaMemory};
use crate::page_table::{PageMapEntry, PageTable};
use crate::{MAX_ARENA_PAGES, PAGE_SIZE};
use pwm_addresses::{ArenaOffset, DramAlias, PhysicalAddress, VirtualAddress};

/// Virtual base reported for simulated arenas.
const SIM_VIRTUAL_BASE: usize = 0x7F00_0000;
/// Physical frame of the first simulated page.
const SIM_FIRST_FRAME: u64 = 0x0F00;
/// Frames `1..=SIM_FRAMES` are handed out; the count is odd, so a stride of
/// two visits each of them once.
const SIM_FRAMES: u64 = MAX_ARENA_PAGES as u64;

/// Frame of page `index`: `SIM_FIRST_FRAME - 2 * index`, wrapped into
/// `1..=SIM_FRAMES`.
const fn sim_frame(index: u64) -> u64 {
    let step = (2 * index) % SIM_FRAMES;
    1 + (SIM_FIRST_FRAME - 1 + SIM_FRAMES - step) % SIM_FRAMES
}

#[derive(Clone, Debug)]
pub struct SimulatedArena {
    words: Vec<u32>,
    pages: PageTable,
}

impl SimulatedArena {
    /// # Errors
    /// [`ArenaError::Empty`] for zero pages, [`ArenaError::TooLarge`] past
    /// [`MAX_ARENA_PAGES`].
    pub fn new(num_pages: usize, alias: DramAlias) -> Result<Self, ArenaError> {
        if num_pages == 0 {
            return Err(ArenaError::Empty);
        }
        if num_pages > MAX_ARENA_PAGES {
            return Err(ArenaError::TooLarge {
                pages: num_pages,
                max: MAX_ARENA_PAGES,
            });
        }
        let entries = (0..num_pages)
            .map(|i| {
                let va = VirtualAddress::new(SIM_VIRTUAL_BASE + i * PAGE_SIZE);
                let frame = sim_frame(i as u64);
                let pa = PhysicalAddress::new(frame << 12);
                PageMapEntry::new(va.page(), pa.page(), alias)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            words: vec![0; num_pages * PAGE_SIZE / 4],
            pages: PageTable::from_entries(entries),
        })
    }

    /// The whole arena as words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

impl DmaMemory for SimulatedArena {
    fn len(&self) -> usize {
        self.words.len() * 4
    }

    fn page_table(&self) -> &PageTable {
        &self.pages
    }

    fn read_u32(&self, offset: ArenaOffset) -> u32 {
        assert!(offset.is_aligned(4), "unaligned arena access at {offset:?}");
        self.words[offset.as_usize() / 4]
    }

    fn write_u32(&mut self, offset: ArenaOffset, value: u32) {
        assert!(offset.is_aligned(4), "unaligned arena access at {offset:?}");
        self.words[offset.as_usize() / 4] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_scattered() {
        let arena = SimulatedArena::new(3, DramAlias::UNCACHED).unwrap();
        let table = arena.page_table();
        assert_eq!(table.entries()[0].bus_base.as_u32(), 0xC0F0_0000);
        assert_eq!(table.entries()[1].bus_base.as_u32(), 0xC0EF_E000);
        assert_eq!(
            table.offset_to_bus(ArenaOffset::new(0x1004)).unwrap().as_u32(),
            0xC0EF_E004
        );
        assert_eq!(arena.len(), 3 * PAGE_SIZE);
    }

    #[test]
    fn words_round_trip() {
        let mut arena = SimulatedArena::new(1, DramAlias::L2_COHERENT).unwrap();
        arena.write_u32(ArenaOffset::new(8), 42);
        assert_eq!(arena.read_u32(ArenaOffset::new(8)), 42);
        assert_eq!(arena.words()[2], 42);
    }

    #[test]
    fn frames_stay_distinct_past_the_first_wrap() {
        let arena = SimulatedArena::new(2500, DramAlias::UNCACHED).unwrap();
        let table = arena.page_table();
        let mut seen = std::collections::HashSet::new();
        for entry in table.entries() {
            assert_ne!(entry.bus_base.as_u32(), 0xC000_0000);
            assert!(seen.insert(entry.bus_base), "{:?} handed out twice", entry.bus_base);
        }
        assert_eq!(table.entries()[1919].bus_base.as_u32(), 0xC000_2000);
        assert_eq!(table.entries()[1920].bus_base.as_u32(), 0xFFFF_F000);

        let last = ArenaOffset::new(2499 * PAGE_SIZE + 0x40);
        let bus = table.offset_to_bus(last).unwrap();
        assert_eq!(table.bus_to_offset(bus), Some(last));
    }

    #[test]
    fn frame_sequence_covers_the_window_once() {
        assert_eq!(sim_frame(0), SIM_FIRST_FRAME);
        let mut frames: Vec<u64> = (0..SIM_FRAMES).map(sim_frame).collect();
        frames.sort_unstable();
        assert!(frames.iter().copied().eq(1..=SIM_FRAMES));
    }

    #[test]
    fn oversized_arena_is_rejected() {
        assert!(matches!(
            SimulatedArena::new(MAX_ARENA_PAGES + 1, DramAlias::UNCACHED),
            Err(ArenaError::TooLarge { .. })
        ));
    }

    #[test]
    fn empty_arena_is_rejected() {
        assert!(matches!(
            SimulatedArena::new(0, DramAlias::UNCACHED),
            Err(ArenaError::Empty)
        ));
    }
}
