//! # Descriptor Chain
//!
//! Arena layout for `n` samples:
//!
//! ```text
//! offset 0                     align 32
//! ┌─────────────────────────┬───┬──────┬──────┬──────┬─────┬──────────┐
//! │ samples[0 .. n] (u32)   │pad│ CB 0 │ CB 1 │ CB 2 │ ... │ CB 2n-1  │
//! └─────────────────────────┴───┴──────┴──────┴──────┴─────┴──────────┘
//! ```
//!
//! Even control blocks copy one sample word to `GPSET0`/`GPCLR0`. Odd ones
//! write a word to the pacing FIFO and stall on its DREQ for one sample time.
//! The last block links back to the first, so the engine loops forever.
//!
//! Every address placed in a control block comes from
//! [`PageTable::offset_to_bus`](pwm_memory::PageTable::offset_to_bus): the
//! arena is virtually contiguous but not physically.

use crate::config::DelaySource;
use crate::error::ChainError;
use pwm_addresses::{ArenaOffset, BusAddress};
use pwm_memory::{DmaMemory, MAX_ARENA_PAGES, PAGE_SIZE, pages_for};
use pwm_platform::{Block, bus_register};
use pwm_registers::dma::{Permap, TransferInfo};
use pwm_registers::gpio::{GPCLR0, GPSET0};

/// One DMA control block as the engine reads it from memory.
#[repr(C, align(32))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControlBlock {
    pub info: TransferInfo,
    pub source: BusAddress,
    pub destination: BusAddress,
    pub length: u32,
    pub stride: u32,
    pub next: BusAddress,
    pub reserved: [u32; 2],
}

const _: () = assert!(size_of::<ControlBlock>() == ControlBlock::SIZE);

impl ControlBlock {
    pub const SIZE: usize = 32;
    pub const WORDS: usize = Self::SIZE / 4;

    #[must_use]
    pub const fn to_words(&self) -> [u32; Self::WORDS] {
        [
            self.info.into_bits(),
            self.source.as_u32(),
            self.destination.as_u32(),
            self.length,
            self.stride,
            self.next.as_u32(),
            self.reserved[0],
            self.reserved[1],
        ]
    }

    #[must_use]
    pub const fn from_words(words: [u32; Self::WORDS]) -> Self {
        Self {
            info: TransferInfo::from_bits(words[0]),
            source: BusAddress::new(words[1]),
            destination: BusAddress::new(words[2]),
            length: words[3],
            stride: words[4],
            next: BusAddress::new(words[5]),
            reserved: [words[6], words[7]],
        }
    }
}

/// Most samples per cycle whose layout still fits in [`MAX_ARENA_PAGES`].
///
/// Each sample costs one word plus two control blocks; up to 28 bytes of
/// padding precede the first control block.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_SAMPLES: u32 = ((MAX_ARENA_PAGES * PAGE_SIZE - (ControlBlock::SIZE - 4))
    / (4 + 2 * ControlBlock::SIZE)) as u32;

/// Where things live inside the arena.
///
/// Offsets are only meaningful for `nr_samples <= MAX_SAMPLES`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChainLayout {
    nr_samples: u32,
}

impl ChainLayout {
    #[must_use]
    pub const fn new(nr_samples: u32) -> Self {
        Self { nr_samples }
    }

    #[must_use]
    pub const fn nr_samples(&self) -> u32 {
        self.nr_samples
    }

    #[must_use]
    pub const fn sample_offset(&self, slot: u32) -> ArenaOffset {
        ArenaOffset::new(slot as usize * 4)
    }

    #[must_use]
    pub const fn control_blocks_offset(&self) -> ArenaOffset {
        ArenaOffset::new(self.nr_samples as usize * 4).align_up(ControlBlock::SIZE)
    }

    #[must_use]
    pub const fn control_block_offset(&self, index: usize) -> ArenaOffset {
        ArenaOffset::new(self.control_blocks_offset().as_usize() + index * ControlBlock::SIZE)
    }

    /// Always `2 * nr_samples`.
    #[must_use]
    pub const fn descriptor_count(&self) -> usize {
        2 * self.nr_samples as usize
    }

    #[must_use]
    pub const fn len_bytes(&self) -> usize {
        self.control_block_offset(self.descriptor_count()).as_usize()
    }

    /// Arena pages needed to hold the whole layout.
    #[must_use]
    pub const fn pages(&self) -> usize {
        pages_for(self.len_bytes())
    }
}

/// Fixed bus addresses the chain writes to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChainTargets {
    /// Register slot 0 is copied to.
    pub on: BusAddress,
    /// Register every other slot is copied to.
    pub off: BusAddress,
    pub fifo: BusAddress,
    pub permap: Permap,
}

impl ChainTargets {
    #[must_use]
    pub const fn new(invert: bool, pacer: DelaySource) -> Self {
        let set = bus_register(Block::Gpio, GPSET0);
        let clear = bus_register(Block::Gpio, GPCLR0);
        let (on, off) = if invert { (clear, set) } else { (set, clear) };
        Self {
            on,
            off,
            fifo: pacer.fifo(),
            permap: pacer.permap(),
        }
    }
}

/// A built chain. The control blocks never change after [`build`](Self::build).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DescriptorChain {
    layout: ChainLayout,
    head: BusAddress,
}

impl DescriptorChain {
    /// Write all control blocks into `memory`.
    ///
    /// # Errors
    /// [`ChainError`] if the arena is too small or a page has no bus address.
    pub fn build<M: DmaMemory + ?Sized>(
        memory: &mut M,
        layout: ChainLayout,
        targets: ChainTargets,
    ) -> Result<Self, ChainError> {
        let need = layout.len_bytes();
        if memory.len() < need {
            return Err(ChainError::ArenaTooSmall {
                have: memory.len(),
                need,
            });
        }

        let bus = |offset: ArenaOffset| {
            memory
                .page_table()
                .offset_to_bus(offset)
                .ok_or(ChainError::Unmapped(offset))
        };

        let copy = TransferInfo::new()
            .with_no_wide_bursts(true)
            .with_wait_resp(true);
        let pace = copy.with_dest_dreq(true).with_permap(targets.permap);
        // The pacing write's payload is irrelevant; any arena word will do.
        let filler = bus(layout.sample_offset(0))?;
        let count = layout.descriptor_count();

        let mut blocks = Vec::with_capacity(count);
        for slot in 0..layout.nr_samples() {
            let index = 2 * slot as usize;
            blocks.push(ControlBlock {
                info: copy,
                source: bus(layout.sample_offset(slot))?,
                destination: if slot == 0 { targets.on } else { targets.off },
                length: 4,
                stride: 0,
                next: bus(layout.control_block_offset(index + 1))?,
                reserved: [0; 2],
            });
            blocks.push(ControlBlock {
                info: pace,
                source: filler,
                destination: targets.fifo,
                length: 4,
                stride: 0,
                next: bus(layout.control_block_offset((index + 2) % count))?,
                reserved: [0; 2],
            });
        }

        let head = bus(layout.control_block_offset(0))?;

        for (index, block) in blocks.iter().enumerate() {
            let base = layout.control_block_offset(index);
            for (word, value) in block.to_words().into_iter().enumerate() {
                memory.write_u32(base + word * 4, value);
            }
        }

        log::debug!(
            "built {count} control blocks for {} samples, head at {head}",
            layout.nr_samples()
        );
        Ok(Self { layout, head })
    }

    #[must_use]
    pub const fn layout(&self) -> ChainLayout {
        self.layout
    }

    /// Bus address of control block 0, for `CONBLK_AD`.
    #[must_use]
    pub const fn head(&self) -> BusAddress {
        self.head
    }

    /// Read back control block `index`.
    #[must_use]
    pub fn read<M: DmaMemory + ?Sized>(&self, memory: &M, index: usize) -> ControlBlock {
        let base = self.layout.control_block_offset(index);
        let mut words = [0; ControlBlock::WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            *word = memory.read_u32(base + i * 4);
        }
        ControlBlock::from_words(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwm_addresses::DramAlias;
    use pwm_memory::SimulatedArena;

    fn build(nr_samples: u32, invert: bool, pacer: DelaySource) -> (SimulatedArena, DescriptorChain) {
        let layout = ChainLayout::new(nr_samples);
        let mut arena = SimulatedArena::new(layout.pages(), DramAlias::UNCACHED).unwrap();
        let chain = DescriptorChain::build(&mut arena, layout, ChainTargets::new(invert, pacer)).unwrap();
        (arena, chain)
    }

    #[test]
    fn layout_for_default_config() {
        let layout = ChainLayout::new(1000);
        assert_eq!(layout.control_blocks_offset().as_usize(), 4000);
        assert_eq!(layout.descriptor_count(), 2000);
        assert_eq!(layout.len_bytes(), 4000 + 2000 * 32);
        assert_eq!(layout.pages(), 17);
    }

    #[test]
    fn largest_layout_fits_the_bus_window() {
        assert_eq!(MAX_SAMPLES, 15_790_260);
        assert!(ChainLayout::new(MAX_SAMPLES).pages() <= MAX_ARENA_PAGES);
        assert!(ChainLayout::new(MAX_SAMPLES + 1).pages() > MAX_ARENA_PAGES);
    }

    #[test]
    fn control_blocks_are_aligned() {
        let layout = ChainLayout::new(3);
        assert_eq!(layout.control_blocks_offset().as_usize(), 32);
        assert!(layout.control_block_offset(5).is_aligned(32));
    }

    #[test]
    fn following_next_returns_to_head() {
        let (arena, chain) = build(1000, false, DelaySource::Pwm);
        let table = arena.page_table();
        let mut bus = chain.head();
        for step in 0..chain.layout().descriptor_count() {
            let offset = table.bus_to_offset(bus).unwrap();
            let index = (offset.as_usize() - chain.layout().control_blocks_offset().as_usize()) / 32;
            assert_eq!(index, step);
            bus = chain.read(&arena, index).next;
        }
        assert_eq!(bus, chain.head());
    }

    #[test]
    fn copy_and_pace_blocks() {
        let (arena, chain) = build(1000, false, DelaySource::Pwm);
        let table = arena.page_table();
        let layout = chain.layout();

        let first = chain.read(&arena, 0);
        assert_eq!(first.info.into_bits(), 0x0400_0008);
        assert_eq!(first.destination.as_u32(), 0x7E20_001C);
        assert_eq!(first.source, table.offset_to_bus(layout.sample_offset(0)).unwrap());
        assert_eq!(first.length, 4);
        assert_eq!(first.stride, 0);

        let pace = chain.read(&arena, 1);
        assert_eq!(pace.info.into_bits(), 0x0405_0048);
        assert_eq!(pace.destination.as_u32(), 0x7E20_C018);

        // slot 900 lives on the first page; its control block does not.
        let copy = chain.read(&arena, 1800);
        assert_eq!(copy.destination.as_u32(), 0x7E20_0028);
        assert_eq!(copy.source, table.offset_to_bus(layout.sample_offset(900)).unwrap());
        assert_eq!(
            chain.read(&arena, 1801).next,
            table.offset_to_bus(layout.control_block_offset(1802)).unwrap()
        );
    }

    #[test]
    fn inverted_pcm_chain() {
        let (arena, chain) = build(10, true, DelaySource::Pcm);
        assert_eq!(chain.read(&arena, 0).destination.as_u32(), 0x7E20_0028);
        assert_eq!(chain.read(&arena, 2).destination.as_u32(), 0x7E20_001C);
        let pace = chain.read(&arena, 3);
        assert_eq!(pace.info.into_bits(), 0x0402_0048);
        assert_eq!(pace.destination.as_u32(), 0x7E20_3004);
    }

    #[test]
    fn arena_must_fit() {
        let layout = ChainLayout::new(2000);
        let mut arena = SimulatedArena::new(1, DramAlias::UNCACHED).unwrap();
        assert_eq!(
            DescriptorChain::build(&mut arena, layout, ChainTargets::new(false, DelaySource::Pwm)),
            Err(ChainError::ArenaTooSmall {
                have: 4096,
                need: layout.len_bytes()
            })
        );
    }

    #[test]
    fn word_round_trip() {
        let block = ControlBlock {
            info: TransferInfo::from_bits(0x0405_0048),
            source: BusAddress::new(1),
            destination: BusAddress::new(2),
            length: 4,
            stride: 0,
            next: BusAddress::new(3),
            reserved: [0; 2],
        };
        assert_eq!(ControlBlock::from_words(block.to_words()), block);
    }
}
