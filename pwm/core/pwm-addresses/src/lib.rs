//! # Virtual, Physical and Bus Address Types
//!
//! Strongly typed wrappers for the three address spaces a user-space DMA
//! driver has to juggle at the same time.
//!
//! ## Overview
//!
//! A process only ever dereferences **virtual** addresses. The kernel maps
//! those onto **physical** page frames, and the SoC's DMA engine sees that
//! same memory through yet another window, the VideoCore **bus** address
//! space. Mixing the three up is the classic way to make a DMA engine scribble
//! over random memory, so every kind gets its own type:
//!
//! | Type | Width | Meaning |
//! |------|-------|---------|
//! | [`VirtualAddress`] | `usize` | An address in this process. |
//! | [`PhysicalAddress`] | `u64` | An ARM physical address (page frame + offset). |
//! | [`BusAddress`] | `u32` | What the DMA engine puts on the bus. |
//! | [`PageFrameNumber`] | `u64` | A physical frame index as reported by the kernel. |
//! | [`ArenaOffset`] | `usize` | A byte offset into a DMA arena. |
//!
//! Page-granular views are parameterized by a [`PageSize`] marker:
//!
//! | Wrapper | Meaning |
//! |---------|---------|
//! | [`VirtualPage<S>`] | Page-aligned virtual base. |
//! | [`PhysicalPage<S>`] | Page-aligned physical base. |
//! | [`PageOffset<S>`] | Offset inside a page of size `S`. |
//!
//! ## Typical Usage
//!
//! ```rust
//! # use pwm_addresses::*;
//! let pfn = PageFrameNumber::new(0x1_2345);
//! let page = pfn.page::<Size4K>();
//! let pa = page.join(PageOffset::new(0x10));
//! assert_eq!(pa.as_u64(), 0x1234_5010);
//!
//! let bus = BusAddress::from_physical(pa, DramAlias::L2_COHERENT).unwrap();
//! assert_eq!(bus.as_u32(), 0x5234_5010);
//! ```
//!
//! ## Design Notes
//!
//! - All types are `#[repr(transparent)]` and `Copy`.
//! - Conversions that can lose information (physical → bus) are fallible.
//! - The page size is carried at the type level so offsets from one page size
//!   cannot be joined onto a page of another.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod arena_offset;
mod bus_address;
mod page_frame;
mod page_offset;
mod page_size;
mod pages;
mod physical_address;
mod virtual_address;

pub use arena_offset::ArenaOffset;
pub use bus_address::{BUS_DRAM_WINDOW, BusAddress, DramAlias};
pub use page_frame::PageFrameNumber;
pub use page_offset::PageOffset;
pub use page_size::{PageSize, Size4K};
pub use pages::{PhysicalPage, VirtualPage};
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_virtual() {
        let va = VirtualAddress::new(0x7654_3ABC);
        let (vp, off) = va.split::<Size4K>();
        assert_eq!(vp.base().as_usize(), 0x7654_3000);
        assert_eq!(off.as_usize(), 0xABC);
        assert_eq!(vp.join(off), va);
    }

    #[test]
    fn split_and_join_physical() {
        let pa = PhysicalAddress::new(0x0ABC_D123);
        let (pp, off) = pa.split::<Size4K>();
        assert_eq!(pp.base().as_u64(), 0x0ABC_D000);
        assert_eq!(off.as_usize(), 0x123);
        assert_eq!(pp.join(off), pa);
    }

    #[test]
    fn frame_number_to_page() {
        let pfn = PageFrameNumber::new(0x3_0000);
        assert_eq!(pfn.page::<Size4K>().base().as_u64(), 0x3000_0000);
    }

    #[test]
    fn bus_alias_is_applied() {
        let pa = PhysicalAddress::new(0x0012_3456);
        let l2 = BusAddress::from_physical(pa, DramAlias::L2_COHERENT).unwrap();
        let direct = BusAddress::from_physical(pa, DramAlias::UNCACHED).unwrap();
        assert_eq!(l2.as_u32(), 0x4012_3456);
        assert_eq!(direct.as_u32(), 0xC012_3456);
    }

    #[test]
    fn bus_alias_rejects_memory_beyond_the_window() {
        let pa = PhysicalAddress::new(0x4000_0000);
        assert!(BusAddress::from_physical(pa, DramAlias::L2_COHERENT).is_none());
        let pa = PhysicalAddress::new(0x1_0000_0000);
        assert!(BusAddress::from_physical(pa, DramAlias::UNCACHED).is_none());
    }

    #[test]
    fn arena_offsets() {
        let off = ArenaOffset::new(0x1FE4);
        assert_eq!(off.page_index::<Size4K>(), 1);
        assert_eq!(off.in_page::<Size4K>().as_usize(), 0xFE4);
        assert!(off.is_aligned(4));
        assert!(!off.is_aligned(32));
        assert_eq!(off.align_up(32).as_usize(), 0x2000);
        assert_eq!((off + 0x1C).as_usize(), 0x2000);
    }
}
