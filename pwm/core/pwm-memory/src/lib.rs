//! # DMA-Visible Memory and Peripheral Mappings
//!
//! Everything a user-space process needs before it can hand work to the
//! DMA engine: memory that stays put, the bus address of every byte of it,
//! and access to the peripheral registers.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    DmaMemory                        │
//! │    • LockedArena: mmap + mlock, touched pages       │
//! │    • SimulatedArena: heap words, synthetic frames   │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ one entry per page
//! ┌─────────────────▼───────────────────────────────────┐
//! │                    PageTable                        │
//! │    • virtual → physical → bus, per 4 KiB page       │
//! │    • offset_to_bus(offset), bus_to_offset(bus)      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ resolved through
//! ┌─────────────────▼───────────────────────────────────┐
//! │                  PageResolver                       │
//! │    • PagemapResolver: /proc/self/pagemap            │
//! │    • present, not swapped, non-zero frame           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Register blocks are mapped separately by [`DevMem`], which yields one
//! [`MappedRegisters`] window per block. Each window owns its mapping and
//! unmaps it on drop.
//!
//! ## Requirements on the Host
//!
//! - Locking memory needs `CAP_IPC_LOCK` or a large enough `RLIMIT_MEMLOCK`.
//! - Reading frame numbers from `pagemap` needs `CAP_SYS_ADMIN`; without it
//!   the kernel reports a frame number of zero, which is rejected.
//! - Mapping `/dev/mem` needs root.

mod arena;
mod devmem;
mod page_table;
mod pagemap;
#[cfg(feature = "sim")]
mod sim;

pub use arena::{ArenaError, DmaMemory, LockedArena};
pub use devmem::{DevMem, MapError, MappedRegisters};
pub use page_table::{PageMapEntry, PageTable};
pub use pagemap::{PageResolver, PagemapEntry, PagemapResolver, ResolveError};
#[cfg(feature = "sim")]
pub use sim::SimulatedArena;

pub use pwm_addresses::Size4K as ArenaPageSize;

/// Bytes per arena page.
pub const PAGE_SIZE: usize = 4096;

/// Most pages an arena can span: every frame of the bus window except frame 0.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_ARENA_PAGES: usize = (pwm_addresses::BUS_DRAM_WINDOW / PAGE_SIZE as u64) as usize - 1;

/// Number of arena pages needed to hold `bytes`.
#[inline]
#[must_use]
pub const fn pages_for(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE)
}

const _: () = {
    use pwm_addresses::PageSize;
    assert!(PAGE_SIZE == ArenaPageSize::SIZE);
};
