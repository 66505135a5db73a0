//! # Locked Memory Arena
//!
//! A fixed run of anonymous, shared, page-locked pages. The DMA engine reads
//! control blocks and samples from here behind the CPU's back, so the pages
//! must never move or be swapped while the arena exists.

use crate::page_table::PageTable;
use crate::pagemap::{PageResolver, ResolveError};
use crate::{MAX_ARENA_PAGES, PAGE_SIZE};
use nix::errno::Errno;
use nix::sys::mman::{MapFlags, ProtFlags, mlock, mmap_anonymous, munlock, munmap};
use nix::unistd::{SysconfVar, sysconf};
use pwm_addresses::{ArenaOffset, DramAlias, VirtualAddress};
use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

/// Word-addressed memory the DMA engine can see.
///
/// Offsets are in bytes from the start of the arena and must be 4-byte
/// aligned. Accesses are single volatile 32-bit loads and stores, so a DMA
/// reader never observes a torn word.
pub trait DmaMemory {
    /// Arena size in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The immutable page table built when the arena was created.
    fn page_table(&self) -> &PageTable;

    fn read_u32(&self, offset: ArenaOffset) -> u32;

    fn write_u32(&mut self, offset: ArenaOffset, value: u32);
}

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("an arena needs at least one page")]
    Empty,
    #[error("{pages} pages exceed the {max} the DMA bus window can hold")]
    TooLarge { pages: usize, max: usize },
    #[error("failed to query the page size: {0}")]
    PageSizeQuery(#[source] Errno),
    #[error("unsupported page size {0} (expected 4096)")]
    UnsupportedPageSize(usize),
    #[error("failed to map {len} bytes of anonymous memory: {source}")]
    Map {
        len: usize,
        #[source]
        source: Errno,
    },
    #[error("failed to lock {len} bytes of memory (raise RLIMIT_MEMLOCK or run as root): {source}")]
    Lock {
        len: usize,
        #[source]
        source: Errno,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Checks that the kernel uses the page size the arena is laid out for.
///
/// # Errors
/// [`ArenaError::PageSizeQuery`] or [`ArenaError::UnsupportedPageSize`].
fn ensure_page_size() -> Result<(), ArenaError> {
    let size = sysconf(SysconfVar::PAGE_SIZE).map_err(ArenaError::PageSizeQuery)?;
    let size = size
        .and_then(|s| usize::try_from(s).ok())
        .unwrap_or_default();
    if size == PAGE_SIZE {
        Ok(())
    } else {
        Err(ArenaError::UnsupportedPageSize(size))
    }
}

/// Owns an `mmap`ed, `mlock`ed region and releases it on drop.
#[derive(Debug)]
struct LockedMapping {
    ptr: NonNull<c_void>,
    len: usize,
    locked: bool,
}

impl LockedMapping {
    fn map(len: NonZeroUsize) -> Result<Self, ArenaError> {
        let flags = MapFlags::MAP_SHARED | MapFlags::MAP_NORESERVE | MapFlags::MAP_LOCKED;
        // SAFETY: a fresh anonymous mapping aliases nothing.
        let ptr = unsafe {
            mmap_anonymous(None, len, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE, flags)
        }
        .map_err(|source| ArenaError::Map {
            len: len.get(),
            source,
        })?;

        let mut mapping = Self {
            ptr,
            len: len.get(),
            locked: false,
        };

        // MAP_LOCKED is best effort; mlock reports the failure.
        // SAFETY: the range is exactly the mapping created above.
        unsafe { mlock(mapping.ptr, mapping.len) }.map_err(|source| ArenaError::Lock {
            len: mapping.len,
            source,
        })?;
        mapping.locked = true;
        Ok(mapping)
    }

    fn base(&self) -> VirtualAddress {
        VirtualAddress::from_nonnull(self.ptr)
    }
}

impl Drop for LockedMapping {
    fn drop(&mut self) {
        if self.locked {
            // SAFETY: unlocking our own mapping.
            if let Err(e) = unsafe { munlock(self.ptr, self.len) } {
                log::warn!("munlock of {} failed: {e}", self.base());
            }
        }
        // SAFETY: the mapping is no longer referenced; the arena owning it is being dropped.
        if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
            log::error!("munmap of {} failed: {e}", self.base());
        }
    }
}

/// Page-locked arena backed by real memory.
#[derive(Debug)]
pub struct LockedArena {
    mapping: LockedMapping,
    pages: PageTable,
}

impl LockedArena {
    /// Map, lock, touch and resolve `num_pages` pages.
    ///
    /// Everything mapped so far is released again if any step fails.
    ///
    /// # Errors
    /// See [`ArenaError`].
    pub fn allocate<R: PageResolver + ?Sized>(
        num_pages: usize,
        resolver: &R,
        alias: DramAlias,
    ) -> Result<Self, ArenaError> {
        if num_pages > MAX_ARENA_PAGES {
            return Err(ArenaError::TooLarge {
                pages: num_pages,
                max: MAX_ARENA_PAGES,
            });
        }
        let len = num_pages
            .checked_mul(PAGE_SIZE)
            .and_then(NonZeroUsize::new)
            .ok_or(ArenaError::Empty)?;
        ensure_page_size()?;

        let mapping = LockedMapping::map(len)?;
        let base = mapping.ptr.cast::<u32>();
        for page in 0..num_pages {
            // Fault every page in before asking where it lives.
            // SAFETY: `page * PAGE_SIZE` is inside the mapping and word aligned.
            unsafe {
                base.byte_add(page * PAGE_SIZE).write_volatile(0);
            }
        }

        let pages = PageTable::resolve(mapping.base(), num_pages, resolver, alias)?;
        log::info!("locked {num_pages} arena page(s) at {}", mapping.base());
        Ok(Self { mapping, pages })
    }

    #[must_use]
    pub fn base(&self) -> VirtualAddress {
        self.mapping.base()
    }

    fn word_ptr(&self, offset: ArenaOffset) -> NonNull<u32> {
        assert!(
            offset.is_aligned(4) && offset.as_usize() + 4 <= self.mapping.len,
            "arena access at {offset:?} is out of bounds"
        );
        // SAFETY: bounds and alignment checked above.
        unsafe { self.mapping.ptr.cast::<u32>().byte_add(offset.as_usize()) }
    }
}

impl DmaMemory for LockedArena {
    fn len(&self) -> usize {
        self.mapping.len
    }

    fn page_table(&self) -> &PageTable {
        &self.pages
    }

    fn read_u32(&self, offset: ArenaOffset) -> u32 {
        // SAFETY: in bounds, aligned, and the mapping is live while `self` is.
        unsafe { self.word_ptr(offset).read_volatile() }
    }

    fn write_u32(&mut self, offset: ArenaOffset, value: u32) {
        // SAFETY: in bounds, aligned, and the mapping is live while `self` is.
        unsafe { self.word_ptr(offset).write_volatile(value) }
    }
}
