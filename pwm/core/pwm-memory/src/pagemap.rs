//! # Physical Page Resolution
//!
//! `/proc/<pid>/pagemap` holds one little 64-bit record per virtual page of
//! the process. The record says whether the page is resident and, for
//! privileged readers, which physical frame backs it.

use bitfield_struct::bitfield;
use pwm_addresses::{PageFrameNumber, PhysicalAddress, Size4K, VirtualAddress};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

const PAGEMAP_PATH: &str = "/proc/self/pagemap";
const ENTRY_SIZE: u64 = 8;

/// One `pagemap` record.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PagemapEntry {
    /// Bits 0..54: page frame number, valid while `present`.
    #[bits(55)]
    pub pfn: u64,
    /// Bit 55: PTE is soft-dirty.
    pub soft_dirty: bool,
    /// Bit 56: page is exclusively mapped.
    pub exclusive: bool,
    /// Bit 57: PTE is write-protected by userfaultfd.
    pub uffd_wp: bool,
    /// Bit 58: page is part of a guard region.
    pub guard: bool,
    #[bits(2)]
    _reserved_59_60: u8,
    /// Bit 61: file page or shared anonymous page.
    pub file_or_shared_anon: bool,
    /// Bit 62: page is swapped out; `pfn` holds swap type and offset.
    pub swapped: bool,
    /// Bit 63: page is resident in RAM.
    pub present: bool,
}

impl PagemapEntry {
    #[inline]
    #[must_use]
    pub const fn frame(self) -> PageFrameNumber {
        PageFrameNumber::new(self.pfn())
    }

    /// Check the record describes a resident page with a visible frame.
    ///
    /// # Errors
    /// [`ResolveError::NotPresent`], [`ResolveError::Swapped`] or
    /// [`ResolveError::ZeroFrame`].
    pub fn checked_frame(self, va: VirtualAddress) -> Result<PageFrameNumber, ResolveError> {
        if self.swapped() {
            return Err(ResolveError::Swapped(va));
        }
        if !self.present() {
            return Err(ResolveError::NotPresent(va));
        }
        if self.frame().is_zero() {
            return Err(ResolveError::ZeroFrame(va));
        }
        Ok(self.frame())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to open /proc/self/pagemap: {0}")]
    Open(#[source] std::io::Error),
    #[error("failed to read the pagemap entry for {va}: {source}")]
    Read {
        va: VirtualAddress,
        #[source]
        source: std::io::Error,
    },
    #[error("page at {0} is not resident")]
    NotPresent(VirtualAddress),
    #[error("page at {0} is swapped out")]
    Swapped(VirtualAddress),
    #[error("page at {0} reports frame 0 (reading frame numbers requires CAP_SYS_ADMIN)")]
    ZeroFrame(VirtualAddress),
    #[error("physical address {0} is outside the DMA-addressable window")]
    BeyondBusWindow(PhysicalAddress),
}

/// Translates virtual addresses of this process into physical addresses.
pub trait PageResolver {
    /// Physical address backing `va`, including the in-page offset.
    ///
    /// # Errors
    /// The page is not resident, swapped out, or its frame is not visible.
    fn resolve(&self, va: VirtualAddress) -> Result<PhysicalAddress, ResolveError>;
}

/// [`PageResolver`] backed by `/proc/self/pagemap`.
#[derive(Debug)]
pub struct PagemapResolver {
    file: File,
}

impl PagemapResolver {
    /// Open the pagemap of the calling process.
    ///
    /// # Errors
    /// [`ResolveError::Open`] if the file cannot be opened.
    pub fn open() -> Result<Self, ResolveError> {
        Self::open_path(PAGEMAP_PATH)
    }

    /// # Errors
    /// [`ResolveError::Open`] if the file cannot be opened.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let file = File::open(path).map_err(ResolveError::Open)?;
        Ok(Self { file })
    }

    /// Read the raw record for the page containing `va`.
    ///
    /// # Errors
    /// [`ResolveError::Read`] on a short or failed read.
    pub fn entry(&self, va: VirtualAddress) -> Result<PagemapEntry, ResolveError> {
        let mut buf = [0u8; ENTRY_SIZE as usize];
        let pos = va.page_number::<Size4K>() as u64 * ENTRY_SIZE;
        self.file
            .read_exact_at(&mut buf, pos)
            .map_err(|source| ResolveError::Read { va, source })?;
        Ok(PagemapEntry::from_bits(u64::from_ne_bytes(buf)))
    }
}

impl PageResolver for PagemapResolver {
    fn resolve(&self, va: VirtualAddress) -> Result<PhysicalAddress, ResolveError> {
        let entry = self.entry(va)?;
        let frame = entry.checked_frame(va)?;
        let pa = frame.page::<Size4K>().join(va.offset::<Size4K>());
        log::trace!("{va:?} -> {frame:?} -> {pa:?}");
        Ok(pa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VA: VirtualAddress = VirtualAddress::new(0x7000_1000);

    #[test]
    fn decode_present_entry() {
        let entry = PagemapEntry::from_bits((1 << 63) | (1 << 61) | 0x2_3456);
        assert!(entry.present());
        assert!(!entry.swapped());
        assert!(entry.file_or_shared_anon());
        assert_eq!(entry.checked_frame(VA).unwrap(), PageFrameNumber::new(0x2_3456));
    }

    #[test]
    fn reject_non_resident_pages() {
        let entry = PagemapEntry::from_bits(0x1234);
        assert!(matches!(entry.checked_frame(VA), Err(ResolveError::NotPresent(_))));
    }

    #[test]
    fn reject_swapped_pages() {
        let entry = PagemapEntry::from_bits((1 << 62) | 0x1234);
        assert!(matches!(entry.checked_frame(VA), Err(ResolveError::Swapped(_))));
    }

    #[test]
    fn reject_hidden_frames() {
        let entry = PagemapEntry::new().with_present(true);
        assert!(matches!(entry.checked_frame(VA), Err(ResolveError::ZeroFrame(_))));
    }

    #[test]
    fn own_pagemap_is_readable() {
        let Ok(resolver) = PagemapResolver::open() else {
            return; // procfs not mounted
        };
        let value = Box::new(0u64);
        let va = VirtualAddress::from_ptr(&raw const *value);
        assert!(resolver.entry(va).is_ok());
    }
}
