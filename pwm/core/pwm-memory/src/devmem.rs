//! # Peripheral Register Windows over `/dev/mem`
//!
//! Each window maps the page(s) covering one peripheral block and keeps a
//! pointer to the first register, which need not be page aligned: DMA
//! channel 14, for instance, starts `0xE00` bytes into its page.

use nix::errno::Errno;
use nix::libc;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};
use pwm_addresses::{PhysicalAddress, Size4K};
use pwm_platform::{Block, Platform};
use pwm_registers::RegisterWindow;
use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::NonNull;

const DEV_MEM: &str = "/dev/mem";

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("failed to open /dev/mem (are you root?): {0}")]
    Open(#[source] std::io::Error),
    #[error("register window {block} is empty")]
    Empty { block: &'static str },
    #[error("physical address {base} of {block} does not fit the mmap offset type")]
    Offset {
        block: &'static str,
        base: PhysicalAddress,
    },
    #[error("failed to map {block} registers at {base}: {source}")]
    Map {
        block: &'static str,
        base: PhysicalAddress,
        #[source]
        source: Errno,
    },
}

/// An open handle on physical memory.
#[derive(Debug)]
pub struct DevMem {
    file: File,
}

impl DevMem {
    /// Open `/dev/mem` for synchronous read/write access.
    ///
    /// # Errors
    /// [`MapError::Open`], usually for lack of privilege.
    pub fn open() -> Result<Self, MapError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(DEV_MEM)
            .map_err(MapError::Open)?;
        Ok(Self { file })
    }

    /// Map `len` bytes of `block`, starting `offset` bytes into the block.
    ///
    /// # Errors
    /// [`MapError`] if the range cannot be mapped.
    pub fn map_block(
        &self,
        platform: &Platform,
        block: Block,
        offset: usize,
        len: usize,
    ) -> Result<MappedRegisters, MapError> {
        let base = platform.block_base(block) + offset as u64;
        self.map(block.name(), base, len)
    }

    /// Map `len` bytes of registers starting at physical address `base`.
    ///
    /// # Errors
    /// [`MapError`] if the range cannot be mapped.
    pub fn map(
        &self,
        block: &'static str,
        base: PhysicalAddress,
        len: usize,
    ) -> Result<MappedRegisters, MapError> {
        if len == 0 {
            return Err(MapError::Empty { block });
        }
        let (page, in_page) = base.split::<Size4K>();
        let in_page = in_page.as_usize();
        let map_len = NonZeroUsize::new((in_page + len).next_multiple_of(crate::PAGE_SIZE))
            .ok_or(MapError::Empty { block })?;
        let offset = libc::off_t::try_from(page.base().as_u64())
            .map_err(|_| MapError::Offset { block, base })?;

        // SAFETY: mapping device memory does not alias any Rust-owned allocation.
        let mapping = unsafe {
            mmap(
                None,
                map_len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &self.file,
                offset,
            )
        }
        .map_err(|source| MapError::Map {
            block,
            base,
            source,
        })?;

        log::debug!("mapped {block} registers at {base} ({len:#X} bytes)");
        Ok(MappedRegisters {
            block,
            mapping,
            map_len: map_len.get(),
            // SAFETY: `in_page < map_len`.
            regs: unsafe { mapping.cast::<u32>().byte_add(in_page) },
            len,
        })
    }
}

/// Sole owner of one mapped peripheral block.
#[derive(Debug)]
pub struct MappedRegisters {
    block: &'static str,
    mapping: NonNull<c_void>,
    map_len: usize,
    regs: NonNull<u32>,
    len: usize,
}

impl MappedRegisters {
    fn word(&self, offset: usize) -> NonNull<u32> {
        assert!(
            offset.is_multiple_of(4) && offset + 4 <= self.len,
            "register offset {offset:#X} outside the {} window",
            self.block
        );
        // SAFETY: checked against the window length above.
        unsafe { self.regs.byte_add(offset) }
    }
}

impl RegisterWindow for MappedRegisters {
    fn block(&self) -> &'static str {
        self.block
    }

    fn load_raw(&self, offset: usize) -> u32 {
        // SAFETY: in-window, aligned, and mapped for our lifetime.
        unsafe { self.word(offset).read_volatile() }
    }

    fn store_raw(&mut self, offset: usize, value: u32) {
        log::trace!("{}[{offset:#05X}] <- {value:#010X}", self.block);
        // SAFETY: in-window, aligned, and mapped for our lifetime.
        unsafe { self.word(offset).write_volatile(value) }
    }
}

impl Drop for MappedRegisters {
    fn drop(&mut self) {
        // SAFETY: nothing references the window any more.
        if let Err(e) = unsafe { munmap(self.mapping, self.map_len) } {
            log::error!("failed to unmap {} registers: {e}", self.block);
        }
    }
}
