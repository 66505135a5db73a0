use crate::{PageOffset, PageSize};
use core::fmt;
use core::ops::Add;

/// A byte offset from the start of a DMA arena.
///
/// Offsets are what the descriptor builder and the sample regenerator agree
/// on; the page table turns them into bus addresses.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ArenaOffset(usize);

impl ArenaOffset {
    #[inline]
    #[must_use]
    pub const fn new(v: usize) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Index of the arena page this offset falls into.
    #[inline]
    #[must_use]
    pub const fn page_index<S: PageSize>(self) -> usize {
        self.0 >> S::SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn in_page<S: PageSize>(self) -> PageOffset<S> {
        PageOffset::truncate(self.0)
    }

    /// `true` if aligned to `align` bytes (power of two).
    #[inline]
    #[must_use]
    pub const fn is_aligned(self, align: usize) -> bool {
        self.0 & (align - 1) == 0
    }

    /// Round up to the next multiple of `align` (power of two).
    #[inline]
    #[must_use]
    pub const fn align_up(self, align: usize) -> Self {
        Self((self.0 + align - 1) & !(align - 1))
    }
}

impl fmt::Debug for ArenaOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaOffset({:#X})", self.0)
    }
}

impl Add<usize> for ArenaOffset {
    type Output = Self;
    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}
