use crate::{PageOffset, PageSize, VirtualPage};
use core::fmt;
use core::ops::Add;
use core::ptr::NonNull;

/// Virtual memory address in the current process.
///
/// Pointer-sized, so it is 32 bits wide on the 32-bit Raspberry Pi kernels
/// and 64 bits wide on `aarch64`. It carries no provenance; it is only used to
/// index `/proc/self/pagemap` and to describe mappings in logs.
///
/// ### Examples
/// ```rust
/// # use pwm_addresses::*;
/// let va = VirtualAddress::new(0x7654_3ABC);
/// let (vp, off) = va.split::<Size4K>();
/// assert_eq!(vp.join(off), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(usize);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub fn from_nonnull<T>(ptr: NonNull<T>) -> Self {
        Self::from_ptr(ptr.as_ptr())
    }

    #[inline]
    #[must_use]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr.addr())
    }

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

    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> VirtualPage<S> {
        VirtualPage::containing(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> PageOffset<S> {
        PageOffset::truncate(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn split<S: PageSize>(self) -> (VirtualPage<S>, PageOffset<S>) {
        (self.page::<S>(), self.offset::<S>())
    }

    /// Index of the page containing this address, as used by `/proc/<pid>/pagemap`.
    #[inline]
    #[must_use]
    pub const fn page_number<S: PageSize>(self) -> usize {
        self.0 >> S::SHIFT
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0 & (S::SIZE - 1) == 0
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA({:#010X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

impl From<usize> for VirtualAddress {
    #[inline]
    fn from(v: usize) -> Self {
        Self::new(v)
    }
}

impl Add<usize> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}
