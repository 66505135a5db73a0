use crate::{PageSize, PhysicalAddress, PhysicalPage};
use core::fmt;

/// Physical page frame number (PFN).
///
/// This is the unit the kernel reports in `/proc/<pid>/pagemap`; shifting it
/// by the page size yields the physical page base.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageFrameNumber(u64);

impl PageFrameNumber {
    #[inline]
    #[must_use]
    pub const fn new(pfn: u64) -> Self {
        Self(pfn)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// `true` for the frame number the kernel reports to unprivileged readers.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> PhysicalPage<S> {
        PhysicalPage::containing(PhysicalAddress::new(self.0 << S::SHIFT))
    }
}

impl fmt::Debug for PageFrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PFN({:#X})", self.0)
    }
}
