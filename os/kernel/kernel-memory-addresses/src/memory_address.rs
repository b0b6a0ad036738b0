use crate::{MemoryAddressOffset, MemoryPage, PageSize};
use core::fmt;

/// A raw 64-bit address that has not been tagged physical or virtual.
///
/// [`PhysicalAddress`](super::PhysicalAddress) and
/// [`VirtualAddress`](super::VirtualAddress) wrap it and forward the
/// arithmetic.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddress(u64);

impl MemoryAddress {
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn page<S: PageSize>(self) -> MemoryPage<S> {
        MemoryPage::<S>::from_addr(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> MemoryAddressOffset<S> {
        MemoryAddressOffset::from_addr(self)
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0 & S::MASK == 0
    }

    /// Round down to a multiple of `S::SIZE`.
    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !S::MASK)
    }

    /// Round up to a multiple of `S::SIZE`; `None` past the top of the address space.
    #[inline]
    #[must_use]
    pub const fn align_up<S: PageSize>(self) -> Option<Self> {
        match self.0.checked_add(S::MASK) {
            Some(v) => Some(Self(v & !S::MASK)),
            None => None,
        }
    }

    /// Whether every set bit lies below bit `bits`.
    #[inline]
    #[must_use]
    pub const fn fits_width(self, bits: u32) -> bool {
        bits >= u64::BITS || self.0 >> bits == 0
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryAddress(0x{:016X})", self.0)
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Size4K;

    #[test]
    fn alignment_helpers() {
        let a = MemoryAddress::new(0x1234);
        assert_eq!(a.align_down::<Size4K>(), MemoryAddress::new(0x1000));
        assert_eq!(a.align_up::<Size4K>(), Some(MemoryAddress::new(0x2000)));
        assert_eq!(
            MemoryAddress::new(0x2000).align_up::<Size4K>(),
            Some(MemoryAddress::new(0x2000))
        );
        assert_eq!(MemoryAddress::new(u64::MAX).align_up::<Size4K>(), None);
        assert!(MemoryAddress::new(0).is_aligned::<Size4K>());
    }

    #[test]
    fn fits_width_edges() {
        assert!(MemoryAddress::new(0).fits_width(0));
        assert!(!MemoryAddress::new(1).fits_width(0));
        assert!(MemoryAddress::new(0xFFFF_FFFF_FFFF).fits_width(48));
        assert!(!MemoryAddress::new(0x1_0000_0000_0000).fits_width(48));
    }
}
