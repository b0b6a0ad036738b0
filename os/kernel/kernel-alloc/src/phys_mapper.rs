//! # Physical Mappers for Kernel Page Tables
//!
//! [`PhysMapper`] implementations for the two situations the kernel runs in:
//!
//! - [`IdentityPhysMapper`]: physical address `pa` is reachable at virtual
//!   address `pa`. True under the UEFI page tables and, after activation,
//!   under the kernel's own identity map.
//! - [`OffsetPhysMapper`]: physical memory is mirrored at a fixed virtual
//!   offset.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::phys_mapper::OffsetPhysMapper;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let m = OffsetPhysMapper::new(0xFFFF_8880_0000_0000);
//! assert_eq!(m.virtual_of(PhysicalAddress::new(0x1000)), 0xFFFF_8880_0000_1000);
//! ```

use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for an identity-mapped physical range.
///
/// # Safety
/// Dereferencing is only sound while the referenced range is identity mapped
/// and writable in the active page tables.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = pa.as_u64() as usize as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and identity mapped.
        unsafe { &mut *va }
    }
}

/// [`PhysMapper`] for physical memory mirrored at `offset + pa`.
#[derive(Debug, Copy, Clone)]
pub struct OffsetPhysMapper {
    offset: u64,
}

impl OffsetPhysMapper {
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Virtual address at which `pa` is visible.
    #[inline]
    #[must_use]
    pub const fn virtual_of(&self, pa: PhysicalAddress) -> u64 {
        self.offset.wrapping_add(pa.as_u64())
    }
}

impl PhysMapper for OffsetPhysMapper {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = self.virtual_of(pa) as usize as *mut T;
        // SAFETY: Caller must ensure the physical address is valid and mapped at the offset.
        unsafe { &mut *va }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_mapper_returns_same_address() {
        let mut slot = 0x1234_u64;
        let pa = PhysicalAddress::new(&raw mut slot as usize as u64);
        let r: &mut u64 = unsafe { IdentityPhysMapper.phys_to_mut(pa) };
        *r += 1;
        assert_eq!(slot, 0x1235);
    }

    #[test]
    fn offset_mapper_adds_offset() {
        let mut slot = [0u64; 2];
        let base = &raw mut slot as usize as u64;
        let m = OffsetPhysMapper::new(base);
        let r: &mut u64 = unsafe { m.phys_to_mut(PhysicalAddress::new(8)) };
        *r = 7;
        assert_eq!(slot, [0, 7]);
    }
}
