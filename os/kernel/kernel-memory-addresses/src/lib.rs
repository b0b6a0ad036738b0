//! # Physical and Virtual Frame Addresses
//!
//! Strongly typed wrappers for the raw 64-bit addresses handled by the frame
//! allocator and the page-table manager.
//!
//! ## Overview
//!
//! Physical and virtual addresses are both plain `u64` values on x86-64, but
//! they live in different worlds: a physical address names a frame of RAM (or
//! MMIO), a virtual address is only meaningful after translation through the
//! active page tables. Mixing them up is the classic early-boot bug, and the
//! only thing that makes it "work" is an identity map. These types keep the
//! two apart at compile time:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`MemoryAddress`] | Raw address of unknown kind, used internally. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Physical memory; a page is an aligned frame base. |
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Addresses that go through paging. |
//! | [`MemoryAddressOffset<S>`] | Byte offset inside a page of size `S`. |
//!
//! Only 4 KiB pages ([`Size4K`]) exist: the memory core never creates huge
//! mappings, so the [`PageSize`] trait is sealed to that single marker.
//!
//! ## Frames
//!
//! A *frame* is a 4 KiB-aligned unit of physical memory. Frame indices are
//! what the bitmap allocator tracks (`index = address / 4096`):
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::from_frame_index(0x100);
//! assert_eq!(pa.as_u64(), 0x10_0000);
//! assert_eq!(pa.frame_index(), 0x100);
//! assert!(pa.is_aligned::<Size4K>());
//! assert!(PhysicalAddress::new(0x10_0010).checked_page::<Size4K>().is_none());
//! ```
//!
//! ## Splitting and joining
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0040_1234);
//! let (page, off) = va.split::<Size4K>();
//! assert_eq!(page.base().as_u64(), 0x0040_1000);
//! assert_eq!(off.as_u64(), 0x234);
//! assert_eq!(page.join(off), va);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address;
mod memory_page;
mod page_size;
mod physical_address;
mod virtual_address;

pub use crate::memory_address::MemoryAddress;
pub use crate::memory_page::{MemoryAddressOffset, MemoryPage};
pub use crate::page_size::{PageSize, Size4K};
pub use crate::physical_address::{PhysicalAddress, PhysicalPage};
pub use crate::virtual_address::{VirtualAddress, VirtualPage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_round_trips_through_address() {
        for index in [0_u64, 1, 0x100, 0x7_FFFF] {
            let pa = PhysicalAddress::from_frame_index(index);
            assert_eq!(pa.frame_index(), index);
            assert!(pa.is_aligned::<Size4K>());
        }
    }

    #[test]
    fn frame_index_truncates_in_page_offset() {
        assert_eq!(PhysicalAddress::new(0x1FFF).frame_index(), 1);
    }

    #[test]
    fn checked_page_rejects_unaligned() {
        assert!(PhysicalAddress::new(0x1000).checked_page::<Size4K>().is_some());
        assert!(PhysicalAddress::new(0x1001).checked_page::<Size4K>().is_none());
        assert!(VirtualAddress::new(0x40_0000).checked_page::<Size4K>().is_some());
        assert!(VirtualAddress::new(0x40_0800).checked_page::<Size4K>().is_none());
    }

    #[test]
    fn page_aligns_down() {
        let pp = PhysicalAddress::new(0x1234_5678).page::<Size4K>();
        assert_eq!(pp.base().as_u64(), 0x1234_5000);
        let vp = VirtualPage::<Size4K>::containing_address(VirtualAddress::new(0xFFF));
        assert_eq!(vp.base(), VirtualAddress::zero());
    }

    #[test]
    fn width_check() {
        assert!(PhysicalAddress::new((1 << 48) - 4096).fits_width(48));
        assert!(!PhysicalAddress::new(1 << 48).fits_width(48));
        assert!(PhysicalAddress::new(u64::MAX).fits_width(64));
    }

    #[test]
    fn canonical_hole() {
        for v in [0, 0x0000_7FFF_FFFF_F000, 0xFFFF_8000_0000_0000, 0xFFFF_FFFF_8000_0000] {
            assert!(VirtualAddress::new(v).is_canonical(), "{v:#x}");
        }
        for v in [0x0000_8000_0000_0000, 0x0001_0000_0000_0000, 0xFFFF_7FFF_FFFF_F000] {
            assert!(!VirtualAddress::new(v).is_canonical(), "{v:#x}");
        }
    }

    #[test]
    fn formatting() {
        let pa = PhysicalAddress::new(0x40_0000);
        assert_eq!(format!("{pa}"), "0x0000000000400000");
        assert_eq!(format!("{pa:?}"), "PA(0x0000000000400000)");
        let va = VirtualAddress::new(0x1000);
        assert_eq!(format!("{va:?}"), "VA(0x0000000000001000)");
        assert_eq!(format!("{}", va.page::<Size4K>()), "0x0000000000001000/4K");
    }
}
