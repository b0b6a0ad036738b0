//! # Virtual Memory Support
//!
//! x86-64 4-level paging for the kernel's own address space.
//!
//! ## What you get
//! - An [`AddressSpace`] owning a `PML4` root page table.
//! - x86-64 page-table entries ([`PageEntryBits`]) as a typed bitfield.
//! - A 4 KiB-aligned [`PageTableNode`] and per-level index arithmetic ([`TableLevel`]).
//! - A tiny allocator/mapper interface ([`PhysFrameAlloc`], [`PhysMapper`]).
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! Each 48-bit virtual address is divided into five fields:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! The CPU uses these fields as **indices** into four levels of page tables,
//! each level containing 512 (2⁹) entries of 8 bytes (64 bits) each.
//!
//! ```text
//!  CR3 → PML4 → PDPT → PD → PT → 4 KiB frame
//! ```
//!
//! | Level | Table name | Entry name | Description |
//! |:------|:------------|:-----------|:-------------|
//! | 4 | **PML4** (Page Map Level 4) | **PML4E** | Top-level table; one per address space, referenced by CR3. |
//! | 3 | **PDPT** (Page Directory Pointer Table) | **PDPTE** | Each entry points to a PD. |
//! | 2 | **PD** (Page Directory) | **PDE** | Each entry points to a PT. |
//! | 1 | **PT** (Page Table) | **PTE** | Each entry maps a 4 KiB physical page. |
//!
//! Huge pages (`PS=1` at PD or PDPT) are never created, so every walk ends at
//! a PT.
//!
//! ## Building the kernel map
//!
//! ```text
//!  frame allocator ──alloc_4k──► AddressSpace::initialize_kernel_map
//!                                   │  map_page(i·4096 → i·4096) for every frame
//!                                   ▼
//!                              AddressSpace::activate ──► CR3
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

pub mod address_space;
mod page_entry_bits;
mod page_table;

#[cfg(test)]
mod testing;

#[cfg(target_arch = "x86_64")]
pub use crate::address_space::Cr3Register;
pub use crate::address_space::{ActivateError, AddressSpace, MapPageError, RootRegister};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{PageTableNode, TableLevel};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// Source of **physical** 4 KiB frames for page tables.
///
/// The implementation decides where frames come from (bitmap, bump pointer,
/// etc.). Returned frames are page aligned by construction.
pub trait PhysFrameAlloc {
    /// Allocate one 4 KiB frame, or `None` when memory is exhausted.
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>>;

    /// Number of frames this allocator manages, starting at frame 0.
    ///
    /// This is the extent identity-mapped by
    /// [`AddressSpace::initialize_kernel_map`].
    fn total_frames(&self) -> u64;
}

/// Converts physical addresses to *temporarily* usable pointers in the current
/// virtual address space (identity map or a fixed offset).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference in the current address space.
    ///
    /// # Safety
    /// - `pa` must be mapped writable in the current page tables.
    /// - The bytes at `pa` must be a valid `T`.
    /// - No other reference to the same object may be live for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}
