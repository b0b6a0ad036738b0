//! # Kernel Configuration and Boot Interface
//!
//! Shared constants and hand-off structures that the boot loader, the frame
//! allocator and the page-table manager must agree on.
//!
//! ## Modules
//!
//! ### Boot Information ([`boot`])
//! The loader-to-kernel hand-off:
//! * **Kernel Entry Point**: function signature and calling convention
//! * **Memory Map Location**: pointer, length and stride of the UEFI map
//!
//! ### Memory Layout ([`memory`])
//! Compile-time configuration of the memory core:
//! * **Frame size** and **physical address width**
//! * **Bitmap capacity**: how much RAM the frame allocator can describe
//!
//! ### Memory Map ([`memory_map`])
//! Firmware region types and a safe walker over the raw descriptor buffer.
//!
//! ## Physical Memory as Seen by the Allocator
//!
//! ```text
//! frame index:  0        256              272                 BITMAP_CAPACITY
//!               ┌────────┬────────────────┬───────── ... ──────┐
//!               │  used  │ Conventional   │ used / not present │
//!               └────────┴────────────────┴───────── ... ──────┘
//!                         ^ 0x10_0000      ^ 0x11_0000
//! ```
//!
//! Everything starts out *used*; only ranges whose firmware type is usable
//! are released into the allocator.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::memory::{BITMAP_CAPACITY, FRAME_SIZE};
//! use kernel_info::memory_map::{MemoryDescriptor, MemoryRegionType};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let d = MemoryDescriptor::new(PhysicalAddress::new(0x10_0000), 16, MemoryRegionType::Conventional);
//! assert_eq!(d.first_frame() * FRAME_SIZE, 0x10_0000);
//! assert!(d.end_frame() < BITMAP_CAPACITY);
//! ```
//!
//! This crate contains no `unsafe` code; turning the loader's raw pointer into
//! a byte slice is the caller's responsibility.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod memory_map;
