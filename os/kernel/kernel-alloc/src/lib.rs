//! # Kernel Physical Memory Allocation
//!
//! Frame-granular physical memory management for the kernel, from the first
//! instruction after `ExitBootServices` onwards.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │          Page Table Manager (kernel-vmem)           │
//! │    • asks for one frame per new table               │
//! └─────────────────┬──────────────────┬────────────────┘
//!                   │ PhysFrameAlloc   │ PhysMapper
//! ┌─────────────────▼────────┐ ┌───────▼────────────────┐
//! │  Frame Allocator         │ │  Physical Mapper       │
//! │  • bitmap, 1 bit/frame   │ │  • identity / offset   │
//! │  • first-fit runs        │ │  • PA → &mut T         │
//! └──────────────────────────┘ └────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Physical Frame Allocator ([`frame_alloc`])
//!
//! * **Bitmap**: one bit per 4 KiB frame, set = used.
//! * **No heap**: the bitmap lives in caller-provided storage.
//! * **Firmware driven**: only boot-services and conventional memory is ever
//!   handed out.
//! * **Strict frees**: freeing a frame that is not in use panics.
//!
//! ### Physical Mapper ([`phys_mapper`])
//!
//! Turns a [`PhysicalAddress`](kernel_memory_addresses::PhysicalAddress) into
//! a reference so page tables can be edited.
//!
//! ## Memory Overhead
//!
//! One bit per frame: a 16 MiB bitmap covers the full 512 GiB
//! [`BITMAP_CAPACITY`](kernel_info::memory::BITMAP_CAPACITY).

#![cfg_attr(not(any(test, doctest)), no_std)]

mod bitmap;
pub mod frame_alloc;
pub mod phys_mapper;

pub use frame_alloc::{BitmapFrameAlloc, FrameAllocError, FrameAllocInitError};
