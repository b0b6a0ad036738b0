//! # Kernel Memory Bring-Up
//!
//! Glue between the loader hand-off and the memory subsystems. The order is
//! fixed:
//!
//! ```text
//! KernelBootInfo ──► MemoryMap ──► BitmapFrameAlloc::initialize
//!                                        │
//!                                        ▼
//!                       AddressSpace::initialize_kernel_map (identity, 0..total)
//!                                        │
//!                                        ▼
//!                              AddressSpace::activate ──► CR3
//!                                        │
//!                                        ▼
//!                                  KernelMemory
//! ```
//!
//! [`bring_up`] runs the sequence with interrupts masked and returns a
//! [`KernelMemory`]: the allocator and the address space behind one spin lock.
//! Every later access takes that lock with interrupts masked.
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(target_arch = "x86_64")]
//! # fn boot(
//! #     info: &kernel_info::boot::KernelBootInfo,
//! #     bitmap: &'static mut [u64],
//! # ) -> Result<(), kernel_boot::BootstrapError> {
//! let map = unsafe { kernel_boot::memory_map_from_boot_info(info)? };
//! let memory = unsafe { kernel_boot::bring_up_identity(bitmap, &map)? };
//! let stack = memory.request_frames(4);
//! # let _ = stack;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod bring_up;
mod kernel_memory;

pub use bring_up::{BootstrapError, bring_up, memory_map_from_boot_info};
#[cfg(target_arch = "x86_64")]
pub use bring_up::{CpuKernelMemory, bring_up_identity};
pub use kernel_memory::{KernelMemory, MemoryCore};

/// Install the QEMU debug-port logger with `level` as the global maximum.
///
/// # Errors
/// A logger was already installed.
#[cfg(feature = "qemu")]
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    kernel_qemu::QemuLogger::init(level)
}
