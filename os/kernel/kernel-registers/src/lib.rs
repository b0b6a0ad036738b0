//! # Typed `X86_64` Registers
//!
//! Bitfield models of the control registers the memory core touches:
//!
//! * [`Cr3`](cr3::Cr3): root of the active page-table hierarchy.
//! * [`Rflags`](rflags::Rflags): interrupt-enable state for the exclusion guard.
//!
//! The models themselves are plain values and usable on any host. Reading or
//! writing the hardware register requires the `asm` feature and an `x86_64`
//! target; every such access is `unsafe` and privileged.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(feature = "rflags")]
pub mod rflags;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
