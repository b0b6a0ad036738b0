//! # Kernel synchronization primitives
//!
//! The memory core is single-threaded and run-to-completion; what it needs is
//! protection against *re-entry* from interrupt handlers. [`SpinMutex`] gives
//! exclusive access, and [`Mutex::lock_irq_with`] additionally keeps interrupts
//! masked for as long as the guard lives.
//!
//! Interrupt masking goes through [`InterruptControl`] so the guard logic can
//! be exercised on the host; [`CpuInterrupts`](irq::CpuInterrupts) is the
//! `cli`/`sti` implementation.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod mutex;
mod raw_spin;

pub use irq::{InterruptControl, IrqGuard, IrqMutex};
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

/// Acquire half of a raw lock.
pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

/// Release half of a raw lock.
pub trait RawUnlock {
    /// # Safety
    /// The lock must be held by the caller.
    unsafe fn raw_unlock(&self);
}
