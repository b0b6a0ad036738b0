use crate::{Mutex, MutexGuard, RawLock, RawUnlock};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// Masking and unmasking of maskable hardware interrupts.
pub trait InterruptControl {
    /// Whether maskable interrupts are currently delivered.
    fn interrupts_enabled() -> bool;

    /// Stop delivery of maskable interrupts (`cli`).
    fn disable();

    /// Resume delivery of maskable interrupts (`sti`).
    fn enable();
}

/// The executing CPU's `RFLAGS.IF`.
///
/// # Safety & Privilege
///
/// `cli`/`sti` are only legal at CPL0 (or with sufficient IOPL). Using this
/// from user space raises `#GP`.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Copy, Clone)]
pub struct CpuInterrupts;

#[cfg(target_arch = "x86_64")]
impl InterruptControl for CpuInterrupts {
    #[inline]
    fn interrupts_enabled() -> bool {
        use kernel_registers::LoadRegisterUnsafe;
        use kernel_registers::rflags::Rflags;
        // SAFETY: reading RFLAGS is unprivileged.
        unsafe { Rflags::load_unsafe() }.if_interrupt_enable()
    }

    #[inline]
    fn disable() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    fn enable() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
    }
}

/// RAII guard that disables interrupts on creation and restores them on drop.
///
/// The guard snapshots the interrupt state. If interrupts were enabled, it
/// disables them; on drop it re-enables them **only** if they were enabled
/// before, so guards nest correctly.
pub struct IrqGuard<C: InterruptControl> {
    /// Whether interrupts were enabled when the guard was created.
    were_enabled: bool,
    _control: PhantomData<C>,
}

impl<C: InterruptControl> IrqGuard<C> {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let enabled = C::interrupts_enabled();
        if enabled {
            C::disable();
        }
        Self {
            were_enabled: enabled,
            _control: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn were_enabled(&self) -> bool {
        self.were_enabled
    }
}

impl<C: InterruptControl> Default for IrqGuard<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: InterruptControl> Drop for IrqGuard<C> {
    fn drop(&mut self) {
        if self.were_enabled {
            C::enable();
        }
    }
}

/// A mutex guard that also keeps interrupts disabled while held.
///
/// Interrupts are masked *before* the lock is taken and restored *after* it
/// is released, so a handler can never spin on a lock its own CPU holds.
pub struct IrqMutex<'a, T, R: RawLock + RawUnlock, C: InterruptControl> {
    // Field order is drop order: unlock first, then restore interrupts.
    guard: MutexGuard<'a, T, R>,
    _irq: IrqGuard<C>,
}

impl<T, R: RawLock + RawUnlock, C: InterruptControl> Deref for IrqMutex<'_, T, R, C> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R: RawLock + RawUnlock, C: InterruptControl> DerefMut for IrqMutex<'_, T, R, C> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Acquire the mutex with interrupts masked through `C` for the guard's lifetime.
    #[inline]
    pub fn lock_irq_with<C: InterruptControl>(&self) -> IrqMutex<'_, T, R, C> {
        let irq = IrqGuard::<C>::new();
        let guard = self.lock();
        IrqMutex { guard, _irq: irq }
    }

    /// Non-spinning [`lock_irq_with`](Self::lock_irq_with).
    ///
    /// Interrupts are masked before the attempt and restored if it fails.
    #[inline]
    pub fn try_lock_irq_with<C: InterruptControl>(&self) -> Option<IrqMutex<'_, T, R, C>> {
        let irq = IrqGuard::<C>::new();
        let guard = self.try_lock()?;
        Some(IrqMutex { guard, _irq: irq })
    }

    /// [`lock_irq_with`](Self::lock_irq_with) on the executing CPU.
    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub fn lock_irq(&self) -> IrqMutex<'_, T, R, CpuInterrupts> {
        self.lock_irq_with::<CpuInterrupts>()
    }
}
