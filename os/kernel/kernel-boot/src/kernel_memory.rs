//! Runtime access to the frame allocator and the kernel address space.

use core::fmt;
use core::marker::PhantomData;
use kernel_alloc::{BitmapFrameAlloc, FrameAllocError};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_sync::{InterruptControl, IrqMutex, RawSpin, SpinMutex};
use kernel_vmem::{AddressSpace, MapPageError, PhysMapper};

/// The state [`KernelMemory`] guards.
pub struct MemoryCore<'b, 'm, M: PhysMapper> {
    pub frames: BitmapFrameAlloc<'b>,
    pub space: AddressSpace<'m, M>,
}

/// Frame allocator and address space behind one spin lock.
///
/// Every method takes the lock with interrupts masked through `C` and
/// releases it before returning.
pub struct KernelMemory<'b, 'm, M: PhysMapper, C: InterruptControl> {
    core: SpinMutex<MemoryCore<'b, 'm, M>>,
    _irq: PhantomData<fn() -> C>,
}

impl<'b, 'm, M: PhysMapper, C: InterruptControl> KernelMemory<'b, 'm, M, C> {
    #[must_use]
    pub const fn new(frames: BitmapFrameAlloc<'b>, space: AddressSpace<'m, M>) -> Self {
        Self {
            core: SpinMutex::new(MemoryCore { frames, space }),
            _irq: PhantomData,
        }
    }

    /// Lock both halves for a compound operation.
    #[inline]
    #[must_use]
    pub fn lock(&self) -> IrqMutex<'_, MemoryCore<'b, 'm, M>, RawSpin, C> {
        self.core.lock_irq_with::<C>()
    }

    /// Run `f` on the frame allocator.
    pub fn with_frames<U>(&self, f: impl FnOnce(&mut BitmapFrameAlloc<'b>) -> U) -> U {
        f(&mut self.lock().frames)
    }

    /// See [`BitmapFrameAlloc::request`].
    ///
    /// # Errors
    /// See [`BitmapFrameAlloc::request`].
    pub fn request_frames(&self, count: u64) -> Result<PhysicalAddress, FrameAllocError> {
        self.with_frames(|frames| frames.request(count))
    }

    /// See [`BitmapFrameAlloc::free`].
    ///
    /// # Panics
    /// On a double free, a misaligned address or a range beyond the managed
    /// frames.
    pub fn free_frames(&self, address: PhysicalAddress, count: u64) {
        self.with_frames(|frames| frames.free(address, count));
    }

    /// See [`BitmapFrameAlloc::try_free`].
    ///
    /// # Errors
    /// See [`BitmapFrameAlloc::try_free`].
    pub fn try_free_frames(&self, address: PhysicalAddress, count: u64) -> Result<(), FrameAllocError> {
        self.with_frames(|frames| frames.try_free(address, count))
    }

    /// Map `va` to `pa` in the kernel address space, taking table frames from
    /// the allocator.
    ///
    /// # Errors
    /// See [`AddressSpace::map_page`].
    pub fn map_page(&self, va: VirtualAddress, pa: PhysicalAddress) -> Result<(), MapPageError> {
        let mut core = self.lock();
        let MemoryCore { frames, space } = &mut *core;
        space.map_page(frames, va, pa)
    }

    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.lock().space.query(va)
    }

    #[must_use]
    pub fn root(&self) -> Option<PhysicalAddress> {
        self.lock().space.root()
    }

    #[must_use]
    pub fn free_frame_count(&self) -> u64 {
        self.lock().frames.free_frames()
    }

    /// Give up the lock and hand back both halves.
    pub fn into_parts(self) -> (BitmapFrameAlloc<'b>, AddressSpace<'m, M>) {
        let MemoryCore { frames, space } = self.core.into_inner();
        (frames, space)
    }
}

impl<M: PhysMapper, C: InterruptControl> fmt::Debug for KernelMemory<'_, '_, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.try_lock_irq_with::<C>() {
            Some(core) => f
                .debug_struct("KernelMemory")
                .field("frames", &core.frames)
                .field("root", &core.space.root())
                .finish(),
            None => f.debug_struct("KernelMemory").finish_non_exhaustive(),
        }
    }
}
