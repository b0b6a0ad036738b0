use crate::KernelMemory;
use kernel_alloc::{BitmapFrameAlloc, FrameAllocInitError};
use kernel_info::boot::KernelBootInfo;
use kernel_info::memory_map::{EFI_DESCRIPTOR_SIZE, MemoryDescriptor, MemoryMap, MemoryMapError};
use kernel_sync::{InterruptControl, IrqGuard};
use kernel_vmem::{ActivateError, AddressSpace, MapPageError, PhysMapper, RootRegister};
use log::info;

#[cfg(target_arch = "x86_64")]
use kernel_alloc::phys_mapper::IdentityPhysMapper;
#[cfg(target_arch = "x86_64")]
use kernel_sync::irq::CpuInterrupts;
#[cfg(target_arch = "x86_64")]
use kernel_vmem::Cr3Register;

/// Failure of one bring-up step.
#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum BootstrapError {
    #[error("memory map: {0}")]
    MemoryMap(#[from] MemoryMapError),
    #[error("frame allocator: {0}")]
    FrameAlloc(#[from] FrameAllocInitError),
    #[error("identity map: {0}")]
    Map(#[from] MapPageError),
    #[error("activation: {0}")]
    Activate(#[from] ActivateError),
}

/// View the loader's memory map buffer.
///
/// A missing buffer yields an empty map.
///
/// # Errors
/// [`MemoryMapError::DescriptorTooSmall`] for a bogus descriptor stride.
///
/// # Safety
/// `info.mmap` must describe a readable buffer that stays untouched for the
/// rest of the kernel's life.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn memory_map_from_boot_info(info: &KernelBootInfo) -> Result<MemoryMap<'static>, MemoryMapError> {
    let mmap = &info.mmap;
    if !mmap.is_present() {
        return MemoryMap::new(&[], EFI_DESCRIPTOR_SIZE);
    }

    // SAFETY: the caller vouches for the buffer.
    let bytes = unsafe { core::slice::from_raw_parts(mmap.mmap_ptr as usize as *const u8, mmap.mmap_len as usize) };
    let map = MemoryMap::new(bytes, mmap.mmap_desc_size as usize)?;
    info!(
        "memory map: {} descriptors, stride {} bytes, version {}",
        map.len(),
        mmap.mmap_desc_size,
        mmap.mmap_desc_version
    );
    Ok(map)
}

/// Build the frame allocator, identity-map every managed frame and switch to
/// the new address space.
///
/// Interrupts stay masked through `C` for the whole sequence. Any failing step
/// aborts the rest; the register is only written if everything before it
/// succeeded.
///
/// # Errors
/// The first failing step, wrapped in [`BootstrapError`].
///
/// # Safety
/// - `mapper` must reach every frame the allocator hands out.
/// - See [`RootRegister::install`]: the executing code, its stack and the
///   bitmap `storage` must lie in memory the identity map covers.
pub unsafe fn bring_up<'b, 'm, M, R, C, I>(
    storage: &'b mut [u64],
    descriptors: I,
    mapper: &'m M,
    register: &mut R,
) -> Result<KernelMemory<'b, 'm, M, C>, BootstrapError>
where
    M: PhysMapper,
    R: RootRegister,
    C: InterruptControl,
    I: IntoIterator<Item = MemoryDescriptor>,
{
    let _irq = IrqGuard::<C>::new();

    let mut frames = BitmapFrameAlloc::initialize(storage, descriptors)?;
    let mut space = AddressSpace::new(mapper);
    space.initialize_kernel_map(&mut frames)?;
    unsafe { space.activate_with(register)? };

    info!(
        "memory online: {} of {} frames free after building the kernel map",
        frames.free_frames(),
        frames.total_frames()
    );
    Ok(KernelMemory::new(frames, space))
}

/// [`KernelMemory`] on the executing CPU under the firmware's identity map.
#[cfg(target_arch = "x86_64")]
pub type CpuKernelMemory<'b> = KernelMemory<'b, 'static, IdentityPhysMapper, CpuInterrupts>;

/// [`bring_up`] with the identity mapper, CR3 and `cli`/`sti`.
///
/// This is the configuration right after `ExitBootServices`: firmware left
/// all RAM identity mapped, and the new kernel map keeps it that way.
///
/// # Errors
/// See [`bring_up`].
///
/// # Safety
/// See [`bring_up`]. Must run at CPL0.
#[cfg(target_arch = "x86_64")]
pub unsafe fn bring_up_identity<'b, I>(storage: &'b mut [u64], descriptors: I) -> Result<CpuKernelMemory<'b>, BootstrapError>
where
    I: IntoIterator<Item = MemoryDescriptor>,
{
    static IDENTITY: IdentityPhysMapper = IdentityPhysMapper;
    unsafe { bring_up(storage, descriptors, &IDENTITY, &mut Cr3Register) }
}
