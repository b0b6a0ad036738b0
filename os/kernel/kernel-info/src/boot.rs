//! # Kernel Boot Information

/// Kernel function pointer.
///
/// # ABI
/// The ABI is defined as `win64` since the kernel is called from a UEFI
/// (PE/COFF) application.
pub type KernelEntryFn = extern "win64" fn(*const KernelBootInfo) -> !;

/// Information the kernel needs right after `ExitBootServices`.
/// Keep this `#[repr(C)]` and prefer fixed-size integers at the ABI boundary.
#[repr(C)]
#[derive(Clone, Debug)]
pub struct KernelBootInfo {
    /// Memory map information.
    pub mmap: MemoryMapInfo,
}

#[repr(C)]
#[derive(Clone, Debug)]
pub struct MemoryMapInfo {
    /// Pointer to the raw UEFI memory map buffer (array of `EFI_MEMORY_DESCRIPTOR` bytes).
    pub mmap_ptr: u64,

    /// Length of the memory map buffer in **bytes**.
    pub mmap_len: u64,

    /// Size of a single memory descriptor in bytes. Firmware may report a
    /// stride larger than the descriptor itself; always step by this value.
    pub mmap_desc_size: u64,

    /// Descriptor version (from UEFI).
    pub mmap_desc_version: u32,
}

impl MemoryMapInfo {
    /// Whether the loader handed over a buffer at all.
    #[inline]
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.mmap_ptr != 0 && self.mmap_len != 0
    }

    /// Number of whole descriptors in the buffer.
    #[inline]
    #[must_use]
    pub const fn descriptor_count(&self) -> u64 {
        if self.mmap_desc_size == 0 {
            0
        } else {
            self.mmap_len / self.mmap_desc_size
        }
    }
}
