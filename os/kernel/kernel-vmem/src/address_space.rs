//! # Address Space (x86-64, PML4-rooted)
//!
//! Builds and activates a **single** virtual address space: a tree of
//! [`PageTableNode`]s rooted at a PML4 frame.
//!
//! ## Highlights
//!
//! - [`AddressSpace::map_page`] installs one 4 KiB mapping, creating missing
//!   intermediate tables on the way down.
//! - [`AddressSpace::initialize_kernel_map`] identity-maps every frame the
//!   allocator knows about.
//! - [`AddressSpace::query`] translates a VA in software.
//! - [`AddressSpace::activate`] loads CR3 with this space's root.
//!
//! ## Design
//!
//! - The root is allocated lazily by the first operation that needs it.
//! - New tables are filled with [`PageEntryBits::table_baseline`] before they
//!   are linked into their parent.
//! - Tables are never freed; a failed walk leaves already created tables in
//!   place.
//! - `unsafe` is confined to turning a table frame into a `&mut PageTableNode`
//!   through the [`PhysMapper`].
//!
//! ## TLB
//!
//! Nothing here issues `invlpg`. Changing a mapping that is already cached
//! in the TLB of the active space takes effect only after the next CR3 load.

use crate::page_table::{PageTableNode, TableLevel};
use crate::{PageEntryBits, PhysFrameAlloc, PhysMapper};
use kernel_info::memory::PHYSICAL_ADDRESS_BITS;
use kernel_memory_addresses::{PageSize, PhysicalAddress, Size4K, VirtualAddress};
use kernel_registers::cr3::Cr3;
use log::{debug, info};

/// Failure of [`AddressSpace::map_page`] or [`AddressSpace::initialize_kernel_map`].
#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum MapPageError {
    #[error("virtual address {0} is not canonical")]
    NonCanonicalVirtual(VirtualAddress),
    #[error("virtual address {0} is not 4 KiB aligned")]
    MisalignedVirtual(VirtualAddress),
    #[error("physical address {0} is not 4 KiB aligned")]
    MisalignedPhysical(PhysicalAddress),
    #[error("physical address {0} exceeds the 48-bit physical address width")]
    PhysicalAddressTooWide(PhysicalAddress),
    #[error("no free frame for a new {0} table")]
    OutOfFrames(TableLevel),
}

/// Failure of [`AddressSpace::activate`].
#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum ActivateError {
    #[error("address space has no root table")]
    MissingRoot,
    #[error("root table {0} is not 4 KiB aligned")]
    Misaligned(PhysicalAddress),
}

/// Destination for a new translation root.
///
/// The CPU implementation is [`Cr3Register`]; anything else is useful only for
/// observing what would have been written.
pub trait RootRegister {
    /// Make `value` the active translation root.
    ///
    /// # Safety
    /// After this call every instruction fetch and data access is translated
    /// through the new hierarchy. The currently executing code, its stack and
    /// any data it touches next must be mapped there.
    unsafe fn install(&mut self, value: Cr3);
}

/// The hardware CR3 register.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Copy, Clone)]
pub struct Cr3Register;

#[cfg(target_arch = "x86_64")]
impl RootRegister for Cr3Register {
    unsafe fn install(&mut self, value: Cr3) {
        use kernel_registers::StoreRegisterUnsafe;
        unsafe { value.store_unsafe() }
    }
}

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: Option<PhysicalAddress>,
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// An empty space; the root is created by the first mapping.
    #[inline]
    pub const fn new(mapper: &'m M) -> Self {
        Self { root: None, mapper }
    }

    /// Wrap an existing hierarchy whose PML4 lives at `root`.
    #[inline]
    pub const fn from_root(mapper: &'m M, root: PhysicalAddress) -> Self {
        Self {
            root: Some(root),
            mapper,
        }
    }

    /// View the **currently active** address space by reading CR3.
    ///
    /// # Safety
    /// - Must run at CPL0 with paging enabled.
    /// - Assumes CR3 points at a valid PML4 frame reachable through `mapper`.
    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub unsafe fn from_current(mapper: &'m M) -> Self {
        use kernel_registers::LoadRegisterUnsafe;
        let cr3 = unsafe { Cr3::load_unsafe() };
        Self::from_root(mapper, cr3.pml4_phys())
    }

    /// Physical address of the PML4, if one was created.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> Option<PhysicalAddress> {
        self.root
    }

    /// Map the 4 KiB page at `va` to the frame at `pa`, present and writable.
    ///
    /// Missing PML4/PDPT/PD/PT nodes are requested from `alloc` one frame at a
    /// time. An existing leaf is overwritten.
    ///
    /// # Errors
    /// - Non-canonical `va`, alignment and width violations are reported
    ///   before anything changes.
    /// - [`MapPageError::OutOfFrames`] names the level whose node could not be
    ///   allocated. Nodes created before the failure stay linked.
    pub fn map_page<A: PhysFrameAlloc>(
        &mut self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
    ) -> Result<(), MapPageError> {
        if !va.is_canonical() {
            return Err(MapPageError::NonCanonicalVirtual(va));
        }
        if !va.is_aligned::<Size4K>() {
            return Err(MapPageError::MisalignedVirtual(va));
        }
        if !pa.is_aligned::<Size4K>() {
            return Err(MapPageError::MisalignedPhysical(pa));
        }
        if !pa.fits_width(PHYSICAL_ADDRESS_BITS) {
            return Err(MapPageError::PhysicalAddressTooWide(pa));
        }

        let mut table = self.ensure_root(alloc)?;
        let mut level = TableLevel::Pml4;
        while let Some(child_level) = level.child() {
            let index = level.index_of(va);
            let entry = unsafe { self.node(table) }.entry(index);
            table = if entry.present() {
                entry.physical_address()
            } else {
                let child = self.new_node(alloc, child_level)?;
                unsafe { self.node(table) }.set_entry(index, PageEntryBits::next_table(child));
                child
            };
            level = child_level;
        }

        unsafe { self.node(table) }.set_entry(level.index_of(va), PageEntryBits::leaf_4k(pa));
        Ok(())
    }

    /// Identity-map frames `0..alloc.total_frames()`.
    ///
    /// Running it again rewrites every leaf with the same value, so the
    /// hierarchy is unchanged.
    ///
    /// # Errors
    /// The first [`MapPageError`] aborts the loop.
    pub fn initialize_kernel_map<A: PhysFrameAlloc>(&mut self, alloc: &mut A) -> Result<(), MapPageError> {
        self.ensure_root(alloc)?;
        let frames = alloc.total_frames();
        for index in 0..frames {
            let pa = PhysicalAddress::from_frame_index(index);
            self.map_page(alloc, VirtualAddress::new(pa.as_u64()), pa)?;
        }
        info!("identity-mapped {frames} frames ({} MiB)", (frames * Size4K::SIZE) >> 20);
        Ok(())
    }

    /// Translate `va` to the physical address it maps to.
    ///
    /// Non-canonical addresses never translate.
    #[must_use]
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        if !va.is_canonical() {
            return None;
        }
        let mut table = self.root?;
        for level in TableLevel::WALK {
            let entry = unsafe { self.node(table) }.entry(level.index_of(va));
            if !entry.present() {
                return None;
            }
            table = entry.physical_address();
        }
        table.checked_add(va.offset::<Size4K>().as_u64())
    }

    /// Load CR3 with this space's root.
    ///
    /// # Errors
    /// [`ActivateError`] if there is no root or it is misaligned; CR3 is not
    /// touched in that case.
    ///
    /// # Safety
    /// See [`RootRegister::install`]. In practice: call this only after
    /// [`initialize_kernel_map`](Self::initialize_kernel_map) succeeded.
    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub unsafe fn activate(&self) -> Result<(), ActivateError> {
        unsafe { self.activate_with(&mut Cr3Register) }
    }

    /// [`activate`](Self::activate) against an arbitrary [`RootRegister`].
    ///
    /// # Errors
    /// Same as [`activate`](Self::activate).
    ///
    /// # Safety
    /// See [`RootRegister::install`].
    pub unsafe fn activate_with<R: RootRegister>(&self, register: &mut R) -> Result<(), ActivateError> {
        let root = self.root.ok_or(ActivateError::MissingRoot)?;
        if !root.is_aligned::<Size4K>() {
            return Err(ActivateError::Misaligned(root));
        }
        info!("activating address space, PML4 at {root}");
        unsafe { register.install(Cr3::from_pml4_phys(root, false, false)) };
        Ok(())
    }

    fn ensure_root<A: PhysFrameAlloc>(&mut self, alloc: &mut A) -> Result<PhysicalAddress, MapPageError> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        let root = self.new_node(alloc, TableLevel::Pml4)?;
        self.root = Some(root);
        Ok(root)
    }

    fn new_node<A: PhysFrameAlloc>(&self, alloc: &mut A, level: TableLevel) -> Result<PhysicalAddress, MapPageError> {
        let frame = alloc
            .alloc_4k()
            .ok_or(MapPageError::OutOfFrames(level))?
            .base();
        unsafe { self.node(frame) }.fill_baseline();
        debug!("new {level} table at {frame}");
        Ok(frame)
    }

    /// # Safety
    /// `table` must be a page-table frame owned by this space, and no other
    /// reference to it may be live.
    #[inline]
    unsafe fn node<'a>(&self, table: PhysicalAddress) -> &'a mut PageTableNode {
        unsafe { self.mapper.phys_to_mut::<PageTableNode>(table) }
    }
}
