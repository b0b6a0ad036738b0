//! # Bitmap Physical Frame Allocator
//!
//! Hands out runs of contiguous 4 KiB frames, first fit, from a bitmap built
//! out of the firmware memory map.
//!
//! ## Life cycle
//!
//! 1. [`BitmapFrameAlloc::initialize`] marks every frame used, then releases
//!    the ranges whose firmware type is usable.
//! 2. [`BitmapFrameAlloc::request`] finds the lowest run of free frames.
//! 3. [`BitmapFrameAlloc::free`] returns a run; returning a frame that is not
//!    in use is a kernel bug and panics.
//!
//! ## Managed range
//!
//! Frame `i` is the frame at physical address `i * 4096`. The allocator manages
//! `0..total_frames()`, where the total is the end of the highest described
//! range, capped by the bitmap capacity. Memory above the cap is reported once
//! and otherwise ignored.
//!
//! ## Example
//! ```rust
//! use kernel_alloc::frame_alloc::BitmapFrameAlloc;
//! use kernel_info::memory_map::{MemoryDescriptor, MemoryRegionType};
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let mut storage = [0u64; 8];
//! let map = [MemoryDescriptor::new(PhysicalAddress::new(0x10_0000), 16, MemoryRegionType::Conventional)];
//! let mut frames = BitmapFrameAlloc::initialize(&mut storage, map).unwrap();
//!
//! assert_eq!(frames.free_frames(), 16);
//! let a = frames.request(4).unwrap();
//! assert_eq!(a.as_u64(), 0x10_0000);
//! frames.free(a, 4);
//! assert_eq!(frames.free_frames(), 16);
//! ```

use crate::bitmap::FrameBitmap;
use core::fmt;
use kernel_info::memory::{BITMAP_CAPACITY, FRAME_SIZE};
use kernel_info::memory_map::{MemoryDescriptor, MemoryRegionType};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};
use kernel_vmem::PhysFrameAlloc;
use log::{error, info, trace, warn};

/// Failure of [`BitmapFrameAlloc::initialize`].
#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum FrameAllocInitError {
    #[error("memory map describes no manageable frames")]
    InitializationFailed,
    #[error("unsupported memory region type {0:#x}")]
    UnsupportedRegionType(u32),
}

#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum FrameAllocError {
    #[error("cannot satisfy a request for {requested} contiguous frames ({free} free)")]
    Exhausted { requested: u64, free: u64 },
    #[error("requested zero frames")]
    ZeroCount,
    #[error("frame address {0} is not 4 KiB aligned")]
    Misaligned(PhysicalAddress),
    #[error("{count} frames at {address} exceed the {total} managed frames")]
    OutOfRange {
        address: PhysicalAddress,
        count: u64,
        total: u64,
    },
    #[error("double free of frame {0}")]
    DoubleFree(PhysicalAddress),
}

pub struct BitmapFrameAlloc<'b> {
    bitmap: FrameBitmap<'b>,
    total: u64,
    free: u64,
    described: u64,
}

impl<'b> BitmapFrameAlloc<'b> {
    /// Build the allocator over `storage` from a firmware memory map.
    ///
    /// At most `min(BITMAP_CAPACITY, 64 * storage.len())` frames are managed.
    ///
    /// # Errors
    /// - [`FrameAllocInitError::UnsupportedRegionType`] for a tag outside the
    ///   UEFI-defined ranges.
    /// - [`FrameAllocInitError::InitializationFailed`] if the map describes no
    ///   pages or none below the capacity.
    pub fn initialize<I>(storage: &'b mut [u64], memory_map: I) -> Result<Self, FrameAllocInitError>
    where
        I: IntoIterator<Item = MemoryDescriptor>,
    {
        let mut bitmap = FrameBitmap::new_all_set(storage, BITMAP_CAPACITY);
        let capacity = bitmap.len();

        let mut described = 0u64;
        let mut highest_end = 0u64;
        for d in memory_map {
            let region = MemoryRegionType::from_raw(d.region_type)
                .ok_or(FrameAllocInitError::UnsupportedRegionType(d.region_type))?;
            described = described.saturating_add(d.page_count);
            highest_end = highest_end.max(d.end_frame());

            if region.is_usable() {
                let Some(start) = d.physical_base.align_up::<Size4K>() else {
                    continue;
                };
                bitmap.clear_range(start.frame_index(), d.end_frame());
            }
        }

        let total = highest_end.min(capacity);
        if described == 0 || total == 0 {
            return Err(FrameAllocInitError::InitializationFailed);
        }
        if highest_end > capacity {
            warn!(
                "{} frames above {} are not managed by the frame allocator",
                highest_end - capacity,
                PhysicalAddress::from_frame_index(capacity)
            );
        }

        if total > described.saturating_mul(2) {
            warn!(
                "memory map is sparse: {total} frames managed for {described} described; \
                 the kernel identity map will cover the holes"
            );
        }

        let free = bitmap.count_clear(0, total);
        info!(
            "frame allocator: {total} frames managed, {free} free ({} MiB)",
            (free * FRAME_SIZE) >> 20
        );
        Ok(Self {
            bitmap,
            total,
            free,
            described,
        })
    }

    /// Allocate `count` contiguous frames and return the base of the lowest
    /// suitable run.
    ///
    /// # Errors
    /// - [`FrameAllocError::ZeroCount`] for `count == 0`.
    /// - [`FrameAllocError::Exhausted`] if fewer than `count` frames are free,
    ///   or no contiguous run is long enough. Nothing changes in that case.
    pub fn request(&mut self, count: u64) -> Result<PhysicalAddress, FrameAllocError> {
        if count == 0 {
            return Err(FrameAllocError::ZeroCount);
        }
        let exhausted = FrameAllocError::Exhausted {
            requested: count,
            free: self.free,
        };
        if self.free < count {
            return Err(exhausted);
        }
        let first = self.bitmap.find_clear_run(self.total, count).ok_or(exhausted)?;
        self.bitmap.set_range(first, first + count);
        self.free -= count;

        let address = PhysicalAddress::from_frame_index(first);
        trace!("requested {count} frames at {address}, {} free", self.free);
        Ok(address)
    }

    /// Return `count` frames starting at `address`, reporting misuse instead of
    /// panicking.
    ///
    /// Alignment is checked first; `count == 0` is otherwise a no-op. All
    /// checks happen before the bitmap is touched.
    ///
    /// # Errors
    /// - [`FrameAllocError::Misaligned`] if `address` is not frame aligned.
    /// - [`FrameAllocError::OutOfRange`] if the run ends beyond the managed frames.
    /// - [`FrameAllocError::DoubleFree`] naming the first frame of the run that is already free.
    pub fn try_free(&mut self, address: PhysicalAddress, count: u64) -> Result<(), FrameAllocError> {
        if !address.is_aligned::<Size4K>() {
            return Err(FrameAllocError::Misaligned(address));
        }
        if count == 0 {
            return Ok(());
        }

        let first = address.frame_index();
        let end = first
            .checked_add(count)
            .filter(|&end| end <= self.total)
            .ok_or(FrameAllocError::OutOfRange {
                address,
                count,
                total: self.total,
            })?;
        if let Some(already_free) = self.bitmap.first_clear(first, end) {
            return Err(FrameAllocError::DoubleFree(PhysicalAddress::from_frame_index(
                already_free,
            )));
        }

        self.bitmap.clear_range(first, end);
        self.free += count;
        trace!("freed {count} frames at {address}, {} free", self.free);
        Ok(())
    }

    /// Return `count` frames starting at `address`.
    ///
    /// # Panics
    /// On any error [`try_free`](Self::try_free) reports.
    pub fn free(&mut self, address: PhysicalAddress, count: u64) {
        if let Err(e) = self.try_free(address, count) {
            error!("frame allocator: {e}");
            panic!("frame allocator: {e}");
        }
    }

    /// Frames managed, `0..total_frames()`.
    #[inline]
    #[must_use]
    pub const fn total_frames(&self) -> u64 {
        self.total
    }

    #[inline]
    #[must_use]
    pub const fn free_frames(&self) -> u64 {
        self.free
    }

    #[inline]
    #[must_use]
    pub const fn used_frames(&self) -> u64 {
        self.total - self.free
    }

    /// Sum of `page_count` over every descriptor, usable or not.
    #[inline]
    #[must_use]
    pub const fn described_frames(&self) -> u64 {
        self.described
    }

    /// Whether frame `index` is in use. Frames outside the managed range are.
    #[inline]
    #[must_use]
    pub fn is_frame_used(&self, index: u64) -> bool {
        index >= self.total || self.bitmap.get(index)
    }
}

impl PhysFrameAlloc for BitmapFrameAlloc<'_> {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        self.request(1).ok().map(PhysicalAddress::page::<Size4K>)
    }

    fn total_frames(&self) -> u64 {
        self.total
    }
}

impl fmt::Debug for BitmapFrameAlloc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitmapFrameAlloc")
            .field("total", &self.total)
            .field("free", &self.free)
            .field("described", &self.described)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory_map::MemoryRegionType::{BootServicesData, Conventional, LoaderData, Reserved};

    fn desc(base: u64, pages: u64, ty: MemoryRegionType) -> MemoryDescriptor {
        MemoryDescriptor::new(PhysicalAddress::new(base), pages, ty)
    }

    fn popcount(a: &BitmapFrameAlloc<'_>) -> u64 {
        (0..a.total_frames()).filter(|&i| a.is_frame_used(i)).count() as u64
    }

    #[test]
    fn single_conventional_region() {
        let mut storage = [0u64; 8];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0x10_0000, 16, Conventional)]).unwrap();

        assert_eq!(a.total_frames(), 272);
        assert_eq!(a.described_frames(), 16);
        assert_eq!(a.free_frames(), 16);
        assert!(a.is_frame_used(255));
        assert!((256..272).all(|i| !a.is_frame_used(i)));

        assert_eq!(a.request(4), Ok(PhysicalAddress::new(0x10_0000)));
        assert_eq!(a.request(4), Ok(PhysicalAddress::new(0x10_4000)));
        assert_eq!(a.free_frames(), 8);
    }

    #[test]
    fn unusable_types_stay_used() {
        let mut storage = [0u64; 1];
        let a = BitmapFrameAlloc::initialize(
            &mut storage,
            [
                desc(0, 4, Reserved),
                desc(0x4000, 4, BootServicesData),
                desc(0x8000, 4, LoaderData),
                desc(0xC000, 4, Conventional),
            ],
        )
        .unwrap();
        assert_eq!(a.total_frames(), 16);
        assert_eq!(a.free_frames(), 8);
        assert!(a.is_frame_used(0));
        assert!(!a.is_frame_used(4));
        assert!(a.is_frame_used(8));
        assert!(!a.is_frame_used(15));
    }

    #[test]
    fn unknown_tag_fails() {
        let mut storage = [0u64; 1];
        let bogus = MemoryDescriptor {
            physical_base: PhysicalAddress::zero(),
            page_count: 1,
            region_type: 42,
        };
        assert_eq!(
            BitmapFrameAlloc::initialize(&mut storage, [bogus]).err(),
            Some(FrameAllocInitError::UnsupportedRegionType(42))
        );
    }

    #[test]
    fn empty_map_fails() {
        let mut storage = [0u64; 1];
        assert_eq!(
            BitmapFrameAlloc::initialize(&mut storage, []).err(),
            Some(FrameAllocInitError::InitializationFailed)
        );
        let mut storage = [0u64; 1];
        assert_eq!(
            BitmapFrameAlloc::initialize(&mut storage, [desc(0x1000, 0, Conventional)]).err(),
            Some(FrameAllocInitError::InitializationFailed)
        );
    }

    #[test]
    fn memory_above_capacity_is_truncated() {
        let mut storage = [0u64; 1];
        let a = BitmapFrameAlloc::initialize(&mut storage, [desc(0x3E000, 10, Conventional)]).unwrap();
        assert_eq!(a.total_frames(), 64);
        assert_eq!(a.free_frames(), 2);
        assert_eq!(a.described_frames(), 10);
    }

    #[test]
    fn region_entirely_above_capacity_is_ignored() {
        let mut storage = [0u64; 1];
        let a = BitmapFrameAlloc::initialize(&mut storage, [desc(0x40000, 10, Conventional)]).unwrap();
        assert_eq!(a.total_frames(), 64);
        assert_eq!(a.free_frames(), 0);
    }

    #[test]
    fn unaligned_region_base_rounds_up() {
        let mut storage = [0u64; 1];
        let a = BitmapFrameAlloc::initialize(&mut storage, [desc(0x1800, 3, Conventional)]).unwrap();
        assert!(a.is_frame_used(1));
        assert!(!a.is_frame_used(2));
        assert!(!a.is_frame_used(3));
        assert_eq!(a.free_frames(), 2);
    }

    #[test]
    fn zero_count_request() {
        let mut storage = [0u64; 1];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0, 8, Conventional)]).unwrap();
        assert_eq!(a.request(0), Err(FrameAllocError::ZeroCount));
        assert_eq!(a.free_frames(), 8);
    }

    #[test]
    fn exhaustion_does_not_mutate() {
        let mut storage = [0u64; 1];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0, 8, Conventional)]).unwrap();
        assert_eq!(
            a.request(9),
            Err(FrameAllocError::Exhausted { requested: 9, free: 8 })
        );
        assert_eq!(a.free_frames(), 8);
        assert_eq!(popcount(&a), 0);
    }

    #[test]
    fn fragmentation_reports_exhausted() {
        let mut storage = [0u64; 1];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0, 8, Conventional)]).unwrap();
        let first = a.request(8).unwrap();
        a.free(first, 2);
        a.free(PhysicalAddress::new(0x4000), 2);
        assert_eq!(a.free_frames(), 4);
        assert_eq!(
            a.request(3),
            Err(FrameAllocError::Exhausted { requested: 3, free: 4 })
        );
        assert_eq!(a.free_frames(), 4);
        assert_eq!(a.request(2), Ok(PhysicalAddress::zero()));
    }

    #[test]
    fn try_free_validates_before_mutating() {
        let mut storage = [0u64; 1];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0, 8, Conventional)]).unwrap();
        let base = a.request(4).unwrap();

        assert_eq!(
            a.try_free(PhysicalAddress::new(0x10), 1),
            Err(FrameAllocError::Misaligned(PhysicalAddress::new(0x10)))
        );
        assert_eq!(
            a.try_free(base, 5),
            Err(FrameAllocError::DoubleFree(PhysicalAddress::new(0x4000)))
        );
        assert_eq!(
            a.try_free(PhysicalAddress::new(0x7000), 2),
            Err(FrameAllocError::OutOfRange {
                address: PhysicalAddress::new(0x7000),
                count: 2,
                total: 8
            })
        );
        assert_eq!(a.free_frames(), 4);
        assert!((0..4).all(|i| a.is_frame_used(i)));
        assert_eq!(a.try_free(base, 0), Ok(()));
        assert_eq!(a.try_free(base, 4), Ok(()));
        assert_eq!(a.free_frames(), 8);
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn free_of_free_frame_panics() {
        let mut storage = [0u64; 1];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0, 8, Conventional)]).unwrap();
        a.free(PhysicalAddress::new(0x1000), 1);
    }

    #[test]
    #[should_panic(expected = "not 4 KiB aligned")]
    fn free_of_misaligned_address_panics() {
        let mut storage = [0u64; 1];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0, 8, Conventional)]).unwrap();
        let _ = a.request(1).unwrap();
        a.free(PhysicalAddress::new(0x0800), 1);
    }

    #[test]
    fn alloc_4k_hands_out_single_frames() {
        let mut storage = [0u64; 1];
        let mut a = BitmapFrameAlloc::initialize(&mut storage, [desc(0x2000, 2, Conventional)]).unwrap();
        assert_eq!(a.alloc_4k().map(|p| p.base().as_u64()), Some(0x2000));
        assert_eq!(a.alloc_4k().map(|p| p.base().as_u64()), Some(0x3000));
        assert!(a.alloc_4k().is_none());
        assert_eq!(PhysFrameAlloc::total_frames(&a), 4);
    }
}
