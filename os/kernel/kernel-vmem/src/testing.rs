//! Simulated physical memory for unit tests.

use crate::page_table::PageTableNode;
use crate::{PhysFrameAlloc, PhysMapper};
use core::cell::UnsafeCell;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// A 4 KiB-aligned raw frame.
#[repr(C, align(4096))]
pub struct Aligned4K([u8; 4096]);

/// "Physical RAM" as a vector of frames; physical address `n * 4096` is frame `n`.
pub struct TestPhys {
    frames: Vec<UnsafeCell<Aligned4K>>,
}

impl TestPhys {
    pub fn with_frames(n: usize) -> Self {
        Self {
            frames: (0..n).map(|_| UnsafeCell::new(Aligned4K([0xA5; 4096]))).collect(),
        }
    }

    pub fn node(&self, pa: PhysicalAddress) -> &PageTableNode {
        unsafe { self.phys_to_mut::<PageTableNode>(pa) }
    }

    /// Copy of every byte, for before/after comparisons.
    pub fn snapshot(&self) -> Vec<u8> {
        self.frames.iter().flat_map(|f| unsafe { (*f.get()).0 }).collect()
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let idx = usize::try_from(pa.frame_index()).unwrap();
        assert_eq!(pa.as_u64() & 0xFFF, 0, "tables are frame aligned");
        unsafe { &mut *self.frames[idx].get().cast::<T>() }
    }
}

/// Hands out consecutive frames from `start`, at most `limit` of them.
pub struct BumpAlloc {
    next: u64,
    remaining: u64,
    handed_out: u64,
    total_frames: u64,
}

impl BumpAlloc {
    pub const fn new(start: u64, limit: u64) -> Self {
        Self {
            next: start,
            remaining: limit,
            handed_out: 0,
            total_frames: 0,
        }
    }

    pub const fn with_total_frames(mut self, total: u64) -> Self {
        self.total_frames = total;
        self
    }

    pub const fn handed_out(&self) -> u64 {
        self.handed_out
    }
}

impl PhysFrameAlloc for BumpAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalPage<Size4K>> {
        if self.remaining == 0 {
            return None;
        }
        let page = PhysicalAddress::new(self.next).page::<Size4K>();
        self.next += 4096;
        self.remaining -= 1;
        self.handed_out += 1;
        Some(page)
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }
}
