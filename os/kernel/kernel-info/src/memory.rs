//! # Memory Layout

/// Size of one physical frame and of every page created by the kernel.
pub const FRAME_SIZE: u64 = 4096;

/// log2 of [`FRAME_SIZE`].
pub const FRAME_SHIFT: u32 = 12;

/// Physical address width assumed by the page-table manager.
///
/// Bits 48..=51 of a table entry's address field are always zero.
pub const PHYSICAL_ADDRESS_BITS: u32 = 48;

/// Highest physical address a table entry can reference (exclusive).
pub const MAX_PHYSICAL_ADDRESS: u64 = 1 << PHYSICAL_ADDRESS_BITS;

/// Number of frames the bitmap allocator can describe (512 GiB of RAM).
pub const BITMAP_CAPACITY: u64 = (512 << 30) / FRAME_SIZE;

/// Number of `u64` words needed for a bitmap of [`BITMAP_CAPACITY`] bits.
#[allow(clippy::cast_possible_truncation)]
pub const BITMAP_WORDS: usize = (BITMAP_CAPACITY / u64::BITS as u64) as usize;

/// Entries per page-table node at every level.
pub const PAGE_TABLE_ENTRIES: usize = 512;

const _: () = {
    assert!(1 << FRAME_SHIFT == FRAME_SIZE);
    assert!(BITMAP_CAPACITY == 1 << 27);
    assert!(BITMAP_WORDS as u64 * 64 == BITMAP_CAPACITY);
    assert!(PAGE_TABLE_ENTRIES as u64 * 8 == FRAME_SIZE);
    assert!(BITMAP_CAPACITY * FRAME_SIZE <= MAX_PHYSICAL_ADDRESS);
};
