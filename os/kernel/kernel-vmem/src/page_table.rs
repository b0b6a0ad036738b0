//! # Memory Page Table
//!
//! One node of the 4-level hierarchy and the per-level index arithmetic.

use crate::PageEntryBits;
use core::fmt;
use kernel_info::memory::PAGE_TABLE_ENTRIES;
use kernel_memory_addresses::VirtualAddress;

/// Mask applied to a shifted virtual address to obtain a 9-bit table index.
const INDEX_MASK: u64 = 0x1FF;

/// Level of a node in the translation tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TableLevel {
    /// Level 4, the root referenced by CR3. Bits 47:39.
    Pml4,
    /// Level 3. Bits 38:30.
    Pdpt,
    /// Level 2. Bits 29:21.
    Pd,
    /// Level 1, holds the 4 KiB leaves. Bits 20:12.
    Pt,
}

impl TableLevel {
    /// Levels in walk order, root first.
    pub const WALK: [Self; 4] = [Self::Pml4, Self::Pdpt, Self::Pd, Self::Pt];

    /// Right shift that brings this level's index field to bit 0.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Pml4 => 39,
            Self::Pdpt => 30,
            Self::Pd => 21,
            Self::Pt => 12,
        }
    }

    /// Index of `va` within a node of this level.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(self, va: VirtualAddress) -> usize {
        ((va.as_u64() >> self.shift()) & INDEX_MASK) as usize
    }

    /// Level of the nodes this level's entries point to, `None` for [`TableLevel::Pt`].
    #[inline]
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Pml4 => Some(Self::Pdpt),
            Self::Pdpt => Some(Self::Pd),
            Self::Pd => Some(Self::Pt),
            Self::Pt => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pml4 => "PML4",
            Self::Pdpt => "PDPT",
            Self::Pd => "PD",
            Self::Pt => "PT",
        }
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 4 KiB page-table frame: 512 entries of 8 bytes.
#[doc(alias = "PageTable")]
#[repr(C, align(4096))]
pub struct PageTableNode {
    entries: [PageEntryBits; PAGE_TABLE_ENTRIES],
}

impl PageTableNode {
    /// Reset every entry to [`PageEntryBits::table_baseline`].
    #[inline]
    pub fn fill_baseline(&mut self) {
        self.entries.fill(PageEntryBits::table_baseline());
    }

    #[inline]
    #[must_use]
    pub const fn entry(&self, index: usize) -> PageEntryBits {
        self.entries[index]
    }

    #[inline]
    pub const fn set_entry(&mut self, index: usize, entry: PageEntryBits) {
        self.entries[index] = entry;
    }

    #[inline]
    #[must_use]
    pub const fn entries(&self) -> &[PageEntryBits; PAGE_TABLE_ENTRIES] {
        &self.entries
    }
}

const _: () = assert!(size_of::<PageTableNode>() == 4096);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_for_4_mib() {
        let va = VirtualAddress::new(0x40_0000);
        let idx: Vec<_> = TableLevel::WALK.iter().map(|l| l.index_of(va)).collect();
        assert_eq!(idx, vec![0, 0, 2, 0]);
    }

    #[test]
    fn indices_for_higher_half() {
        let va = VirtualAddress::new(0xFFFF_8888_0123_4567);
        assert_eq!(TableLevel::Pml4.index_of(va), 0x111);
        assert_eq!(TableLevel::Pdpt.index_of(va), 0x020);
        assert_eq!(TableLevel::Pd.index_of(va), 0x009);
        assert_eq!(TableLevel::Pt.index_of(va), 0x034);
    }

    #[test]
    fn child_chain_ends_at_pt() {
        let mut level = TableLevel::Pml4;
        let mut depth = 1;
        while let Some(next) = level.child() {
            level = next;
            depth += 1;
        }
        assert_eq!(level, TableLevel::Pt);
        assert_eq!(depth, 4);
    }
}
