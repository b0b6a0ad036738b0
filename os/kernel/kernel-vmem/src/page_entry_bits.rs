use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// A single 64-bit x86-64 page table entry in its raw bitfield form.
///
/// The layout is the common superset of the four paging levels (PML4E,
/// PDPTE, PDE, PTE). The kernel only ever produces two shapes of entry:
///
/// - a **link** to a next-level table ([`PageEntryBits::next_table`]), and
/// - a **4 KiB leaf** ([`PageEntryBits::leaf_4k`]).
///
/// Both are present and writable. Every fresh table is filled with
/// [`PageEntryBits::table_baseline`]: writable, *not* present.
///
/// ### Bit layout
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (leaf only) |
/// | 7         | `PS`              | Large page flag (never set here) |
/// | 8         | `G`               | Global (leaf only) |
/// | 9–11      | OS avail low      | Reserved for OS use |
/// | 12–51     | `addr`            | Physical frame bits [51:12] |
/// | 52–62     | OS avail high     | Reserved for OS use |
/// | 63        | `NX`              | Execute disable |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::leaf_4k(PhysicalAddress::new(0x40_0000));
/// assert!(e.present() && e.writable());
/// assert_eq!(e.physical_address().as_u64(), 0x40_0000);
/// assert_eq!(e.into_bits(), 0x40_0003);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6), leaf only. Set by the CPU on first write.
    pub dirty: bool,

    /// Large Page / Page Size (PS, bit 7).
    pub large_page: bool,

    /// Global (G, bit 8), leaf only.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available_low: u8,

    /// Physical address bits [51:12].
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    /// OS-available (bits 52..=62).
    #[bits(11)]
    pub os_available_high: u16,

    /// No-Execute (NX, bit 63).
    pub no_execute: bool,
}

impl PageEntryBits {
    /// Value of every entry in a freshly created table: writable, not present.
    #[inline]
    #[must_use]
    pub const fn table_baseline() -> Self {
        Self::new().with_writable(true)
    }

    /// Present link to the next-level table at `table`.
    #[inline]
    #[must_use]
    pub const fn next_table(table: PhysicalAddress) -> Self {
        Self::table_baseline()
            .with_present(true)
            .with_physical_address(table)
    }

    /// Present, writable 4 KiB mapping of `frame`.
    #[inline]
    #[must_use]
    pub const fn leaf_4k(frame: PhysicalAddress) -> Self {
        Self::table_baseline()
            .with_present(true)
            .with_physical_address(frame)
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, phys: PhysicalAddress) -> Self {
        self.with_phys_addr_bits_51_12(phys.as_u64() >> 12)
    }

    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_51_12(phys.as_u64() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_51_12() << 12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_writable_not_present() {
        let e = PageEntryBits::table_baseline();
        assert_eq!(e.into_bits(), 0x2);
        assert!(!e.present());
    }

    #[test]
    fn link_replaces_address_and_keeps_flags() {
        let mut e = PageEntryBits::next_table(PhysicalAddress::new(0x5000));
        assert_eq!(e.into_bits(), 0x5003);
        e.set_physical_address(PhysicalAddress::new(0x7000));
        assert_eq!(e.into_bits(), 0x7003);
    }

    #[test]
    fn address_field_spans_bits_12_to_51() {
        let top = PhysicalAddress::new(0x000F_FFFF_FFFF_F000);
        let e = PageEntryBits::leaf_4k(top);
        assert_eq!(e.physical_address(), top);
        assert!(!e.no_execute());
        assert_eq!(e.os_available_high(), 0);
    }

    #[test]
    fn in_page_offset_is_dropped() {
        let e = PageEntryBits::leaf_4k(PhysicalAddress::new(0x1234));
        assert_eq!(e.physical_address().as_u64(), 0x1000);
    }
}
