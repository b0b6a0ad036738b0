use core::fmt;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// Granularity of a mapping.
///
/// Sealed; [`Size4K`] is the only implementor since huge leaves are never
/// created.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Display + fmt::Debug
{
    /// Bytes per page.
    const SIZE: u64;
    /// `log2(SIZE)`: the number of in-page offset bits.
    const SHIFT: u32;
    /// The in-page offset bits.
    const MASK: u64 = Self::SIZE - 1;
    /// Short label used in `Display` output, e.g. `4K`.
    const NAME: &'static str;
}

/// 4 KiB, one frame.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size4K;

impl sealed::Sealed for Size4K {}

impl PageSize for Size4K {
    const SIZE: u64 = 4096;
    const SHIFT: u32 = 12;
    const NAME: &'static str = "4K";
}

impl fmt::Display for Size4K {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::NAME)
    }
}

impl fmt::Debug for Size4K {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size4K({})", Self::SIZE)
    }
}

const _: () = assert!(1 << Size4K::SHIFT == Size4K::SIZE);
const _: () = assert!(Size4K::MASK == 0xFFF);
