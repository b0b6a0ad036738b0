use bitfield_struct::bitfield;

/// RFLAGS, reduced to the bits the kernel inspects.
///
/// Only the interrupt flag is acted upon; the arithmetic flags are modeled so
/// that a snapshot round-trips through [`Rflags::into_bits`] unchanged.
#[bitfield(u64, order = Lsb)]
pub struct Rflags {
    /// Carry Flag
    pub cf_carry: bool, // 0

    /// Always 1 in 64-bit mode.
    #[bits(default = true)]
    pub always1: bool, // 1

    /// Parity Flag
    pub pf_parity: bool, // 2

    _rsvd3: bool, // 3

    /// Adjust Flag
    pub af_adjust: bool, // 4

    _rsvd5: bool, // 5

    /// Zero Flag
    pub zf_zero: bool, // 6

    /// Sign Flag
    pub sf_sign: bool, // 7

    /// Trap Flag
    pub tf_trap: bool, // 8

    /// Interrupt Enable Flag
    pub if_interrupt_enable: bool, // 9

    /// Direction Flag
    pub df_direction: bool, // 10

    /// Overflow Flag
    pub of_overflow: bool, // 11

    /// Bits 12–63, not interpreted here.
    #[bits(52)]
    pub upper: u64,
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl crate::LoadRegisterUnsafe for Rflags {
    unsafe fn load_unsafe() -> Self {
        let r: u64;
        unsafe {
            core::arch::asm!("pushfq; pop {}", out(reg) r, options(preserves_flags));
        }
        Self::from_bits(r)
    }
}
