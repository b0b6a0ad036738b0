//! # QEMU Debug Console Output
//!
//! Diagnostics for kernels running under QEMU. Everything written here ends
//! up on the host through QEMU's debug console (`-debugcon`), which captures
//! byte writes to I/O port `0x402`.
//!
//! ```text
//! log::info!(..) ──► QemuLogger ──► qemu_trace! ──► QemuSink ──► out 0x402
//! ```
//!
//! The memory bring-up logs allocator totals, new page-table nodes and
//! activation through the `log` facade; installing [`QemuLogger`] makes those
//! records visible on the host:
//!
//! ```bash
//! qemu-system-x86_64 ... -debugcon stdio
//! ```
//!
//! ## Features
//!
//! * `enabled` (default): port writes are compiled in on `x86_64`.
//!
//! Without the feature, or on any other architecture, [`qemu_trace!`] formats
//! nothing and writes nothing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use log::{LevelFilter, info};
//!
//! kernel_qemu::QemuLogger::init(LevelFilter::Debug).ok();
//! info!("frame allocator ready");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[cfg(all(feature = "enabled", target_arch = "x86_64"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// The port number for QEMU's debug port.
    const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to QEMU's debug port.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        // SAFETY: port 0x402 is unused on real hardware; QEMU only logs it.
        unsafe { outb(QEMU_DEBUG_PORT, c) }
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    unsafe fn outb(port: u16, val: u8) {
        unsafe {
            core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
            );
        }
    }

    /// Unbuffered [`Write`] sink for the debug port.
    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best effort; the sink never fails.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(all(feature = "enabled", target_arch = "x86_64")))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always, clippy::needless_pass_by_value)]
    pub fn qemu_write(_: fmt::Arguments) {}
}

/// `format!`-style output straight to the QEMU debug port, bypassing `log`.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
