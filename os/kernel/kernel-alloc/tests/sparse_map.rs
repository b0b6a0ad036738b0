use kernel_alloc::BitmapFrameAlloc;
use kernel_info::memory_map::{MemoryDescriptor, MemoryRegionType};
use kernel_memory_addresses::PhysicalAddress;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::sync::Once;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Keeps each test thread's records apart.
struct CapturingLogger;

impl Log for CapturingLogger {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger;
static INIT: Once = Once::new();

fn capture() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
}

fn warnings() -> Vec<String> {
    RECORDS.with(|r| {
        r.borrow()
            .iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, msg)| msg.clone())
            .collect()
    })
}

fn desc(base: u64, pages: u64, ty: MemoryRegionType) -> MemoryDescriptor {
    MemoryDescriptor::new(PhysicalAddress::new(base), pages, ty)
}

#[test]
fn lone_high_descriptor_widens_the_managed_range_with_a_warning() {
    capture();
    let mut storage = vec![0u64; 64];
    let map = [
        desc(0x10_0000, 16, MemoryRegionType::Conventional),
        desc(0x3F_F000, 1, MemoryRegionType::MemoryMappedIo),
    ];

    let a = BitmapFrameAlloc::initialize(&mut storage, map).unwrap();
    assert_eq!(a.total_frames(), 0x400);
    assert_eq!(a.free_frames(), 16);

    let warned = warnings();
    assert_eq!(warned.len(), 1, "{warned:?}");
    assert!(warned[0].contains("sparse"));
    assert!(warned[0].contains("1024 frames managed for 17 described"));
}

#[test]
fn contiguous_map_does_not_warn() {
    capture();
    let mut storage = vec![0u64; 8];
    let map = [
        desc(0, 1, MemoryRegionType::Reserved),
        desc(0x1000, 255, MemoryRegionType::Conventional),
    ];

    let a = BitmapFrameAlloc::initialize(&mut storage, map).unwrap();
    assert_eq!(a.total_frames(), 256);
    assert!(warnings().is_empty());
}
