//! # Firmware Memory Map
//!
//! The contract between the boot loader and the frame allocator: a list of
//! [`MemoryDescriptor`]s, each naming a physical range and its firmware
//! region type.
//!
//! The raw UEFI buffer is an array of `EFI_MEMORY_DESCRIPTOR`s laid out with
//! a firmware-chosen stride. [`MemoryMap`] walks it without any pointer
//! casts, reading only the fields the allocator needs:
//!
//! | Offset | Field             | Type  |
//! |--------|-------------------|-------|
//! | 0      | `Type`            | `u32` |
//! | 8      | `PhysicalStart`   | `u64` |
//! | 16     | `VirtualStart`    | `u64` |
//! | 24     | `NumberOfPages`   | `u64` |
//! | 32     | `Attribute`       | `u64` |

use kernel_memory_addresses::PhysicalAddress;

/// Size of the descriptor fields defined by UEFI 2.x, in bytes.
pub const EFI_DESCRIPTOR_SIZE: usize = 40;

const TYPE_OFFSET: usize = 0;
const PHYSICAL_START_OFFSET: usize = 8;
const NUMBER_OF_PAGES_OFFSET: usize = 24;

/// Firmware classification of a physical range.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MemoryRegionType {
    Reserved,
    LoaderCode,
    LoaderData,
    BootServicesCode,
    BootServicesData,
    RuntimeServicesCode,
    RuntimeServicesData,
    Conventional,
    Unusable,
    AcpiReclaim,
    AcpiNvs,
    MemoryMappedIo,
    MemoryMappedIoPortSpace,
    PalCode,
    Persistent,
    /// `0x7000_0000..=0x7FFF_FFFF`, reserved for OEM use.
    Oem(u32),
    /// `0x8000_0000..=0xFFFF_FFFF`, reserved for OS loaders.
    OsVendor(u32),
}

impl MemoryRegionType {
    /// Classify a raw firmware tag. Returns `None` for values UEFI leaves undefined.
    #[must_use]
    pub const fn from_raw(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Self::Reserved,
            1 => Self::LoaderCode,
            2 => Self::LoaderData,
            3 => Self::BootServicesCode,
            4 => Self::BootServicesData,
            5 => Self::RuntimeServicesCode,
            6 => Self::RuntimeServicesData,
            7 => Self::Conventional,
            8 => Self::Unusable,
            9 => Self::AcpiReclaim,
            10 => Self::AcpiNvs,
            11 => Self::MemoryMappedIo,
            12 => Self::MemoryMappedIoPortSpace,
            13 => Self::PalCode,
            14 => Self::Persistent,
            0x7000_0000..=0x7FFF_FFFF => Self::Oem(tag),
            0x8000_0000..=0xFFFF_FFFF => Self::OsVendor(tag),
            _ => return None,
        })
    }

    /// The raw firmware tag.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        match self {
            Self::Reserved => 0,
            Self::LoaderCode => 1,
            Self::LoaderData => 2,
            Self::BootServicesCode => 3,
            Self::BootServicesData => 4,
            Self::RuntimeServicesCode => 5,
            Self::RuntimeServicesData => 6,
            Self::Conventional => 7,
            Self::Unusable => 8,
            Self::AcpiReclaim => 9,
            Self::AcpiNvs => 10,
            Self::MemoryMappedIo => 11,
            Self::MemoryMappedIoPortSpace => 12,
            Self::PalCode => 13,
            Self::Persistent => 14,
            Self::Oem(tag) | Self::OsVendor(tag) => tag,
        }
    }

    /// Whether the frame allocator may hand out frames of this type.
    ///
    /// Boot-services memory is free once `ExitBootServices` has returned.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        matches!(
            self,
            Self::BootServicesCode | Self::BootServicesData | Self::Conventional
        )
    }
}

/// One physical range reported by the firmware.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryDescriptor {
    pub physical_base: PhysicalAddress,
    /// Length in 4 KiB pages.
    pub page_count: u64,
    /// Raw firmware tag; see [`MemoryRegionType::from_raw`].
    pub region_type: u32,
}

impl MemoryDescriptor {
    #[must_use]
    pub const fn new(physical_base: PhysicalAddress, page_count: u64, region: MemoryRegionType) -> Self {
        Self {
            physical_base,
            page_count,
            region_type: region.as_raw(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> Option<MemoryRegionType> {
        MemoryRegionType::from_raw(self.region_type)
    }

    /// Index of the first frame covered by this descriptor.
    #[inline]
    #[must_use]
    pub const fn first_frame(&self) -> u64 {
        self.physical_base.frame_index()
    }

    /// One past the last frame index, saturating.
    #[inline]
    #[must_use]
    pub const fn end_frame(&self) -> u64 {
        self.first_frame().saturating_add(self.page_count)
    }
}

#[derive(Debug, thiserror::Error, Copy, Clone, Eq, PartialEq)]
pub enum MemoryMapError {
    #[error("descriptor stride of {stride} bytes is smaller than the 40-byte UEFI descriptor")]
    DescriptorTooSmall { stride: usize },
}

/// Iterator view over a raw UEFI memory map buffer.
#[derive(Clone)]
pub struct MemoryMap<'a> {
    bytes: &'a [u8],
    stride: usize,
}

impl<'a> MemoryMap<'a> {
    /// Wrap a descriptor buffer.
    ///
    /// # Errors
    /// [`MemoryMapError::DescriptorTooSmall`] if `descriptor_size` cannot hold a descriptor.
    pub const fn new(bytes: &'a [u8], descriptor_size: usize) -> Result<Self, MemoryMapError> {
        if descriptor_size < EFI_DESCRIPTOR_SIZE {
            return Err(MemoryMapError::DescriptorTooSmall {
                stride: descriptor_size,
            });
        }
        Ok(Self {
            bytes,
            stride: descriptor_size,
        })
    }

    /// Number of whole descriptors in the buffer.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len() / self.stride
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptors in firmware order; a trailing partial record is skipped.
    pub fn iter(&self) -> impl Iterator<Item = MemoryDescriptor> + 'a {
        self.bytes.chunks_exact(self.stride).map(parse_descriptor)
    }
}

impl core::fmt::Debug for MemoryMap<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryMap")
            .field("descriptors", &self.len())
            .field("stride", &self.stride)
            .finish()
    }
}

impl<'a> IntoIterator for &MemoryMap<'a> {
    type Item = MemoryDescriptor;
    type IntoIter = core::iter::Map<core::slice::ChunksExact<'a, u8>, fn(&[u8]) -> MemoryDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.bytes
            .chunks_exact(self.stride)
            .map(parse_descriptor as fn(&[u8]) -> MemoryDescriptor)
    }
}

fn parse_descriptor(raw: &[u8]) -> MemoryDescriptor {
    MemoryDescriptor {
        physical_base: PhysicalAddress::new(read_u64(raw, PHYSICAL_START_OFFSET)),
        page_count: read_u64(raw, NUMBER_OF_PAGES_OFFSET),
        region_type: read_u32(raw, TYPE_OFFSET),
    }
}

fn read_u32(raw: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&raw[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(raw: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[at..at + 8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(stride: usize, entries: &[(u32, u64, u64)]) -> Vec<u8> {
        let mut out = vec![0u8; stride * entries.len()];
        for (i, &(ty, base, pages)) in entries.iter().enumerate() {
            let rec = &mut out[i * stride..(i + 1) * stride];
            rec[0..4].copy_from_slice(&ty.to_le_bytes());
            rec[8..16].copy_from_slice(&base.to_le_bytes());
            rec[16..24].copy_from_slice(&0xDEAD_BEEF_u64.to_le_bytes());
            rec[24..32].copy_from_slice(&pages.to_le_bytes());
        }
        out
    }

    #[test]
    fn usable_types() {
        let usable: Vec<u32> = (0..=14)
            .filter(|&t| MemoryRegionType::from_raw(t).is_some_and(MemoryRegionType::is_usable))
            .collect();
        assert_eq!(usable, vec![3, 4, 7]);
    }

    #[test]
    fn vendor_ranges_are_known_but_unusable() {
        let oem = MemoryRegionType::from_raw(0x7000_0001).unwrap();
        assert_eq!(oem, MemoryRegionType::Oem(0x7000_0001));
        assert!(!oem.is_usable());
        let os = MemoryRegionType::from_raw(0x8000_0000).unwrap();
        assert_eq!(os.as_raw(), 0x8000_0000);
        assert!(!os.is_usable());
    }

    #[test]
    fn undefined_tags_are_rejected() {
        assert!(MemoryRegionType::from_raw(15).is_none());
        assert!(MemoryRegionType::from_raw(0x6FFF_FFFF).is_none());
    }

    #[test]
    fn walks_buffer_with_firmware_stride() {
        let bytes = encode(48, &[(7, 0x10_0000, 16), (0, 0, 1), (4, 0x20_0000, 2)]);
        let map = MemoryMap::new(&bytes, 48).unwrap();
        assert_eq!(map.len(), 3);
        let all: Vec<_> = map.iter().collect();
        assert_eq!(
            all[0],
            MemoryDescriptor::new(PhysicalAddress::new(0x10_0000), 16, MemoryRegionType::Conventional)
        );
        assert_eq!(all[1].region(), Some(MemoryRegionType::Reserved));
        assert_eq!(all[2].first_frame(), 0x200);
        assert_eq!(all[2].end_frame(), 0x202);
    }

    #[test]
    fn trailing_partial_descriptor_is_ignored() {
        let mut bytes = encode(40, &[(7, 0, 4)]);
        bytes.extend_from_slice(&[0xFF; 20]);
        let map = MemoryMap::new(&bytes, 40).unwrap();
        assert_eq!((&map).into_iter().count(), 1);
    }

    #[test]
    fn short_stride_is_an_error() {
        assert_eq!(
            MemoryMap::new(&[], 24).err(),
            Some(MemoryMapError::DescriptorTooSmall { stride: 24 })
        );
    }

    #[test]
    fn empty_buffer() {
        let map = MemoryMap::new(&[], 40).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
    }

    #[test]
    fn debug_summarizes_instead_of_dumping_bytes() {
        let bytes = encode(48, &[(7, 0, 4), (0, 0x1000, 1)]);
        let map = MemoryMap::new(&bytes, 48).unwrap();
        assert_eq!(format!("{map:?}"), "MemoryMap { descriptors: 2, stride: 48 }");
        assert_eq!(
            MemoryMap::new(&[], 8).unwrap_err(),
            MemoryMapError::DescriptorTooSmall { stride: 8 }
        );
    }
}
