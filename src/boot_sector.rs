use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use derive_builder::Builder;
use log::debug;

use crate::{
    SECTOR_SIZE, Sector,
    error::{Result, Structure},
    layout::{self, Field},
};

/// Jump instruction placed at the start of every boot sector written by this crate.
pub const JUMP_BOOT: [u8; 3] = [0xEB, 0x3C, 0x90];
/// Marks the presence of the serial number and label fields.
pub const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;
/// Media descriptor of a fixed disk.
pub const MEDIA_FIXED_DISK: u8 = 0xF8;

const JUMP: Field = Field::new(0, 3);
const OEM_NAME: Field = Field::new(3, 8);
const BYTES_PER_SECTOR: usize = 11;
const SECTORS_PER_CLUSTER: usize = 13;
const RESERVED_SECTORS: usize = 14;
const FAT_COUNT: usize = 16;
const ROOT_ENTRY_COUNT: usize = 17;
const TOTAL_SECTORS_16: usize = 19;
const MEDIA_DESCRIPTOR: usize = 21;
const SECTORS_PER_FAT: usize = 22;
const SECTORS_PER_TRACK: usize = 24;
const HEAD_COUNT: usize = 26;
const HIDDEN_SECTORS: usize = 28;
const TOTAL_SECTORS_32: usize = 32;
const EXTENDED_SIGNATURE: usize = 62;
const VOLUME_SERIAL: usize = 63;
const VOLUME_LABEL: Field = Field::new(67, 11);
const FS_TYPE_LABEL: Field = Field::new(82, 8);

/// Structure representing the volume serial number.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VolumeSerialNumber(pub u32);

impl VolumeSerialNumber {
    /// Serial numbers are conventionally derived from the formatting time.
    pub fn from_unix_seconds(secs: u64) -> VolumeSerialNumber {
        VolumeSerialNumber(secs as u32)
    }

    pub fn try_now() -> core::result::Result<VolumeSerialNumber, SystemTimeError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        Ok(VolumeSerialNumber::from_unix_seconds(now.as_secs()))
    }
}

/// The BIOS Parameter Block of a FAT16 boot sector together with the extended fields.
/// Every field left unset in [`BiosParameterBlockBuilder`] is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder)]
#[builder(default)]
pub struct BiosParameterBlock {
    /// Name of the formatting system, padded with spaces.
    pub oem_name: [u8; 8],
    /// Logical sector size. Must be non-zero for any volume holding data.
    pub bytes_per_sector: u16,
    /// Allocation unit in sectors.
    pub sectors_per_cluster: u8,
    /// Sectors before the first FAT, the boot sector included.
    pub reserved_sectors: u16,
    /// Number of FAT copies.
    pub fat_count: u8,
    /// Capacity of the fixed-size root directory in 32-byte entries.
    pub root_entry_count: u16,
    /// Total sector count when it fits in 16 bits, `0` otherwise.
    pub total_sectors16: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub head_count: u16,
    /// Sectors preceding the partition on the disk.
    pub hidden_sectors: u32,
    /// Total sector count, authoritative when `total_sectors16 == 0`.
    pub total_sectors32: u32,
    pub volume_serial: VolumeSerialNumber,
    pub volume_label: [u8; 11],
    pub fs_type_label: [u8; 8],
}

impl BiosParameterBlock {
    /// The layout used by the analyzer: 2 KiB clusters, one reserved sector, two FATs of 200
    /// sectors each and a 512-entry root directory.
    pub fn fat16(total_sectors: u32, volume_serial: VolumeSerialNumber) -> BiosParameterBlock {
        let (total_sectors16, total_sectors32) = match u16::try_from(total_sectors) {
            Ok(small) => (small, 0),
            Err(_) => (0, total_sectors),
        };

        Self {
            oem_name: *b"MYFAT16 ",
            bytes_per_sector: SECTOR_SIZE as u16,
            sectors_per_cluster: 4,
            reserved_sectors: 1,
            fat_count: 2,
            root_entry_count: 512,
            total_sectors16,
            media_descriptor: MEDIA_FIXED_DISK,
            sectors_per_fat: 200,
            sectors_per_track: 32,
            head_count: 64,
            hidden_sectors: 0,
            total_sectors32,
            volume_serial,
            volume_label: *b"FAT16_VOL  ",
            fs_type_label: *b"FAT16   ",
        }
    }

    /// Effective sector count: the 16-bit field unless it is zero, in which case the 32-bit
    /// field is authoritative.
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors16 == 0 {
            self.total_sectors32
        } else {
            self.total_sectors16 as u32
        }
    }

    /// Size of a cluster in bytes.
    pub fn cluster_size(&self) -> u32 {
        self.sectors_per_cluster as u32 * self.bytes_per_sector as u32
    }

    pub fn encode(&self) -> Sector {
        let mut sector = [0u8; SECTOR_SIZE];

        layout::write_bytes(&mut sector, JUMP.offset, &JUMP_BOOT);
        layout::write_bytes(&mut sector, OEM_NAME.offset, &self.oem_name);

        layout::write_u16(&mut sector, BYTES_PER_SECTOR, self.bytes_per_sector);
        layout::write_u8(&mut sector, SECTORS_PER_CLUSTER, self.sectors_per_cluster);
        layout::write_u16(&mut sector, RESERVED_SECTORS, self.reserved_sectors);
        layout::write_u8(&mut sector, FAT_COUNT, self.fat_count);
        layout::write_u16(&mut sector, ROOT_ENTRY_COUNT, self.root_entry_count);
        layout::write_u16(&mut sector, TOTAL_SECTORS_16, self.total_sectors16);
        layout::write_u8(&mut sector, MEDIA_DESCRIPTOR, self.media_descriptor);
        layout::write_u16(&mut sector, SECTORS_PER_FAT, self.sectors_per_fat);
        layout::write_u16(&mut sector, SECTORS_PER_TRACK, self.sectors_per_track);
        layout::write_u16(&mut sector, HEAD_COUNT, self.head_count);
        layout::write_u32(&mut sector, HIDDEN_SECTORS, self.hidden_sectors);
        layout::write_u32(&mut sector, TOTAL_SECTORS_32, self.total_sectors32);

        layout::write_u8(&mut sector, EXTENDED_SIGNATURE, EXTENDED_BOOT_SIGNATURE);
        layout::write_u32(&mut sector, VOLUME_SERIAL, self.volume_serial.0);
        layout::write_bytes(&mut sector, VOLUME_LABEL.offset, &self.volume_label);
        layout::write_bytes(&mut sector, FS_TYPE_LABEL.offset, &self.fs_type_label);

        layout::write_signature(&mut sector);
        sector
    }

    /// Parses the first 512 bytes of `buf`. Only the `55 AA` trailer is validated, geometry
    /// fields are returned as found.
    pub fn decode(buf: &[u8]) -> Result<BiosParameterBlock> {
        let sector = layout::require(buf, SECTOR_SIZE, Structure::BootSector)?;
        layout::check_signature(sector, Structure::BootSector)?;

        let bpb = Self {
            oem_name: layout::read_array(sector, OEM_NAME.offset),
            bytes_per_sector: layout::read_u16(sector, BYTES_PER_SECTOR),
            sectors_per_cluster: layout::read_u8(sector, SECTORS_PER_CLUSTER),
            reserved_sectors: layout::read_u16(sector, RESERVED_SECTORS),
            fat_count: layout::read_u8(sector, FAT_COUNT),
            root_entry_count: layout::read_u16(sector, ROOT_ENTRY_COUNT),
            total_sectors16: layout::read_u16(sector, TOTAL_SECTORS_16),
            media_descriptor: layout::read_u8(sector, MEDIA_DESCRIPTOR),
            sectors_per_fat: layout::read_u16(sector, SECTORS_PER_FAT),
            sectors_per_track: layout::read_u16(sector, SECTORS_PER_TRACK),
            head_count: layout::read_u16(sector, HEAD_COUNT),
            hidden_sectors: layout::read_u32(sector, HIDDEN_SECTORS),
            total_sectors32: layout::read_u32(sector, TOTAL_SECTORS_32),
            volume_serial: VolumeSerialNumber(layout::read_u32(sector, VOLUME_SERIAL)),
            volume_label: layout::read_array(sector, VOLUME_LABEL.offset),
            fs_type_label: layout::read_array(sector, FS_TYPE_LABEL.offset),
        };
        debug!(
            "boot sector: {} bytes/sector, {} sectors/cluster, {} total sectors",
            bpb.bytes_per_sector,
            bpb.sectors_per_cluster,
            bpb.total_sectors()
        );

        Ok(bpb)
    }
}

#[test]
fn analyzer_boot_sector() {
    let bpb = BiosParameterBlock::fat16(102400, VolumeSerialNumber(0x12345678));
    let sector = bpb.encode();

    assert_eq!(sector[..3], JUMP_BOOT);
    assert_eq!(&sector[3..11], b"MYFAT16 ");
    assert_eq!(sector[11..13], [0x00, 0x02]);
    assert_eq!(sector[13], 4);
    assert_eq!(sector[14..16], [1, 0]);
    assert_eq!(sector[16], 2);
    assert_eq!(sector[17..19], [0x00, 0x02]);
    assert_eq!(sector[19..21], [0, 0]);
    assert_eq!(sector[21], MEDIA_FIXED_DISK);
    assert_eq!(sector[22..24], [200, 0]);
    assert_eq!(sector[32..36], [0x00, 0x90, 0x01, 0x00]);
    assert_eq!(sector[62], EXTENDED_BOOT_SIGNATURE);
    assert_eq!(sector[63..67], [0x78, 0x56, 0x34, 0x12]);
    assert_eq!(&sector[67..78], b"FAT16_VOL  ");
    assert_eq!(&sector[82..90], b"FAT16   ");
    assert_eq!(sector[510..], [0x55, 0xAA]);
}

#[test]
fn round_trip() {
    let bpb = BiosParameterBlockBuilder::default()
        .oem_name(*b"mkfs.fat")
        .bytes_per_sector(2048)
        .sectors_per_cluster(16)
        .reserved_sectors(4)
        .fat_count(1)
        .root_entry_count(224)
        .total_sectors16(2880)
        .media_descriptor(0xF0)
        .sectors_per_fat(9)
        .sectors_per_track(18)
        .head_count(2)
        .hidden_sectors(63)
        .volume_serial(VolumeSerialNumber(0xDEADBEEF))
        .volume_label(*b"NO NAME    ")
        .fs_type_label(*b"FAT12   ")
        .build()
        .unwrap();

    assert_eq!(BiosParameterBlock::decode(&bpb.encode()).unwrap(), bpb);
}

#[test]
fn unset_fields_are_zero() {
    let bpb = BiosParameterBlockBuilder::default()
        .bytes_per_sector(512)
        .build()
        .unwrap();
    let sector = bpb.encode();

    assert_eq!(sector[13..62], [0u8; 49]);
    assert_eq!(sector[63..67], [0u8; 4]);
}

#[test]
fn total_sectors_dispatch() {
    let mut bpb = BiosParameterBlock::fat16(102400, VolumeSerialNumber::default());
    assert_eq!(bpb.total_sectors16, 0);
    assert_eq!(bpb.total_sectors(), 102400);

    bpb = BiosParameterBlock::fat16(20000, VolumeSerialNumber::default());
    assert_eq!(bpb.total_sectors16, 20000);
    assert_eq!(bpb.total_sectors32, 0);

    let decoded = BiosParameterBlock::decode(&bpb.encode()).unwrap();
    assert_eq!(decoded.total_sectors(), 20000);
}

#[test]
fn missing_trailer() {
    let sector = [0u8; SECTOR_SIZE];
    assert!(matches!(
        BiosParameterBlock::decode(&sector),
        Err(crate::error::Fat16Error::BadSignature {
            structure: Structure::BootSector,
            ..
        })
    ));
    assert!(matches!(
        BiosParameterBlock::decode(&sector[..100]),
        Err(crate::error::Fat16Error::InvalidLength { .. })
    ));
}
