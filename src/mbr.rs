//! Master Boot Record and its four-slot partition table.
use core::fmt;

use log::debug;

use crate::{
    SECTOR_SIZE, Sector,
    error::{Fat16Error, Result, Structure},
    layout::{self, Field},
};

/// Number of slots in the partition table.
pub const PARTITION_COUNT: usize = 4;
/// Size of a single partition table slot.
pub const PARTITION_ENTRY_SIZE: usize = 16;
/// Offset of the first partition table slot.
pub const PARTITION_TABLE_OFFSET: usize = 446;

const JUMP: Field = Field::new(0, 3);
const OEM: Field = Field::new(3, 8);

// offsets within a partition table slot
const STATUS: usize = 0;
const CHS_START: Field = Field::new(1, 3);
const TYPE_CODE: usize = 4;
const CHS_END: Field = Field::new(5, 3);
const LBA_START: usize = 8;
const SECTOR_COUNT: usize = 12;

/// Status byte of the active partition.
const ACTIVE: u8 = 0x80;

/// Partition type code found at offset 4 of a partition table slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionType(pub u8);

impl PartitionType {
    pub const EMPTY: PartitionType = PartitionType(0x00);
    pub const FAT12: PartitionType = PartitionType(0x01);
    pub const FAT16: PartitionType = PartitionType(0x04);
    pub const FAT16B: PartitionType = PartitionType(0x06);
    pub const NTFS: PartitionType = PartitionType(0x07);
    pub const FAT32: PartitionType = PartitionType(0x0B);
    pub const FAT32_LBA: PartitionType = PartitionType(0x0C);
    pub const FAT16_LBA: PartitionType = PartitionType(0x0E);
    pub const EXTENDED_LBA: PartitionType = PartitionType(0x0F);
    pub const LINUX_SWAP: PartitionType = PartitionType(0x82);
    pub const LINUX: PartitionType = PartitionType(0x83);
    pub const LINUX_LVM: PartitionType = PartitionType(0x8E);
    pub const GPT_PROTECTIVE: PartitionType = PartitionType(0xEE);

    /// Short human label for well-known codes.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            PartitionType::EMPTY => "Empty",
            PartitionType::FAT12 => "FAT12",
            PartitionType::FAT16 => "FAT16",
            PartitionType::FAT16B => "FAT16B",
            PartitionType::NTFS => "NTFS",
            PartitionType::FAT32 => "FAT32",
            PartitionType::FAT32_LBA => "FAT32LBA",
            PartitionType::FAT16_LBA => "FAT16LBA",
            PartitionType::EXTENDED_LBA => "ExtLBA",
            PartitionType::LINUX_SWAP => "LinuxSwap",
            PartitionType::LINUX => "Linux",
            PartitionType::LINUX_LVM => "LinuxLVM",
            PartitionType::GPT_PROTECTIVE => "GPT",
            _ => return None,
        };
        Some(name)
    }

    pub fn is_unused(&self) -> bool {
        *self == PartitionType::EMPTY
    }
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// A cylinder/head/sector address in the legacy 3-byte packing:
/// - byte 0: head
/// - byte 1: sector (bits 0-5) and cylinder bits 8-9 (bits 6-7)
/// - byte 2: cylinder bits 0-7
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chs {
    cylinder: u16,
    head: u8,
    sector: u8,
}

impl Chs {
    /// `FE FF FF`, the marker used when a partition is addressed by LBA only.
    pub const LBA_ONLY: Chs = Chs {
        cylinder: 1023,
        head: 254,
        sector: 63,
    };

    pub fn new(cylinder: u16, head: u8, sector: u8) -> Result<Chs> {
        if cylinder > 1023 || !(1..=63).contains(&sector) {
            return Err(Fat16Error::InvalidChs {
                cylinder,
                head,
                sector,
            });
        }
        Ok(Chs {
            cylinder,
            head,
            sector,
        })
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Chs {
        Chs {
            head: bytes[0],
            sector: bytes[1] & 0x3F,
            cylinder: ((bytes[1] as u16 & 0xC0) << 2) | bytes[2] as u16,
        }
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [
            self.head,
            (self.sector & 0x3F) | ((self.cylinder >> 2) as u8 & 0xC0),
            self.cylinder as u8,
        ]
    }

    pub fn cylinder(&self) -> u16 {
        self.cylinder
    }

    pub fn head(&self) -> u8 {
        self.head
    }

    pub fn sector(&self) -> u8 {
        self.sector
    }
}

/// One 16-byte slot of the partition table. A zero type code marks an unused slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionEntry {
    pub bootable: bool,
    pub chs_start: Chs,
    pub type_code: PartitionType,
    pub chs_end: Chs,
    pub lba_start: u32,
    pub sector_count: u32,
}

impl PartitionEntry {
    /// A partition addressed purely by LBA, with both CHS fields set to [`Chs::LBA_ONLY`].
    pub fn lba(type_code: PartitionType, lba_start: u32, sector_count: u32) -> PartitionEntry {
        Self {
            bootable: false,
            chs_start: Chs::LBA_ONLY,
            type_code,
            chs_end: Chs::LBA_ONLY,
            lba_start,
            sector_count,
        }
    }

    pub fn is_unused(&self) -> bool {
        self.type_code.is_unused()
    }

    /// First sector past the end of the partition.
    pub fn lba_end(&self) -> u64 {
        self.lba_start as u64 + self.sector_count as u64
    }

    /// Byte offset of the partition's first sector. Partition table LBAs count 512-byte sectors.
    pub fn byte_offset(&self) -> u64 {
        self.lba_start as u64 * SECTOR_SIZE as u64
    }

    /// Byte length of the partition.
    pub fn byte_len(&self) -> u64 {
        self.sector_count as u64 * SECTOR_SIZE as u64
    }

    fn decode(slot: &[u8]) -> PartitionEntry {
        let status = layout::read_u8(slot, STATUS);
        Self {
            bootable: status & ACTIVE != 0,
            chs_start: Chs::from_bytes(layout::read_array(slot, CHS_START.offset)),
            type_code: PartitionType(layout::read_u8(slot, TYPE_CODE)),
            chs_end: Chs::from_bytes(layout::read_array(slot, CHS_END.offset)),
            lba_start: layout::read_u32(slot, LBA_START),
            sector_count: layout::read_u32(slot, SECTOR_COUNT),
        }
    }

    fn encode(&self, slot: &mut [u8]) {
        let status = if self.bootable { ACTIVE } else { 0 };
        layout::write_u8(slot, STATUS, status);
        layout::write_bytes(slot, CHS_START.offset, &self.chs_start.to_bytes());
        layout::write_u8(slot, TYPE_CODE, self.type_code.0);
        layout::write_bytes(slot, CHS_END.offset, &self.chs_end.to_bytes());
        layout::write_u32(slot, LBA_START, self.lba_start);
        layout::write_u32(slot, SECTOR_COUNT, self.sector_count);
    }
}

/// The 3-byte boot code marker and the 8-byte OEM string at the head of the MBR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bootstrap {
    pub jump: [u8; 3],
    pub oem: [u8; 8],
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            jump: [0xEB, 0x3C, 0x90],
            oem: *b"ANALYZER",
        }
    }
}

/// The fixed-width table of four partition slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionTable {
    entries: [PartitionEntry; PARTITION_COUNT],
}

impl PartitionTable {
    pub fn new(entries: [PartitionEntry; PARTITION_COUNT]) -> PartitionTable {
        Self { entries }
    }

    /// Builds a table from exactly four entries. Unused slots must be supplied as
    /// [`PartitionEntry::default`] rather than omitted.
    pub fn from_entries(entries: &[PartitionEntry]) -> Result<PartitionTable> {
        let entries = entries.try_into().map_err(|_| {
            Fat16Error::length(Structure::PartitionEntry, PARTITION_COUNT, entries.len())
        })?;
        Ok(Self { entries })
    }

    /// The disk layout produced by the analyzer: a 50 MiB FAT16 (LBA) partition at sector 2048,
    /// a 30 MiB Linux partition and a FAT32 partition filling the rest of a `disk_sectors` disk.
    pub fn analyzer_layout(disk_sectors: u32) -> PartitionTable {
        let fat16_sectors = 50 * crate::MB / SECTOR_SIZE as u32;
        let linux_sectors = 30 * crate::MB / SECTOR_SIZE as u32;

        let mut fat16 = PartitionEntry::lba(PartitionType::FAT16_LBA, 2048, fat16_sectors);
        fat16.bootable = true;
        fat16.chs_start = Chs {
            cylinder: 0,
            head: 1,
            sector: 1,
        };

        let linux_start = fat16.lba_start + fat16_sectors;
        let linux = PartitionEntry::lba(PartitionType::LINUX, linux_start, linux_sectors);

        let fat32_start = linux_start + linux_sectors;
        let fat32 = PartitionEntry::lba(
            PartitionType::FAT32,
            fat32_start,
            disk_sectors.saturating_sub(fat32_start),
        );

        Self::new([fat16, linux, fat32, PartitionEntry::default()])
    }

    pub fn entries(&self) -> &[PartitionEntry; PARTITION_COUNT] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PartitionEntry> {
        self.entries.get(index)
    }

    /// Number of sectors needed to hold every partition.
    pub fn disk_sectors(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| !e.is_unused())
            .map(PartitionEntry::lba_end)
            .max()
            .unwrap_or(1)
    }

    /// Writes the bootstrap marker, the four slots and the `55 AA` trailer into a fresh sector.
    pub fn encode(&self, bootstrap: &Bootstrap) -> Sector {
        let mut sector = [0u8; SECTOR_SIZE];

        layout::write_bytes(&mut sector, JUMP.offset, &bootstrap.jump);
        layout::write_bytes(&mut sector, OEM.offset, &bootstrap.oem);

        for (i, entry) in self.entries.iter().enumerate() {
            let offset = slot_offset(i);
            entry.encode(&mut sector[offset..offset + PARTITION_ENTRY_SIZE]);
        }

        layout::write_signature(&mut sector);
        sector
    }

    /// Parses the partition table out of the first 512 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<PartitionTable> {
        let sector = layout::require(buf, SECTOR_SIZE, Structure::MasterBootRecord)?;
        layout::check_signature(sector, Structure::MasterBootRecord)?;

        let mut entries = [PartitionEntry::default(); PARTITION_COUNT];
        for (i, entry) in entries.iter_mut().enumerate() {
            let offset = slot_offset(i);
            *entry = PartitionEntry::decode(&sector[offset..offset + PARTITION_ENTRY_SIZE]);
            debug!("partition #{i}: {entry:?}");
        }

        Ok(Self { entries })
    }
}

impl Bootstrap {
    /// Reads the marker and OEM string. No signature check is performed.
    pub fn decode(buf: &[u8]) -> Result<Bootstrap> {
        let sector = layout::require(buf, SECTOR_SIZE, Structure::MasterBootRecord)?;
        Ok(Self {
            jump: layout::read_array(sector, JUMP.offset),
            oem: layout::read_array(sector, OEM.offset),
        })
    }
}

const fn slot_offset(index: usize) -> usize {
    PARTITION_TABLE_OFFSET + PARTITION_ENTRY_SIZE * index
}

#[test]
fn analyzer_layout_bytes() {
    let disk_sectors = 100 * crate::MB / SECTOR_SIZE as u32;
    let table = PartitionTable::analyzer_layout(disk_sectors);
    let sector = table.encode(&Bootstrap::default());

    assert_eq!(sector[..3], [0xEB, 0x3C, 0x90]);
    assert_eq!(&sector[3..11], b"ANALYZER");
    assert_eq!(
        sector[446..462],
        [
            0x80, 0x01, 0x01, 0x00, 0x0E, 0xFE, 0xFF, 0xFF, 0x00, 0x08, 0x00, 0x00, 0x00, 0x90,
            0x01, 0x00
        ]
    );
    assert_eq!(sector[466], 0x83);
    assert_eq!(layout::read_u32(&sector, 470), 2048 + 102400);
    assert_eq!(sector[482], 0x0B);
    assert_eq!(sector[494..510], [0u8; 16]);
    assert_eq!(sector[510..], [0x55, 0xAA]);
}

#[test]
fn table_round_trip() {
    let table = PartitionTable::new([
        PartitionEntry {
            bootable: true,
            chs_start: Chs::new(0, 32, 33).unwrap(),
            type_code: PartitionType::FAT16_LBA,
            chs_end: Chs::new(1000, 200, 63).unwrap(),
            lba_start: 2048,
            sector_count: 102400,
        },
        PartitionEntry::lba(PartitionType::LINUX, 104448, 61440),
        PartitionEntry::default(),
        PartitionEntry::lba(PartitionType(0x42), 165888, 38912),
    ]);

    let decoded = PartitionTable::decode(&table.encode(&Bootstrap::default())).unwrap();
    assert_eq!(decoded, table);
    assert!(decoded.entries()[2].is_unused());
}

#[test]
fn missing_signature() {
    let mut sector = PartitionTable::default().encode(&Bootstrap::default());
    sector[511] = 0;
    assert!(matches!(
        PartitionTable::decode(&sector),
        Err(Fat16Error::BadSignature {
            structure: Structure::MasterBootRecord,
            found: 0x0055
        })
    ));
}

#[test]
fn requires_four_entries() {
    let entries = [PartitionEntry::default(); 3];
    assert!(matches!(
        PartitionTable::from_entries(&entries),
        Err(Fat16Error::InvalidLength {
            expected: 4,
            actual: 3,
            ..
        })
    ));
    assert!(PartitionTable::from_entries(&[PartitionEntry::default(); 4]).is_ok());
}

#[test]
fn chs_packing() {
    let chs = Chs::new(1023, 254, 63).unwrap();
    assert_eq!(chs.to_bytes(), [0xFE, 0xFF, 0xFF]);
    assert_eq!(Chs::from_bytes([0xFE, 0xFF, 0xFF]), Chs::LBA_ONLY);
    assert!(Chs::new(1024, 0, 1).is_err());
    assert!(Chs::new(0, 0, 0).is_err());
}

#[test]
fn type_names() {
    assert_eq!(PartitionType::FAT16_LBA.to_string(), "FAT16LBA");
    assert_eq!(PartitionType(0x42).to_string(), "0x42");
}
