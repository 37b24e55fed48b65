//! # FAT16
//!
//! Construction and parsing of MBR-partitioned disk images carrying a FAT16 volume in their first
//! partition.
//!
//! ## Usage
//!
//! ```rust
//! use fat16_fs::{
//!     boot_sector::{BiosParameterBlock, VolumeSerialNumber},
//!     dir::Attributes,
//!     format::{ImageFile, ImageOptionsBuilder},
//!     mbr::{PartitionEntry, PartitionTable, PartitionType},
//!     volume,
//! };
//!
//! let partitions = PartitionTable::new([
//!     PartitionEntry::lba(PartitionType::FAT16_LBA, 2048, 8192),
//!     PartitionEntry::default(),
//!     PartitionEntry::default(),
//!     PartitionEntry::default(),
//! ]);
//!
//! let options = ImageOptionsBuilder::default()
//!     .partitions(partitions)
//!     .bpb(BiosParameterBlock::fat16(8192, VolumeSerialNumber(0x1234_5678)))
//!     .build()
//!     .unwrap();
//!
//! let image = options
//!     .assemble(&[ImageFile::new("HELLO", "TXT", Attributes::ARCHIVE, b"Hello, FAT16!")])
//!     .unwrap();
//!
//! assert_eq!(volume::extract(&image, "HELLO", "TXT").unwrap(), b"Hello, FAT16!");
//! ```
//!
//! ## Limitations
//! Files occupy a single cluster: content beyond one cluster is not written and FAT chains are
//! never followed. Only the fixed-size root directory is supported.

extern crate alloc;

/// Boot sector and BIOS Parameter Block
pub mod boot_sector;
/// Directory entries and root directory scanning
pub mod dir;
/// Disk utility functions
pub mod disk;
pub mod dump;
pub mod error;
pub mod fat;
/// Image construction
pub mod format;
pub mod geometry;
pub(crate) mod layout;
/// Master Boot Record
pub mod mbr;
pub mod timestamp;
pub mod volume;

pub const MB: u32 = 1024 * 1024;
pub const KB: u16 = 1024;

/// Size of the sectors addressed by the partition table.
pub const SECTOR_SIZE: usize = 512;

pub type Sector = [u8; SECTOR_SIZE];

pub use error::{Fat16Error, Result};
pub use volume::{Volume, extract, partition_bytes};
