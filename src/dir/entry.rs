// http://www.c-jump.com/CIS24/Slides/FAT/lecture.html
use alloc::string::String;

use bitflags::bitflags;

use crate::{
    error::{Fat16Error, Result, Structure},
    layout::{self, Field},
    timestamp::{DateTime, FatDate, FatTime},
};

/// Size of a short directory entry.
pub const DIR_ENTRY_SIZE: usize = 32;
/// First name byte of a deleted entry.
pub const DELETED_MARKER: u8 = 0xE5;
/// First name byte of the end-of-directory marker.
pub const END_OF_DIRECTORY: u8 = 0x00;

const NAME: Field = Field::new(0, 8);
const EXTENSION: Field = Field::new(8, 3);
const ATTRIBUTES: usize = 11;
const CREATE_TIME: usize = 14;
const CREATE_DATE: usize = 16;
const ACCESS_DATE: usize = 18;
const WRITE_TIME: usize = 22;
const WRITE_DATE: usize = 24;
const FIRST_CLUSTER: usize = 26;
const FILE_SIZE: usize = 28;

bitflags! {
    /// Attribute byte of a directory entry. Bits are independent, several may be set at once.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_LABEL = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
    }
}

/// A short (8.3) directory entry. `name` and `extension` are stored without padding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub extension: String,
    pub attributes: Attributes,
    pub create_time: FatTime,
    pub create_date: FatDate,
    pub first_cluster: u16,
    /// Always `0` for directories.
    pub file_size: u32,
}

/// Result of decoding a single 32-byte directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirSlot {
    /// No valid entries follow.
    EndOfDirectory,
    /// Skipped during scanning.
    Deleted,
    Entry(DirectoryEntry),
}

impl DirectoryEntry {
    pub fn new(
        name: &str,
        extension: &str,
        attributes: Attributes,
        stamp: DateTime,
        first_cluster: u16,
        file_size: u32,
    ) -> DirectoryEntry {
        Self {
            name: name.trim_end_matches(' ').into(),
            extension: extension.trim_end_matches(' ').into(),
            attributes,
            create_time: stamp.time,
            create_date: stamp.date,
            first_cluster,
            file_size,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes.contains(Attributes::VOLUME_LABEL)
    }

    /// Byte length as stored on disk: directories carry none.
    pub fn len(&self) -> u32 {
        if self.is_directory() {
            0
        } else {
            self.file_size
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `NAME.EXT`, or just `NAME` when there is no extension.
    pub fn full_name(&self) -> String {
        if self.extension.is_empty() {
            self.name.clone()
        } else {
            alloc::format!("{}.{}", self.name, self.extension)
        }
    }

    /// Compares against a name and extension the way FAT does: ignoring case and trailing padding.
    pub fn matches(&self, name: &str, extension: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim_end_matches(' '))
            && self
                .extension
                .eq_ignore_ascii_case(extension.trim_end_matches(' '))
    }

    /// Packs the entry into its 32-byte on-disk form. The name is validated before any byte is
    /// produced.
    pub fn encode(&self) -> Result<[u8; DIR_ENTRY_SIZE]> {
        let name = pad::<8>(&self.name, false)?;
        let extension = pad::<3>(&self.extension, true)?;

        let mut record = [0u8; DIR_ENTRY_SIZE];
        layout::write_bytes(&mut record, NAME.offset, &name);
        layout::write_bytes(&mut record, EXTENSION.offset, &extension);
        layout::write_u8(&mut record, ATTRIBUTES, self.attributes.bits());

        let time = self.create_time.bits();
        let date = self.create_date.bits();
        layout::write_u16(&mut record, CREATE_TIME, time);
        layout::write_u16(&mut record, CREATE_DATE, date);
        layout::write_u16(&mut record, ACCESS_DATE, date);
        layout::write_u16(&mut record, WRITE_TIME, time);
        layout::write_u16(&mut record, WRITE_DATE, date);

        layout::write_u16(&mut record, FIRST_CLUSTER, self.first_cluster);
        layout::write_u32(&mut record, FILE_SIZE, self.len());

        Ok(record)
    }
}

impl DirSlot {
    /// Decodes the first 32 bytes of `buf`.
    pub fn decode(buf: &[u8]) -> Result<DirSlot> {
        let record = layout::require(buf, DIR_ENTRY_SIZE, Structure::DirectoryEntry)?;
        Ok(Self::from_record(record))
    }

    /// `record` must hold at least 32 bytes.
    pub(crate) fn from_record(record: &[u8]) -> DirSlot {
        match record[0] {
            END_OF_DIRECTORY => return DirSlot::EndOfDirectory,
            DELETED_MARKER => return DirSlot::Deleted,
            _ => {}
        }

        let attributes = Attributes::from_bits_retain(layout::read_u8(record, ATTRIBUTES));
        let mut entry = DirectoryEntry {
            name: unpad(NAME.slice(record)),
            extension: unpad(EXTENSION.slice(record)),
            attributes,
            create_time: FatTime::from_bits(layout::read_u16(record, WRITE_TIME)),
            create_date: FatDate::from_bits(layout::read_u16(record, WRITE_DATE)),
            first_cluster: layout::read_u16(record, FIRST_CLUSTER),
            file_size: layout::read_u32(record, FILE_SIZE),
        };
        entry.file_size = entry.len();

        DirSlot::Entry(entry)
    }
}

/// Right-pads `value` with spaces to `N` bytes.
fn pad<const N: usize>(value: &str, allow_empty: bool) -> Result<[u8; N]> {
    let trimmed = value.trim_end_matches(' ');
    let invalid = |reason| Fat16Error::InvalidName {
        name: value.into(),
        reason,
    };

    if trimmed.is_empty() && !allow_empty {
        return Err(invalid("name is empty"));
    }
    if trimmed.len() > N {
        return Err(invalid("too long"));
    }
    if !trimmed.bytes().all(|b| b.is_ascii() && !b.is_ascii_control()) {
        return Err(invalid("not printable 7-bit ASCII"));
    }

    let mut out = [b' '; N];
    out[..trimmed.len()].copy_from_slice(trimmed.as_bytes());
    Ok(out)
}

fn unpad(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
fn stamp() -> DateTime {
    DateTime::new(
        FatDate::new(2024, 5, 17).unwrap(),
        FatTime::new(10, 30, 12).unwrap(),
    )
}

#[test]
fn hello_txt_layout() {
    let entry = DirectoryEntry::new("HELLO   ", "TXT", Attributes::ARCHIVE, stamp(), 2, 13);
    let record = entry.encode().unwrap();

    assert_eq!(&record[0..8], b"HELLO   ");
    assert_eq!(&record[8..11], b"TXT");
    assert_eq!(record[11], 0x20);
    assert_eq!(record[22..24], ((10u16 << 11) | (30 << 5) | 6).to_le_bytes());
    assert_eq!(record[24..26], ((44u16 << 9) | (5 << 5) | 17).to_le_bytes());
    assert_eq!(record[26..28], [2, 0]);
    assert_eq!(record[28..32], [13, 0, 0, 0]);

    assert_eq!(DirSlot::decode(&record).unwrap(), DirSlot::Entry(entry));
}

#[test]
fn markers() {
    let mut record = [0u8; DIR_ENTRY_SIZE];
    assert_eq!(DirSlot::decode(&record).unwrap(), DirSlot::EndOfDirectory);

    record[0] = DELETED_MARKER;
    assert_eq!(DirSlot::decode(&record).unwrap(), DirSlot::Deleted);

    assert!(matches!(
        DirSlot::decode(&record[..16]),
        Err(Fat16Error::InvalidLength { .. })
    ));
}

#[test]
fn attribute_bits_are_independent() {
    let mut record = DirectoryEntry::new("SYSTEM", "SYS", Attributes::empty(), stamp(), 6, 11)
        .encode()
        .unwrap();
    record[11] = 0x06;

    let DirSlot::Entry(entry) = DirSlot::decode(&record).unwrap() else {
        panic!("expected an entry");
    };
    assert_eq!(entry.attributes, Attributes::HIDDEN | Attributes::SYSTEM);
}

#[test]
fn directories_have_no_length() {
    let entry = DirectoryEntry::new("DOCS", "", Attributes::DIRECTORY, stamp(), 5, 4096);
    let record = entry.encode().unwrap();
    assert_eq!(record[28..32], [0; 4]);

    let DirSlot::Entry(decoded) = DirSlot::decode(&record).unwrap() else {
        panic!("expected an entry");
    };
    assert_eq!(decoded.file_size, 0);
    assert_eq!(decoded.full_name(), "DOCS");

    // a length smuggled into the raw bytes is ignored as well
    let mut raw = record;
    raw[28] = 0xFF;
    let DirSlot::Entry(decoded) = DirSlot::decode(&raw).unwrap() else {
        panic!("expected an entry");
    };
    assert_eq!(decoded.file_size, 0);
}

#[test]
fn invalid_names() {
    let too_long = DirectoryEntry::new("TOOLONGNAME", "TXT", Attributes::ARCHIVE, stamp(), 2, 0);
    assert!(matches!(
        too_long.encode(),
        Err(Fat16Error::InvalidName { .. })
    ));

    let non_ascii = DirectoryEntry::new("FÜR", "TXT", Attributes::ARCHIVE, stamp(), 2, 0);
    assert!(matches!(
        non_ascii.encode(),
        Err(Fat16Error::InvalidName { .. })
    ));

    let long_ext = DirectoryEntry::new("A", "JPEG", Attributes::ARCHIVE, stamp(), 2, 0);
    assert!(matches!(
        long_ext.encode(),
        Err(Fat16Error::InvalidName { .. })
    ));

    let empty = DirectoryEntry::new("", "TXT", Attributes::ARCHIVE, stamp(), 2, 0);
    assert!(empty.encode().is_err());
}

#[test]
fn name_matching() {
    let entry = DirectoryEntry::new("README", "TXT", Attributes::ARCHIVE, stamp(), 2, 10);
    assert!(entry.matches("readme", "txt"));
    assert!(entry.matches("README  ", "TXT"));
    assert!(!entry.matches("README", "INI"));
    assert_eq!(entry.full_name(), "README.TXT");
}
