//! Human-readable rendering of decoded structures. Nothing here is used by the codecs.
use core::fmt;

use alloc::string::String;

use crate::{boot_sector::BiosParameterBlock, dir::DirectoryEntry, mbr::PartitionEntry};

/// Region labels of the master boot record.
pub const MBR_LABELS: &[(usize, &str)] = &[
    (0, "BOOT"),
    (446, "PART1"),
    (462, "PART2"),
    (478, "PART3"),
    (494, "PART4"),
    (510, "SIG"),
];

/// Region labels of a FAT16 boot sector.
pub const BOOT_SECTOR_LABELS: &[(usize, &str)] = &[
    (0, "JUMP"),
    (3, "OEM"),
    (11, "BPB"),
    (36, "BOOT"),
    (510, "SIG"),
];

const ROW: usize = 16;

/// Hex dump with 16 bytes per row. A row is prefixed with the first label whose offset falls
/// inside it.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a> {
    bytes: &'a [u8],
    base_offset: u64,
    labels: &'a [(usize, &'a str)],
}

pub fn hexdump<'a>(
    bytes: &'a [u8],
    base_offset: u64,
    labels: &'a [(usize, &'a str)],
) -> HexDump<'a> {
    HexDump {
        bytes,
        base_offset,
        labels,
    }
}

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.bytes.chunks(ROW).enumerate() {
            let start = row * ROW;
            let label = self
                .labels
                .iter()
                .find(|(offset, _)| (start..start + ROW).contains(offset))
                .map(|(_, label)| *label);
            match label {
                Some(label) => write!(f, "{:<7}", alloc::format!("{label}:"))?,
                None => f.write_str("       ")?,
            }

            write!(f, "{:08X}: ", self.base_offset + start as u64)?;
            for i in 0..ROW {
                match chunk.get(i) {
                    Some(b) => write!(f, "{b:02X} ")?,
                    None => f.write_str("   ")?,
                }
                if i == 7 {
                    f.write_str(" ")?;
                }
            }

            f.write_str("|")?;
            for &b in chunk {
                let c = if (0x20..0x7F).contains(&b) { b as char } else { '.' };
                write!(f, "{c}")?;
            }
            writeln!(f, "|")?;
        }
        Ok(())
    }
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unused() {
            return f.write_str("empty");
        }
        write!(
            f,
            "{:<9} {} LBA {:>8} .. {:>8} ({} sectors, {} MiB)",
            self.type_code,
            if self.bootable { '*' } else { ' ' },
            self.lba_start,
            self.lba_end(),
            self.sector_count,
            self.byte_len() / crate::MB as u64
        )
    }
}

impl fmt::Display for BiosParameterBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OEM name:            {}", String::from_utf8_lossy(&self.oem_name))?;
        writeln!(f, "Bytes per sector:    {}", self.bytes_per_sector)?;
        writeln!(f, "Sectors per cluster: {}", self.sectors_per_cluster)?;
        writeln!(f, "Reserved sectors:    {}", self.reserved_sectors)?;
        writeln!(f, "FAT copies:          {}", self.fat_count)?;
        writeln!(f, "Root entries:        {}", self.root_entry_count)?;
        writeln!(f, "Total sectors:       {}", self.total_sectors())?;
        writeln!(f, "Media descriptor:    {:#04X}", self.media_descriptor)?;
        writeln!(f, "Sectors per FAT:     {}", self.sectors_per_fat)?;
        writeln!(f, "Volume serial:       {:08X}", self.volume_serial.0)?;
        writeln!(f, "Volume label:        {}", String::from_utf8_lossy(&self.volume_label))?;
        write!(f, "File system:         {}", String::from_utf8_lossy(&self.fs_type_label))
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_directory() {
            "<DIR>"
        } else if self.is_volume_label() {
            "<VOL>"
        } else {
            ""
        };
        let (date, time) = (self.create_date, self.create_time);
        write!(
            f,
            "{:<12} {kind:>5} {:>10} cluster {:>5}  {:04}-{:02}-{:02} {:02}:{:02}:{:02}  {:?}",
            self.full_name(),
            self.file_size,
            self.first_cluster,
            date.year(),
            date.month(),
            date.day(),
            time.hour(),
            time.minute(),
            time.second(),
            self.attributes
        )
    }
}

#[test]
fn labelled_rows() {
    let sector = crate::mbr::PartitionTable::default().encode(&Default::default());
    let dump = hexdump(&sector, 0, MBR_LABELS).to_string();
    let lines: Vec<&str> = dump.lines().collect();

    assert_eq!(lines.len(), 32);
    assert_eq!(
        lines[0],
        "BOOT:  00000000: EB 3C 90 41 4E 41 4C 59  5A 45 52 00 00 00 00 00 |.<.ANALYZER.....|"
    );
    // 446 = 0x1BE lies in the row starting at 0x1B0
    assert!(lines[27].starts_with("PART1: 000001B0: "));
    assert!(lines[30].starts_with("PART4: 000001E0: "));
    assert!(lines[31].starts_with("SIG:   000001F0: "));
    assert!(lines[31].ends_with("55 AA |..............U.|"));
}

#[test]
fn short_last_row() {
    let dump = hexdump(b"HELLO", 0x1000, &[]).to_string();
    assert_eq!(
        dump,
        "       00001000: 48 45 4C 4C 4F                                   |HELLO|\n"
    );
}

#[test]
fn offsets_keep_their_width() {
    let sector = [0u8; 48];
    let dump = hexdump(&sector, 0x10_0000, BOOT_SECTOR_LABELS).to_string();
    let lines: Vec<&str> = dump.lines().collect();

    assert!(lines[0].starts_with("JUMP:  00100000: "));
    assert!(lines[1].starts_with("       00100010: "));
    assert!(lines[2].starts_with("BOOT:  00100020: "));
    assert!(lines.iter().all(|l| l.len() == lines[0].len()));
}
