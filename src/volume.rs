//! Read access to the FAT16 volume in the first partition of a disk image.
use core::ops::Range;

use alloc::{format, vec::Vec};
use checked_num::CheckedU64;
use log::{debug, warn};

use crate::{
    SECTOR_SIZE,
    boot_sector::BiosParameterBlock,
    dir::{self, DirectoryEntry},
    disk::ReadOffset,
    error::{Fat16Error, Result},
    fat::Fat,
    format::VOLUME_PARTITION,
    geometry::Geometry,
    mbr::PartitionTable,
};

/// A disk image opened through its MBR, with the geometry of its first partition resolved.
#[derive(Debug, Clone)]
pub struct Volume<O: ReadOffset> {
    device: O,
    partitions: PartitionTable,
    bpb: BiosParameterBlock,
    geometry: Geometry,
}

impl<O: ReadOffset> Volume<O> {
    /// Decodes the MBR, then the boot sector of the first partition, and derives the geometry.
    pub fn open(device: O) -> Result<Volume<O>> {
        let image_len = device.size()?;

        // a short image is reported by the MBR decoder as a length error
        let mut mbr = alloc::vec![0u8; image_len.min(SECTOR_SIZE as u64) as usize];
        device.read_exact_at(0, &mut mbr)?;
        let partitions = PartitionTable::decode(&mbr)?;

        let partition = partitions.entries()[VOLUME_PARTITION];
        if partition.is_unused() {
            warn!("partition #{VOLUME_PARTITION} is marked unused, reading it anyway");
        }
        let boot = read_range(&device, partition.byte_offset(), SECTOR_SIZE as u64)?;
        let bpb = BiosParameterBlock::decode(&boot)?;
        let geometry = Geometry::new(&bpb, partition.lba_start)?;
        debug!("{geometry:?}");

        Ok(Self {
            device,
            partitions,
            bpb,
            geometry,
        })
    }

    pub fn partition_table(&self) -> &PartitionTable {
        &self.partitions
    }

    pub fn bpb(&self) -> &BiosParameterBlock {
        &self.bpb
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn device(&self) -> &O {
        &self.device
    }

    /// Byte range of partition `index` within the image.
    pub fn partition_range(&self, index: usize) -> Result<Range<u64>> {
        partition_range(&self.partitions, index)
    }

    /// The first copy of the File Allocation Table.
    pub fn fat(&self) -> Result<Fat> {
        let offset = (CheckedU64::new(self.geometry.fat_start(0))
            * self.geometry.bytes_per_sector as u64)
            .ok_or(self.truncated(u64::MAX, 0))?;
        let length = self.geometry.byte_offset(self.geometry.sectors_per_fat as u64);
        Fat::decode(&self.read_range(offset, length)?)
    }

    /// Raw bytes of the fixed-size root directory region.
    pub fn root_dir(&self) -> Result<Vec<u8>> {
        let offset = self.geometry.byte_offset(self.geometry.root_dir_start);
        self.read_range(offset, self.geometry.root_dir_bytes())
    }

    /// Every live entry of the root directory, in on-disk order.
    pub fn entries(&self) -> Result<Vec<DirectoryEntry>> {
        let region = self.root_dir()?;
        Ok(dir::scan(&region).collect())
    }

    /// Looks up `name.extension` in the root directory, ignoring case. Volume labels never match.
    pub fn find(&self, name: &str, extension: &str) -> Result<DirectoryEntry> {
        let region = self.root_dir()?;
        dir::scan(&region)
            .filter(|entry| !entry.is_volume_label())
            .find(|entry| entry.matches(name, extension))
            .ok_or_else(|| Fat16Error::NotFound {
                name: display_name(name, extension),
            })
    }

    /// Reads the content of a single-cluster file: `ceil(file_size / bytes_per_sector)` sectors
    /// from the entry's first cluster, cut down to `file_size` bytes.
    pub fn read(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        let size = entry.len() as u64;
        if size == 0 {
            return Ok(Vec::new());
        }

        let lba = self.geometry.cluster_to_lba(entry.first_cluster as u32)?;
        let bytes_per_sector = self.geometry.bytes_per_sector as u64;
        let sectors = self.geometry.sectors_for(size);

        let offset =
            (CheckedU64::new(lba) * bytes_per_sector).ok_or(self.truncated(lba, size))?;
        let length = (CheckedU64::new(sectors) * bytes_per_sector)
            .ok_or(self.truncated(offset, size))?;
        debug!(
            "reading {} ({size} bytes) from cluster {} at {offset:#x}",
            entry.full_name(),
            entry.first_cluster
        );

        let mut data = self.read_range(offset, length)?;
        data.truncate(size as usize);
        Ok(data)
    }

    /// Finds and reads `name.extension` in one step.
    pub fn extract(&self, name: &str, extension: &str) -> Result<Vec<u8>> {
        let entry = self.find(name, extension)?;
        self.read(&entry)
    }

    fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        read_range(&self.device, offset, length)
    }

    fn truncated(&self, offset: u64, length: u64) -> Fat16Error {
        Fat16Error::TruncatedImage {
            offset,
            length,
            image_len: self.device.size().unwrap_or(0),
        }
    }
}

/// Reads exactly `length` bytes at `offset`, failing with [`Fat16Error::TruncatedImage`] when the
/// range does not lie within the device.
fn read_range<O: ReadOffset>(device: &O, offset: u64, length: u64) -> Result<Vec<u8>> {
    let image_len = device.size()?;
    let truncated = || Fat16Error::TruncatedImage {
        offset,
        length,
        image_len,
    };

    let end = (CheckedU64::new(offset) + length).ok_or(truncated())?;
    if end > image_len {
        return Err(truncated());
    }
    let len = usize::try_from(length).map_err(|_| truncated())?;

    let mut buf = alloc::vec![0u8; len];
    device.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}

fn partition_range(partitions: &PartitionTable, index: usize) -> Result<Range<u64>> {
    let entry = partitions
        .get(index)
        .filter(|e| !e.is_unused())
        .ok_or(Fat16Error::UnusedPartition(index))?;
    let start = entry.byte_offset();
    Ok(start..start + entry.byte_len())
}

fn display_name(name: &str, extension: &str) -> alloc::string::String {
    let (name, extension) = (name.trim_end_matches(' '), extension.trim_end_matches(' '));
    if extension.is_empty() {
        name.into()
    } else {
        format!("{name}.{extension}")
    }
}

/// The raw bytes of partition `index`, located through the image's MBR.
pub fn partition_bytes(image: &[u8], index: usize) -> Result<&[u8]> {
    let partitions = PartitionTable::decode(image)?;
    let range = partition_range(&partitions, index)?;
    if range.end > image.len() as u64 {
        return Err(Fat16Error::TruncatedImage {
            offset: range.start,
            length: range.end - range.start,
            image_len: image.len() as u64,
        });
    }
    Ok(&image[range.start as usize..range.end as usize])
}

/// Extracts `name.extension` from the root directory of the image's first partition.
pub fn extract(image: &[u8], name: &str, extension: &str) -> Result<Vec<u8>> {
    Volume::open(image)?.extract(name, extension)
}

#[cfg(test)]
fn hello_image() -> Vec<u8> {
    use crate::{
        dir::Attributes,
        format::{ImageFile, small_options},
    };

    small_options()
        .assemble(&[
            ImageFile::new("HELLO", "TXT", Attributes::ARCHIVE, b"Hello, FAT16!"),
            ImageFile::directory("DOCS"),
        ])
        .unwrap()
}

#[test]
fn open_resolves_geometry() {
    let image = hello_image();
    let volume = Volume::open(image.as_slice()).unwrap();

    assert_eq!(volume.geometry().data_region_start, 2481);
    assert_eq!(volume.bpb().volume_serial.0, 0xCAFE);
    assert_eq!(volume.partition_range(0).unwrap(), 2048 * 512..(2048 + 8192) * 512);
    assert!(matches!(
        volume.partition_range(1),
        Err(Fat16Error::UnusedPartition(1))
    ));
}

#[test]
fn find_ignores_case() {
    let image = hello_image();
    let volume = Volume::open(image.as_slice()).unwrap();

    let entry = volume.find("hello", "txt").unwrap();
    assert_eq!(entry.first_cluster, 2);
    assert_eq!(volume.read(&entry).unwrap(), b"Hello, FAT16!");

    let docs = volume.find("DOCS", "").unwrap();
    assert!(docs.is_directory());
    assert!(volume.read(&docs).unwrap().is_empty());

    assert!(matches!(
        volume.find("MISSING", "TXT"),
        Err(Fat16Error::NotFound { name }) if name == "MISSING.TXT"
    ));
}

#[test]
fn short_mbr() {
    let image = [0u8; 100];
    assert!(matches!(
        Volume::open(&image[..]),
        Err(Fat16Error::InvalidLength { actual: 100, .. })
    ));
}

#[test]
fn boot_sector_past_end() {
    let image = hello_image();
    assert!(matches!(
        Volume::open(&image[..2048 * 512]),
        Err(Fat16Error::TruncatedImage {
            offset: 1048576,
            length: 512,
            ..
        })
    ));
}
