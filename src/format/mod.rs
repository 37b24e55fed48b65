use std::io::{Cursor, Seek, SeekFrom, Write};

use alloc::{string::String, vec::Vec};
use derive_builder::Builder;
use log::{debug, warn};

use crate::{
    SECTOR_SIZE,
    boot_sector::BiosParameterBlock,
    dir::{Attributes, DIR_ENTRY_SIZE, DirectoryEntry},
    disk,
    error::{Fat16Error, Result},
    fat::Fat,
    geometry::{FIRST_DATA_CLUSTER, Geometry},
    mbr::{Bootstrap, PartitionEntry, PartitionTable},
    timestamp::DateTime,
};

mod boot;
mod fat;
mod root;

/// Index of the partition that receives the FAT16 volume.
pub const VOLUME_PARTITION: usize = 0;

/// A file or directory to seed into the root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub extension: String,
    pub attributes: Attributes,
    pub content: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: &str, extension: &str, attributes: Attributes, content: &[u8]) -> ImageFile {
        Self {
            name: name.into(),
            extension: extension.into(),
            attributes,
            content: content.into(),
        }
    }

    pub fn directory(name: &str) -> ImageFile {
        Self::new(name, "", Attributes::DIRECTORY, &[])
    }
}

/// Parameters of a partitioned disk image with a FAT16 volume in its first partition.
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct ImageOptions {
    pub partitions: PartitionTable,
    pub bpb: BiosParameterBlock,
    #[builder(default)]
    pub bootstrap: Bootstrap,
    /// Stamped on every directory entry.
    #[builder(default)]
    pub timestamp: DateTime,
    /// Size of the whole disk in bytes. Defaults to the end of the last partition.
    #[builder(default, setter(strip_option))]
    pub disk_size: Option<u64>,
}

impl ImageOptionsBuilder {
    fn validate(&self) -> core::result::Result<(), String> {
        if let Some(partitions) = &self.partitions {
            if partitions.entries()[VOLUME_PARTITION].is_unused() {
                return Err("the first partition must be in use".into());
            }
        }
        if let Some(bpb) = &self.bpb {
            if bpb.bytes_per_sector == 0 {
                return Err("bytes per sector must not be zero".into());
            }
            if bpb.sectors_per_cluster == 0 {
                return Err("sectors per cluster must not be zero".into());
            }
        }
        Ok(())
    }
}

/// Where a seeded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub entry: DirectoryEntry,
    /// Byte offset of the file's cluster, `None` for entries without a cluster.
    pub offset: Option<u64>,
}

/// Pre-computed layout of an image. All validation happens while building it, so writing never
/// stops halfway because of bad input.
#[derive(Debug, Clone)]
pub struct Formatter<'a> {
    options: &'a ImageOptions,
    partition: PartitionEntry,
    geometry: Geometry,
    fat: Fat,
    records: Vec<[u8; DIR_ENTRY_SIZE]>,
    placements: Vec<Placement>,
    contents: Vec<&'a [u8]>,
    disk_len: u64,
}

impl<'a> Formatter<'a> {
    pub fn try_new(options: &'a ImageOptions, files: &'a [ImageFile]) -> Result<Formatter<'a>> {
        let partition = options.partitions.entries()[VOLUME_PARTITION];
        if partition.is_unused() {
            return Err(Fat16Error::UnusedPartition(VOLUME_PARTITION));
        }

        let bpb = &options.bpb;
        let geometry = Geometry::new(bpb, partition.lba_start)?;
        let cluster_size = geometry.cluster_size();
        if cluster_size == 0 && !files.is_empty() {
            return Err(Fat16Error::InvalidClusterSize(bpb.sectors_per_cluster));
        }

        let fat_len = geometry.byte_offset(bpb.sectors_per_fat as u64) as usize;
        let mut fat = Fat::new(fat_len, bpb.media_descriptor);

        // every file occupies a root entry, everything but a volume label also a cluster
        let clusters_needed = files
            .iter()
            .filter(|f| !f.attributes.contains(Attributes::VOLUME_LABEL))
            .count() as u64;
        let available = geometry
            .data_cluster_count(partition.lba_end())
            .min(fat.cluster_capacity() as u64)
            .min(u16::MAX as u64 - FIRST_DATA_CLUSTER as u64);
        if files.len() > bpb.root_entry_count as usize || clusters_needed > available {
            return Err(Fat16Error::VolumeFull {
                requested: files.len() as u32,
                available: available.min(bpb.root_entry_count as u64) as u32,
            });
        }

        let mut records = Vec::with_capacity(files.len());
        let mut placements = Vec::with_capacity(files.len());
        let mut contents = Vec::with_capacity(files.len());
        let mut next_cluster = FIRST_DATA_CLUSTER;

        for file in files {
            let owns_cluster = !file.attributes.contains(Attributes::VOLUME_LABEL);
            let cluster = if owns_cluster {
                next_cluster += 1;
                next_cluster - 1
            } else {
                0
            };

            // directories and labels carry no data
            let mut content: &[u8] = if file
                .attributes
                .intersects(Attributes::DIRECTORY | Attributes::VOLUME_LABEL)
            {
                &[]
            } else {
                &file.content
            };
            if content.len() as u64 > cluster_size {
                warn!(
                    "{}.{}: truncating {} bytes to one cluster of {cluster_size} bytes",
                    file.name,
                    file.extension,
                    content.len()
                );
                content = &content[..cluster_size as usize];
            }

            let entry = DirectoryEntry::new(
                &file.name,
                &file.extension,
                file.attributes,
                options.timestamp,
                cluster as u16,
                content.len() as u32,
            );
            records.push(entry.encode()?);

            let offset = if owns_cluster {
                fat.set(cluster, crate::fat::FatEntry::eof())?;
                Some(geometry.cluster_offset(cluster)?)
            } else {
                None
            };
            debug!("{} -> cluster {cluster} at {offset:?}", entry.full_name());

            placements.push(Placement { entry, offset });
            contents.push(content);
        }

        let used_end = geometry.byte_offset(
            geometry
                .data_region_start
                .max(geometry.cluster_to_lba(next_cluster)?),
        );
        let disk_len = options
            .disk_size
            .unwrap_or(options.partitions.disk_sectors() * SECTOR_SIZE as u64)
            .max(used_end);

        Ok(Self {
            options,
            partition,
            geometry,
            fat,
            records,
            placements,
            contents,
            disk_len,
        })
    }

    /// Zero-fills the disk and writes MBR, boot sector, FAT copies, root directory and file data,
    /// in that address order.
    pub fn write<T: Write + Seek>(&self, device: &mut T) -> Result<()> {
        disk::write_zeroes(device, self.disk_len, 0)?;

        self.write_boot_region(device)?;
        self.write_fats(device)?;
        self.write_root(device)?;
        self.write_data(device)?;

        device.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn disk_len(&self) -> u64 {
        self.disk_len
    }
}

impl ImageOptions {
    /// The analyzer's 100 MiB demo disk.
    pub fn analyzer(serial: crate::boot_sector::VolumeSerialNumber, timestamp: DateTime) -> Self {
        let disk_size = 100 * crate::MB as u64;
        let partitions = PartitionTable::analyzer_layout((disk_size / SECTOR_SIZE as u64) as u32);
        let sectors = partitions.entries()[VOLUME_PARTITION].sector_count;

        Self {
            partitions,
            bpb: BiosParameterBlock::fat16(sectors, serial),
            bootstrap: Bootstrap::default(),
            timestamp,
            disk_size: Some(disk_size),
        }
    }

    /// Streams the image onto `device` and reports where each file was placed.
    pub fn write<T: Write + Seek>(
        &self,
        device: &mut T,
        files: &[ImageFile],
    ) -> Result<Vec<Placement>> {
        let formatter = Formatter::try_new(self, files)?;
        formatter.write(device)?;
        Ok(formatter.placements)
    }

    /// Builds the complete image in memory.
    pub fn assemble(&self, files: &[ImageFile]) -> Result<Vec<u8>> {
        let mut image = Cursor::new(Vec::new());
        Formatter::try_new(self, files)?.write(&mut image)?;
        Ok(image.into_inner())
    }
}

/// Builds an image from a partition table, a BPB and the files to seed, with the default MBR
/// bootstrap and every entry stamped at the FAT epoch.
pub fn assemble(
    partitions: PartitionTable,
    bpb: BiosParameterBlock,
    files: &[ImageFile],
) -> Result<Vec<u8>> {
    let options = ImageOptions {
        partitions,
        bpb,
        bootstrap: Bootstrap::default(),
        timestamp: DateTime::default(),
        disk_size: None,
    };
    options.assemble(files)
}

#[cfg(test)]
pub(crate) fn small_options() -> ImageOptions {
    use crate::mbr::PartitionType;

    let partitions = PartitionTable::new([
        PartitionEntry::lba(PartitionType::FAT16_LBA, 2048, 8192),
        PartitionEntry::default(),
        PartitionEntry::default(),
        PartitionEntry::default(),
    ]);
    ImageOptionsBuilder::default()
        .partitions(partitions)
        .bpb(BiosParameterBlock::fat16(
            8192,
            crate::boot_sector::VolumeSerialNumber(0xCAFE),
        ))
        .build()
        .unwrap()
}

#[test]
fn builder_validation() {
    let err = ImageOptionsBuilder::default()
        .partitions(PartitionTable::default())
        .bpb(BiosParameterBlock::fat16(8192, Default::default()))
        .build();
    assert!(err.is_err());

    let mut bpb = BiosParameterBlock::fat16(8192, Default::default());
    bpb.sectors_per_cluster = 0;
    let err = ImageOptionsBuilder::default()
        .partitions(small_options().partitions)
        .bpb(bpb)
        .build();
    assert!(err.is_err());

    // required fields
    assert!(ImageOptionsBuilder::default().build().is_err());
}

#[test]
fn cluster_allocation() {
    let options = small_options();
    let files = [
        ImageFile::new("README", "TXT", Attributes::ARCHIVE, b"hello"),
        ImageFile::directory("DOCS"),
        ImageFile::new("FAT16VOL", "", Attributes::VOLUME_LABEL, &[]),
        ImageFile::new("BIG", "BIN", Attributes::ARCHIVE, &[7u8; 5000]),
    ];
    let formatter = Formatter::try_new(&options, &files).unwrap();
    let placements = formatter.placements();

    assert_eq!(placements[0].entry.first_cluster, 2);
    assert_eq!(placements[0].offset, Some(2481 * 512));
    assert_eq!(placements[1].entry.first_cluster, 3);
    assert_eq!(placements[1].entry.file_size, 0);
    assert_eq!(placements[2].entry.first_cluster, 0);
    assert_eq!(placements[2].offset, None);
    assert_eq!(placements[3].entry.first_cluster, 4);
    // truncated to one 2 KiB cluster
    assert_eq!(placements[3].entry.file_size, 2048);

    assert_eq!(formatter.fat.allocated().collect::<Vec<_>>(), [2, 3, 4]);
    assert_eq!(formatter.disk_len(), (2048 + 8192) * 512);
}

#[test]
fn invalid_name_writes_nothing() {
    let options = small_options();
    let files = [
        ImageFile::new("OK", "TXT", Attributes::ARCHIVE, b"fine"),
        ImageFile::new("NOT VALID NAME", "TXT", Attributes::ARCHIVE, b"bad"),
    ];
    let mut device = Cursor::new(Vec::new());
    let err = options.write(&mut device, &files).unwrap_err();

    assert!(matches!(err, Fat16Error::InvalidName { .. }));
    assert!(device.into_inner().is_empty());
}

#[test]
fn too_many_files() {
    let mut options = small_options();
    options.bpb.root_entry_count = 16;
    let files: Vec<ImageFile> = (0..17)
        .map(|i| ImageFile::new(&format!("F{i}"), "", Attributes::ARCHIVE, &[]))
        .collect();

    assert!(matches!(
        Formatter::try_new(&options, &files),
        Err(Fat16Error::VolumeFull { requested: 17, .. })
    ));
}
