use std::io::Cursor;

use fat16_fs::{
    Fat16Error, Volume,
    boot_sector::{BiosParameterBlock, BiosParameterBlockBuilder, VolumeSerialNumber},
    dir::{self, Attributes, DirectoryEntry},
    format::{self, ImageFile, ImageOptions, ImageOptionsBuilder},
    mbr::{PartitionEntry, PartitionTable, PartitionType},
    partition_bytes,
    timestamp::DateTime,
    volume,
};

const HELLO: &[u8] = b"Hello, FAT16!";

fn partitions() -> PartitionTable {
    PartitionTable::new([
        PartitionEntry::lba(PartitionType::FAT16_LBA, 2048, 8192),
        PartitionEntry::lba(PartitionType::LINUX, 2048 + 8192, 1024),
        PartitionEntry::default(),
        PartitionEntry::default(),
    ])
}

fn options() -> ImageOptions {
    ImageOptionsBuilder::default()
        .partitions(partitions())
        .bpb(BiosParameterBlock::fat16(8192, VolumeSerialNumber(0x0BAD_F00D)))
        .timestamp(DateTime::from_unix_seconds(1_700_000_000))
        .build()
        .unwrap()
}

fn hello_image() -> Vec<u8> {
    options()
        .assemble(&[
            ImageFile::new("FAT16VOL", "", Attributes::VOLUME_LABEL, &[]),
            ImageFile::new("HELLO", "TXT", Attributes::ARCHIVE, HELLO),
            ImageFile::directory("DOCS"),
            ImageFile::new("DATA", "BIN", Attributes::ARCHIVE, &[0x5A; 1500]),
        ])
        .unwrap()
}

#[test]
fn extract_hello() {
    let image = hello_image();

    // HELLO.TXT is the first file that owns a cluster
    let offset = 2481 * 512;
    assert_eq!(&image[offset..offset + HELLO.len()], HELLO);
    assert!(image[offset + HELLO.len()..offset + 2048].iter().all(|&b| b == 0));

    assert_eq!(volume::extract(&image, "HELLO", "TXT").unwrap(), HELLO);
    assert_eq!(volume::extract(&image, "data", "bin").unwrap(), [0x5A; 1500]);
    assert!(volume::extract(&image, "DOCS", "").unwrap().is_empty());
}

#[test]
fn root_listing() {
    let image = hello_image();
    let volume = Volume::open(image.as_slice()).unwrap();
    let entries = volume.entries().unwrap();

    let names: Vec<String> = entries.iter().map(DirectoryEntry::full_name).collect();
    assert_eq!(names, ["FAT16VOL", "HELLO.TXT", "DOCS", "DATA.BIN"]);

    let hello = &entries[1];
    assert_eq!(hello.first_cluster, 2);
    assert_eq!(hello.file_size, HELLO.len() as u32);
    assert_eq!(hello.create_date.year(), 2023);
    assert_eq!(hello.create_date.month(), 11);
    assert_eq!(hello.create_date.day(), 14);

    assert_eq!(entries[0].first_cluster, 0);
    assert!(entries[2].is_directory());
    assert_eq!(entries[2].first_cluster, 3);
    assert_eq!(entries[3].first_cluster, 4);

    // the label does not shadow a lookup by name
    assert!(matches!(
        volume.find("FAT16VOL", ""),
        Err(Fat16Error::NotFound { .. })
    ));
}

#[test]
fn missing_file() {
    let image = hello_image();
    let err = volume::extract(&image, "NOPE", "TXT").unwrap_err();
    assert!(matches!(err, Fat16Error::NotFound { ref name } if name == "NOPE.TXT"));
    assert_eq!(err.to_string(), "File `NOPE.TXT` not found in root directory.");
}

#[test]
fn truncated_data_region() {
    let image = hello_image();
    // keep the root directory, drop the data region
    let cut = &image[..2481 * 512 + 8];

    assert!(matches!(
        volume::extract(cut, "HELLO", "TXT"),
        Err(Fat16Error::TruncatedImage {
            offset: 1270272,
            length: 512,
            image_len: 1270280,
        })
    ));
}

#[test]
fn both_fats_mark_allocated_clusters() {
    let image = hello_image();
    let volume = Volume::open(image.as_slice()).unwrap();
    let fat = volume.fat().unwrap();

    assert_eq!(fat.media_descriptor(), Some(0xF8));
    assert!(fat.entry(1).unwrap().is_eof());
    for cluster in 2..=4 {
        assert!(fat.entry(cluster).unwrap().is_eof());
    }
    assert!(fat.entry(5).unwrap().is_free());

    let first = 2049 * 512;
    let second = 2249 * 512;
    let len = 200 * 512;
    assert_eq!(image[first..first + len], image[second..second + len]);
    assert_eq!(
        image[first..first + 10],
        [0xF8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
    );
}

#[test]
fn partition_slices() {
    let image = hello_image();
    assert_eq!(image.len(), (2048 + 8192 + 1024) * 512);

    let fat16 = partition_bytes(&image, 0).unwrap();
    assert_eq!(fat16.len(), 8192 * 512);
    assert_eq!(fat16[..3], [0xEB, 0x3C, 0x90]);
    assert_eq!(fat16[510..512], [0x55, 0xAA]);

    let linux = partition_bytes(&image, 1).unwrap();
    assert_eq!(linux.len(), 1024 * 512);
    assert!(linux.iter().all(|&b| b == 0));

    assert!(matches!(
        partition_bytes(&image, 2),
        Err(Fat16Error::UnusedPartition(2))
    ));
    assert!(matches!(
        partition_bytes(&image[..20 * 512], 1),
        Err(Fat16Error::TruncatedImage { .. })
    ));
}

#[test]
fn root_region_scan() {
    let image = hello_image();
    let root = &image[2449 * 512..2481 * 512];
    assert_eq!(dir::scan(root).count(), 4);

    // deleting HELLO.TXT hides it, zeroing DOCS ends the directory
    let mut root = root.to_vec();
    root[32] = dir::DELETED_MARKER;
    root[64] = dir::END_OF_DIRECTORY;
    let names: Vec<String> = dir::scan(&root).map(|e| e.full_name()).collect();
    assert_eq!(names, ["FAT16VOL"]);
}

#[test]
fn streaming_matches_in_memory() {
    let files = [ImageFile::new("HELLO", "TXT", Attributes::ARCHIVE, HELLO)];
    let options = options();

    let mut device = Cursor::new(vec![0xEEu8; 64]);
    let placements = options.write(&mut device, &files).unwrap();
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].offset, Some(2481 * 512));

    assert_eq!(device.into_inner(), options.assemble(&files).unwrap());
}

#[test]
fn free_assemble_defaults() {
    let bpb = BiosParameterBlockBuilder::default()
        .bytes_per_sector(512)
        .sectors_per_cluster(4)
        .reserved_sectors(1)
        .fat_count(2)
        .root_entry_count(512)
        .sectors_per_fat(200)
        .total_sectors32(8192)
        .media_descriptor(0xF8)
        .build()
        .unwrap();
    let files = [ImageFile::new("HELLO", "TXT", Attributes::ARCHIVE, HELLO)];
    let image = format::assemble(partitions(), bpb, &files).unwrap();

    let volume = Volume::open(image.as_slice()).unwrap();
    assert_eq!(volume.bpb(), &bpb);
    assert_eq!(volume.geometry().data_region_start, 2481);

    let entry = volume.find("HELLO", "TXT").unwrap();
    assert_eq!(entry.create_date.year(), 1980);
    assert_eq!(volume.read(&entry).unwrap(), HELLO);
}

#[test]
fn bpb_without_total_sectors() {
    let bpb = BiosParameterBlockBuilder::default()
        .bytes_per_sector(512)
        .sectors_per_cluster(4)
        .reserved_sectors(1)
        .fat_count(2)
        .root_entry_count(512)
        .sectors_per_fat(200)
        .build()
        .unwrap();
    assert_eq!(bpb.total_sectors(), 0);

    let files = [ImageFile::new("HELLO", "TXT", Attributes::ARCHIVE, HELLO)];
    let image = format::assemble(partitions(), bpb, &files).unwrap();

    let offset = 2481 * 512;
    assert_eq!(&image[offset..offset + HELLO.len()], HELLO);
    assert_eq!(volume::extract(&image, "HELLO", "TXT").unwrap(), HELLO);
}

#[test]
fn label_content_is_dropped() {
    let image = options()
        .assemble(&[
            ImageFile::new("MYVOL", "", Attributes::VOLUME_LABEL, b"abc"),
            ImageFile::new("HELLO", "TXT", Attributes::ARCHIVE, HELLO),
        ])
        .unwrap();
    let volume = Volume::open(image.as_slice()).unwrap();
    let entries = volume.entries().unwrap();

    let label = &entries[0];
    assert!(label.is_volume_label());
    assert_eq!(label.first_cluster, 0);
    assert_eq!(label.file_size, 0);
    assert!(volume.read(label).unwrap().is_empty());

    assert_eq!(entries[1].first_cluster, 2);
    assert_eq!(volume.read(&entries[1]).unwrap(), HELLO);
}

#[test]
fn unused_first_partition() {
    let mut options = options();
    options.partitions = PartitionTable::new([
        PartitionEntry::default(),
        PartitionEntry::lba(PartitionType::FAT16_LBA, 2048, 8192),
        PartitionEntry::default(),
        PartitionEntry::default(),
    ]);
    assert!(matches!(
        options.assemble(&[]),
        Err(Fat16Error::UnusedPartition(0))
    ));
}
