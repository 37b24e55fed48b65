use std::{error::Error, fs::OpenOptions};

use fat16_fs::{
    SECTOR_SIZE, Volume,
    boot_sector::VolumeSerialNumber,
    dir::Attributes,
    disk::ReadOffset,
    dump::{BOOT_SECTOR_LABELS, MBR_LABELS, hexdump},
    format::{ImageFile, ImageOptions},
    timestamp::DateTime,
};

const DEFAULT_IMAGE: &str = "multipartition_disk.img";

fn demo_files() -> Vec<ImageFile> {
    vec![
        ImageFile::new(
            "README",
            "TXT",
            Attributes::ARCHIVE,
            b"FAT16 test volume.\r\nBuilt by fat16-fs.\r\n",
        ),
        ImageFile::new(
            "CONFIG",
            "INI",
            Attributes::ARCHIVE,
            b"[volume]\r\nlabel=FAT16_VOL\r\ncluster_size=2048\r\n",
        ),
        ImageFile::new("DATA", "BIN", Attributes::ARCHIVE, &[0xA5; 1500]),
        ImageFile::directory("DOCS"),
        ImageFile::new(
            "SYSTEM",
            "SYS",
            Attributes::SYSTEM | Attributes::HIDDEN | Attributes::READ_ONLY,
            b"system file",
        ),
    ]
}

fn build_demo(path: &str) -> Result<(), Box<dyn Error>> {
    let options = ImageOptions::analyzer(VolumeSerialNumber::try_now()?, DateTime::try_now()?);

    let mut file = OpenOptions::new()
        .write(true)
        .read(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let placements = options.write(&mut file, &demo_files())?;
    println!("created {path} with {} root entries", placements.len());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let path = match args.next() {
        Some(path) => path,
        None => {
            build_demo(DEFAULT_IMAGE)?;
            DEFAULT_IMAGE.to_string()
        }
    };

    let file = OpenOptions::new().read(true).open(&path)?;
    let volume = Volume::open(file)?;

    println!("\nPartition table:");
    for (i, entry) in volume.partition_table().entries().iter().enumerate() {
        println!("  #{}: {entry}", i + 1);
    }

    println!("\nBoot sector:\n{}", volume.bpb());

    let geometry = volume.geometry();
    println!("\nRoot directory:");
    for entry in volume.entries()? {
        let usage = geometry.cluster_usage(entry.len() as u64)?;
        println!(
            "  {entry}  [{} cluster(s), {} bytes slack, {:.1}%]",
            usage.clusters, usage.slack_bytes, usage.efficiency_percent
        );
    }

    let mut sector = [0u8; SECTOR_SIZE];
    volume.device().read_exact_at(0, &mut sector)?;
    println!("\nMBR:\n{}", hexdump(&sector, 0, MBR_LABELS));

    let boot = volume.partition_range(0)?.start;
    volume.device().read_exact_at(boot, &mut sector)?;
    println!("Boot sector:\n{}", hexdump(&sector, boot, BOOT_SECTOR_LABELS));

    if let Some(target) = args.next() {
        let (name, extension) = target.split_once('.').unwrap_or((target.as_str(), ""));
        let entry = volume.find(name, extension)?;
        let content = volume.read(&entry)?;
        let offset = geometry
            .cluster_offset(entry.first_cluster as u32)
            .unwrap_or(0);
        println!("{entry}\n{}", hexdump(&content, offset, &[]));
    }

    Ok(())
}
