//! Region offsets of a FAT16 volume, derived solely from the BPB and the partition start.
use crate::{
    boot_sector::BiosParameterBlock,
    dir::DIR_ENTRY_SIZE,
    error::{Fat16Error, Result},
};

/// First cluster number that maps to the data region. Clusters 0 and 1 are reserved.
pub const FIRST_DATA_CLUSTER: u32 = 2;

/// Sector addresses (LBAs, in units of `bytes_per_sector`) of the volume regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub partition_start: u64,
    pub fat_region_start: u64,
    pub sectors_per_fat: u16,
    pub fat_count: u8,
    pub root_dir_start: u64,
    pub root_dir_sector_count: u64,
    pub data_region_start: u64,
    /// First sector past the volume, from the BPB's effective sector count.
    pub volume_end: u64,
}

/// How well a file of a given size fills its clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterUsage {
    pub clusters: u64,
    pub slack_bytes: u64,
    pub efficiency_percent: f64,
}

impl Geometry {
    pub fn new(bpb: &BiosParameterBlock, partition_lba_start: u32) -> Result<Geometry> {
        if bpb.bytes_per_sector == 0 {
            return Err(Fat16Error::InvalidBytesPerSector(bpb.bytes_per_sector));
        }
        let bytes_per_sector = bpb.bytes_per_sector as u64;
        let partition_start = partition_lba_start as u64;

        let root_dir_sector_count =
            (bpb.root_entry_count as u64 * DIR_ENTRY_SIZE as u64).div_ceil(bytes_per_sector);
        let fat_region_start = partition_start + bpb.reserved_sectors as u64;
        let root_dir_start = fat_region_start + bpb.fat_count as u64 * bpb.sectors_per_fat as u64;
        let data_region_start = root_dir_start + root_dir_sector_count;

        Ok(Self {
            bytes_per_sector: bpb.bytes_per_sector,
            sectors_per_cluster: bpb.sectors_per_cluster,
            partition_start,
            fat_region_start,
            sectors_per_fat: bpb.sectors_per_fat,
            fat_count: bpb.fat_count,
            root_dir_start,
            root_dir_sector_count,
            data_region_start,
            volume_end: partition_start + bpb.total_sectors() as u64,
        })
    }

    /// First sector of `cluster`. Only defined for clusters `>= 2`.
    pub fn cluster_to_lba(&self, cluster: u32) -> Result<u64> {
        if cluster < FIRST_DATA_CLUSTER {
            return Err(Fat16Error::InvalidCluster(cluster));
        }
        Ok(self.data_region_start
            + (cluster - FIRST_DATA_CLUSTER) as u64 * self.sectors_per_cluster as u64)
    }

    /// Byte offset of `lba` within the disk image.
    pub fn byte_offset(&self, lba: u64) -> u64 {
        lba * self.bytes_per_sector as u64
    }

    /// Byte offset of the first byte of `cluster`.
    pub fn cluster_offset(&self, cluster: u32) -> Result<u64> {
        self.cluster_to_lba(cluster).map(|lba| self.byte_offset(lba))
    }

    /// Start sector of FAT copy `index`.
    pub fn fat_start(&self, index: u8) -> u64 {
        self.fat_region_start + index as u64 * self.sectors_per_fat as u64
    }

    pub fn cluster_size(&self) -> u64 {
        self.sectors_per_cluster as u64 * self.bytes_per_sector as u64
    }

    pub fn root_dir_bytes(&self) -> u64 {
        self.byte_offset(self.root_dir_sector_count)
    }

    /// Sectors needed to hold `len` bytes.
    pub fn sectors_for(&self, len: u64) -> u64 {
        len.div_ceil(self.bytes_per_sector as u64)
    }

    /// Number of whole clusters between the data region start and the end of the volume, which
    /// never extends past `partition_end`. A BPB with both total sector fields at zero leaves the
    /// partition as the only bound.
    pub fn data_cluster_count(&self, partition_end: u64) -> u64 {
        if self.sectors_per_cluster == 0 {
            return 0;
        }
        let end = if self.volume_end > self.partition_start {
            self.volume_end.min(partition_end)
        } else {
            partition_end
        };
        end.saturating_sub(self.data_region_start) / self.sectors_per_cluster as u64
    }

    /// Clusters allocated for a file of `file_size` bytes and the share of them actually used.
    pub fn cluster_usage(&self, file_size: u64) -> Result<ClusterUsage> {
        let cluster_size = self.cluster_size();
        if cluster_size == 0 {
            return Err(Fat16Error::InvalidClusterSize(self.sectors_per_cluster));
        }
        let clusters = file_size.div_ceil(cluster_size);
        let allocated = clusters * cluster_size;
        let efficiency_percent = if allocated == 0 {
            0.0
        } else {
            file_size as f64 * 100.0 / allocated as f64
        };

        Ok(ClusterUsage {
            clusters,
            slack_bytes: allocated - file_size,
            efficiency_percent,
        })
    }
}

#[cfg(test)]
fn analyzer_geometry() -> Geometry {
    let bpb = crate::boot_sector::BiosParameterBlockBuilder::default()
        .bytes_per_sector(512)
        .sectors_per_cluster(4)
        .reserved_sectors(1)
        .fat_count(2)
        .root_entry_count(512)
        .sectors_per_fat(200)
        .total_sectors32(102400)
        .build()
        .unwrap();
    Geometry::new(&bpb, 2048).unwrap()
}

#[test]
fn analyzer_regions() {
    let geometry = analyzer_geometry();
    assert_eq!(geometry.fat_region_start, 2049);
    assert_eq!(geometry.root_dir_start, 2449);
    assert_eq!(geometry.root_dir_sector_count, 32);
    assert_eq!(geometry.data_region_start, 2481);
    assert_eq!(geometry.fat_start(1), 2249);
    assert_eq!(geometry.volume_end, 2048 + 102400);
}

#[test]
fn cluster_mapping() {
    let geometry = analyzer_geometry();
    assert_eq!(geometry.cluster_to_lba(2).unwrap(), 2481);
    assert_eq!(geometry.cluster_to_lba(3).unwrap(), 2485);
    assert_eq!(geometry.cluster_offset(2).unwrap(), 2481 * 512);
    assert_eq!(
        geometry.cluster_to_lba(7).unwrap(),
        geometry.cluster_to_lba(7).unwrap()
    );

    assert!(matches!(
        geometry.cluster_to_lba(0),
        Err(Fat16Error::InvalidCluster(0))
    ));
    assert!(matches!(
        geometry.cluster_to_lba(1),
        Err(Fat16Error::InvalidCluster(1))
    ));
}

#[test]
fn partial_root_sector_rounds_up() {
    let bpb = crate::boot_sector::BiosParameterBlockBuilder::default()
        .bytes_per_sector(512)
        .root_entry_count(17)
        .build()
        .unwrap();
    let geometry = Geometry::new(&bpb, 0).unwrap();
    assert_eq!(geometry.root_dir_sector_count, 2);
}

#[test]
fn zero_sector_size() {
    let bpb = BiosParameterBlock::default();
    assert!(matches!(
        Geometry::new(&bpb, 0),
        Err(Fat16Error::InvalidBytesPerSector(0))
    ));
}

#[test]
fn usage() {
    let geometry = analyzer_geometry();
    let usage = geometry.cluster_usage(1024).unwrap();
    assert_eq!(usage.clusters, 1);
    assert_eq!(usage.slack_bytes, 1024);
    assert_eq!(usage.efficiency_percent, 50.0);

    assert_eq!(geometry.cluster_usage(2049).unwrap().clusters, 2);
    assert_eq!(geometry.cluster_usage(0).unwrap().clusters, 0);
}

#[test]
fn data_clusters_bounded_by_partition() {
    let geometry = analyzer_geometry();
    // (102400 - 433) / 4
    assert_eq!(geometry.data_cluster_count(2048 + 102400), 25491);
    assert_eq!(geometry.data_cluster_count(2481 + 40), 10);

    // no total sector count in the BPB
    let bpb = crate::boot_sector::BiosParameterBlockBuilder::default()
        .bytes_per_sector(512)
        .sectors_per_cluster(4)
        .reserved_sectors(1)
        .fat_count(2)
        .root_entry_count(512)
        .sectors_per_fat(200)
        .build()
        .unwrap();
    let geometry = Geometry::new(&bpb, 2048).unwrap();
    assert_eq!(geometry.volume_end, 2048);
    assert_eq!(geometry.data_cluster_count(2048 + 8192), (2048 + 8192 - 2481) / 4);
}
