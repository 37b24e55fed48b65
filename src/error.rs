use alloc::string::String;

/// On-disk structures that carry a fixed size or a `0x55AA` trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    MasterBootRecord,
    BootSector,
    DirectoryEntry,
    PartitionEntry,
    Fat,
}

impl core::fmt::Display for Structure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Structure::MasterBootRecord => "master boot record",
            Structure::BootSector => "boot sector",
            Structure::DirectoryEntry => "directory entry",
            Structure::PartitionEntry => "partition entry",
            Structure::Fat => "file allocation table",
        };
        f.write_str(name)
    }
}

pub type Result<T> = core::result::Result<T, Fat16Error>;

#[derive(Debug, thiserror::Error)]
pub enum Fat16Error {
    #[error("Missing 0x55AA signature on {structure}. Found: {found:#06x}.")]
    BadSignature { structure: Structure, found: u16 },
    #[error("Cluster #{0} does not map to the data region.")]
    InvalidCluster(u32),
    #[error("Invalid 8.3 name `{name}`: {reason}.")]
    InvalidName { name: String, reason: &'static str },
    #[error("File `{name}` not found in root directory.")]
    NotFound { name: String },
    #[error("Read of {length} bytes at {offset:#x} exceeds image of {image_len} bytes.")]
    TruncatedImage {
        offset: u64,
        length: u64,
        image_len: u64,
    },
    #[error("Buffer too short for {structure}: expected {expected} bytes, got {actual}.")]
    InvalidLength {
        structure: Structure,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid CHS address (cylinder {cylinder}, head {head}, sector {sector}).")]
    InvalidChs { cylinder: u16, head: u8, sector: u8 },
    #[error("Invalid bytes per sector: {0}.")]
    InvalidBytesPerSector(u16),
    #[error("Invalid sectors per cluster: {0}.")]
    InvalidClusterSize(u8),
    #[error("Partition #{0} is unused.")]
    UnusedPartition(usize),
    #[error("Volume has room for {available} files, {requested} were requested.")]
    VolumeFull { requested: u32, available: u32 },
    #[error("I/O error: {0}.")]
    Io(#[from] std::io::Error),
}

impl Fat16Error {
    pub(crate) fn length(structure: Structure, expected: usize, actual: usize) -> Self {
        Fat16Error::InvalidLength {
            structure,
            expected,
            actual,
        }
    }
}
