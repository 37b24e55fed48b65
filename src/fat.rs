use alloc::vec::Vec;

use bytemuck::{Pod, Zeroable, cast_slice, pod_read_unaligned};

use crate::{
    error::{Fat16Error, Result, Structure},
    geometry::FIRST_DATA_CLUSTER,
};

/// A 16-bit FAT entry, held in its on-disk (little-endian) byte order.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FatEntry(u16);

impl FatEntry {
    pub const FREE: FatEntry = FatEntry(0);

    pub fn new(value: u16) -> FatEntry {
        Self(value.to_le())
    }

    /// Entry 0: the media descriptor in the low byte, `FFh` in the high byte.
    pub fn media_type(media_descriptor: u8) -> FatEntry {
        Self::new(0xFF00 | media_descriptor as u16)
    }

    /// Marks the end of a cluster chain.
    pub fn eof() -> FatEntry {
        Self::new(0xFFFF)
    }

    pub fn value(&self) -> u16 {
        u16::from_le(self.0)
    }

    pub fn is_free(&self) -> bool {
        self.value() == 0
    }

    pub fn is_eof(&self) -> bool {
        self.value() >= 0xFFF8
    }

    /// The following cluster of the chain, if this entry links to one.
    pub fn next_cluster(&self) -> Option<u16> {
        match self.value() {
            v @ 0x0002..=0xFFEF => Some(v),
            _ => None,
        }
    }
}

/// One copy of the File Allocation Table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fat {
    entries: Vec<FatEntry>,
}

impl Fat {
    /// A table of `sectors_per_fat * bytes_per_sector` bytes with the two reserved entries set
    /// and every cluster free.
    pub fn new(bytes_len: usize, media_descriptor: u8) -> Fat {
        let mut entries = vec![FatEntry::FREE; bytes_len / size_of::<FatEntry>()];
        if let Some(first) = entries.get_mut(0) {
            *first = FatEntry::media_type(media_descriptor);
        }
        if let Some(second) = entries.get_mut(1) {
            *second = FatEntry::eof();
        }
        Self { entries }
    }

    pub fn decode(bytes: &[u8]) -> Result<Fat> {
        if bytes.len() < 2 * size_of::<FatEntry>() {
            return Err(Fat16Error::length(Structure::Fat, 4, bytes.len()));
        }
        let entries = bytes
            .chunks_exact(size_of::<FatEntry>())
            .map(pod_read_unaligned::<FatEntry>)
            .collect();
        Ok(Self { entries })
    }

    pub fn bytes(&self) -> &[u8] {
        cast_slice(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that can describe data clusters.
    pub fn cluster_capacity(&self) -> u32 {
        self.entries.len().saturating_sub(FIRST_DATA_CLUSTER as usize) as u32
    }

    pub fn entry(&self, cluster: u32) -> Option<FatEntry> {
        self.entries.get(cluster as usize).copied()
    }

    pub fn media_descriptor(&self) -> Option<u8> {
        self.entry(0).map(|e| e.value() as u8)
    }

    pub fn set(&mut self, cluster: u32, entry: FatEntry) -> Result<()> {
        if cluster < FIRST_DATA_CLUSTER {
            return Err(Fat16Error::InvalidCluster(cluster));
        }
        let slot = self
            .entries
            .get_mut(cluster as usize)
            .ok_or(Fat16Error::InvalidCluster(cluster))?;
        *slot = entry;
        Ok(())
    }

    /// Data clusters whose entry is not free.
    pub fn allocated(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .enumerate()
            .skip(FIRST_DATA_CLUSTER as usize)
            .filter(|(_, e)| !e.is_free())
            .map(|(i, _)| i as u32)
    }
}

#[test]
fn reserved_entries() {
    let fat = Fat::new(200 * 512, 0xF8);
    assert_eq!(fat.len(), 51200);
    assert_eq!(fat.bytes()[..4], [0xF8, 0xFF, 0xFF, 0xFF]);
    assert!(fat.bytes()[4..].iter().all(|&b| b == 0));
    assert_eq!(fat.media_descriptor(), Some(0xF8));
    assert_eq!(fat.allocated().count(), 0);
}

#[test]
fn single_cluster_chains() {
    let mut fat = Fat::new(512, 0xF8);
    fat.set(2, FatEntry::eof()).unwrap();
    fat.set(4, FatEntry::eof()).unwrap();

    let decoded = Fat::decode(fat.bytes()).unwrap();
    assert_eq!(decoded, fat);
    assert!(decoded.entry(2).unwrap().is_eof());
    assert!(decoded.entry(3).unwrap().is_free());
    assert_eq!(decoded.entry(2).unwrap().next_cluster(), None);
    assert_eq!(decoded.allocated().collect::<Vec<_>>(), [2, 4]);
}

#[test]
fn out_of_range_clusters() {
    let mut fat = Fat::new(512, 0xF8);
    assert_eq!(fat.cluster_capacity(), 254);
    assert!(matches!(
        fat.set(1, FatEntry::eof()),
        Err(Fat16Error::InvalidCluster(1))
    ));
    assert!(matches!(
        fat.set(256, FatEntry::eof()),
        Err(Fat16Error::InvalidCluster(256))
    ));
}

#[test]
fn chain_links() {
    assert_eq!(FatEntry::new(0x0003).next_cluster(), Some(3));
    assert_eq!(FatEntry::new(0xFFF7).next_cluster(), None);
    assert!(FatEntry::new(0xFFF8).is_eof());
}
