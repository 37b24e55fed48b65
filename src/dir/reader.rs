use core::slice::ChunksExact;

use log::trace;

use super::entry::{DIR_ENTRY_SIZE, DirSlot, DirectoryEntry};

/// Directory Entry Reader
///
/// Walks a directory region record by record, skipping deleted entries and stopping for good at
/// the end-of-directory marker or when the region is exhausted. Cloning the reader restarts the
/// walk from the clone's position.
#[derive(Debug, Clone)]
pub struct DirEntryReader<'a> {
    records: ChunksExact<'a, u8>,
    index: usize,
    finished: bool,
}

impl<'a> From<&'a [u8]> for DirEntryReader<'a> {
    fn from(region: &'a [u8]) -> Self {
        DirEntryReader {
            records: region.chunks_exact(DIR_ENTRY_SIZE),
            index: 0,
            finished: false,
        }
    }
}

impl DirEntryReader<'_> {
    /// Index of the next record to be read.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Iterator for DirEntryReader<'_> {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<DirectoryEntry> {
        while !self.finished {
            let Some(record) = self.records.next() else {
                self.finished = true;
                break;
            };
            let index = self.index;
            self.index += 1;

            match DirSlot::from_record(record) {
                DirSlot::EndOfDirectory => {
                    trace!("record #{index}: end of directory");
                    self.finished = true;
                }
                DirSlot::Deleted => trace!("record #{index}: deleted"),
                DirSlot::Entry(entry) => {
                    trace!("record #{index}: {}", entry.full_name());
                    return Some(entry);
                }
            }
        }
        None
    }
}

impl core::iter::FusedIterator for DirEntryReader<'_> {}
