use std::io::{Seek, Write};

use log::debug;

use crate::{dir::DIR_ENTRY_SIZE, disk, error::Result};

use super::Formatter;

impl Formatter<'_> {
    /// Packs the encoded records contiguously from the start of the root directory. The rest of
    /// the region stays zeroed, which reads as end-of-directory.
    pub(super) fn write_root<T: Write + Seek>(&self, device: &mut T) -> Result<()> {
        let mut offset = self.geometry.byte_offset(self.geometry.root_dir_start);
        debug!("{} root entries at {offset:#x}", self.records.len());

        for record in &self.records {
            disk::write_at(device, offset, record)?;
            offset += DIR_ENTRY_SIZE as u64;
        }
        Ok(())
    }

    /// Copies each file's content to the start of its cluster.
    pub(super) fn write_data<T: Write + Seek>(&self, device: &mut T) -> Result<()> {
        for (placement, content) in self.placements.iter().zip(&self.contents) {
            let Some(offset) = placement.offset else {
                continue;
            };
            if content.is_empty() {
                continue;
            }
            disk::write_at(device, offset, content)?;
        }
        Ok(())
    }
}
