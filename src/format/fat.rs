use std::io::{Seek, Write};

use log::debug;

use crate::{disk, error::Result};

use super::Formatter;

impl Formatter<'_> {
    /// Writes every FAT copy. All copies are identical.
    pub(super) fn write_fats<T: Write + Seek>(&self, device: &mut T) -> Result<()> {
        let bytes = self.fat.bytes();
        for index in 0..self.geometry.fat_count {
            let offset = self.geometry.byte_offset(self.geometry.fat_start(index));
            debug!("FAT #{index} at {offset:#x}");
            disk::write_at(device, offset, bytes)?;
        }
        Ok(())
    }
}
