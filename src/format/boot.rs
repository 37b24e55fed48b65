use std::io::{Seek, Write};

use log::debug;

use crate::{disk, error::Result};

use super::Formatter;

impl Formatter<'_> {
    /// Writes the MBR at offset 0 and the boot sector at the start of the first partition.
    pub(super) fn write_boot_region<T: Write + Seek>(&self, device: &mut T) -> Result<()> {
        let mbr = self.options.partitions.encode(&self.options.bootstrap);
        disk::write_at(device, 0, &mbr)?;

        let offset = self.partition.byte_offset();
        debug!("boot sector at {offset:#x}");
        disk::write_at(device, offset, &self.options.bpb.encode())?;
        Ok(())
    }
}
