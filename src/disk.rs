use std::io::{self, ErrorKind, Seek, Write};

/// Writes zeroes to a file from the given absolute offset (in bytes), up to the given size.
pub fn write_zeroes<T>(f: &mut T, size: u64, offset: u64) -> io::Result<()>
where
    T: Write + Seek,
{
    let buffer = [0u8; 4 * crate::KB as usize];

    // seek to offset
    f.seek(io::SeekFrom::Start(offset))?;

    let mut remaining = size;
    while remaining > 0 {
        let iter_size = remaining.min(buffer.len() as u64);
        // `iter_size` is max 4KB so this cast is fine
        if f.write(&buffer[..iter_size as usize])? != iter_size as usize {
            return Err(io::Error::new(ErrorKind::WriteZero, "Failed to write 0s"));
        }
        remaining -= iter_size;
    }
    Ok(())
}

/// Writes `bytes` at the given absolute offset (in bytes).
pub fn write_at<T>(f: &mut T, offset: u64, bytes: &[u8]) -> io::Result<()>
where
    T: Write + Seek,
{
    f.seek(io::SeekFrom::Start(offset))?;
    f.write_all(bytes)
}

/// Positional reads from a disk image.
pub trait ReadOffset {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize>;

    /// Length of the image in bytes.
    fn size(&self) -> io::Result<u64>;

    fn read_exact_at(&self, mut offset: u64, mut buffer: &mut [u8]) -> io::Result<()> {
        while !buffer.is_empty() {
            match self.read_at(offset, buffer) {
                Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof)),
                Ok(n) => {
                    buffer = &mut buffer[n..];
                    offset = offset
                        .checked_add(n as u64)
                        .ok_or(io::Error::from(ErrorKind::UnexpectedEof))?;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ReadOffset for [u8] {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
        let Some(available) = usize::try_from(offset).ok().and_then(|o| self.get(o..)) else {
            return Ok(0);
        };
        let n = available.len().min(buffer.len());
        buffer[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadOffset for Vec<u8> {
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<usize> {
        self.as_slice().read_at(offset, buffer)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl<T: ReadOffset + ?Sized> ReadOffset for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (*self).read_at(offset, buf)
    }

    fn size(&self) -> io::Result<u64> {
        (*self).size()
    }
}

impl ReadOffset for std::fs::File {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

#[test]
fn slice_reads() {
    let image: &[u8] = &[1, 2, 3, 4, 5];
    let mut buf = [0u8; 3];

    image.read_exact_at(2, &mut buf).unwrap();
    assert_eq!(buf, [3, 4, 5]);

    let err = image.read_exact_at(3, &mut buf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    assert_eq!(image.read_at(10, &mut buf).unwrap(), 0);
}

#[test]
fn zero_fill() {
    let mut f = io::Cursor::new(vec![0xAAu8; 10 * crate::KB as usize]);
    write_zeroes(&mut f, 5000, 100).unwrap();

    let data = f.into_inner();
    assert!(data[..100].iter().all(|&b| b == 0xAA));
    assert!(data[100..5100].iter().all(|&b| b == 0));
    assert!(data[5100..].iter().all(|&b| b == 0xAA));
}
