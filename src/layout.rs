//! Little-endian field access at fixed offsets.
//!
//! Every on-disk structure in this crate is described by a table of byte offsets. These helpers
//! are the only place where multi-byte integers are packed or unpacked, so the offset tables stay
//! the single source of truth for the layout. Callers guarantee that `offset + width` lies within
//! the buffer; all structures check their buffer length once before touching any field.

use crate::error::{Fat16Error, Result, Structure};

/// A byte range inside a fixed-size structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Field {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

impl Field {
    pub(crate) const fn new(offset: usize, len: usize) -> Field {
        Field { offset, len }
    }

    pub(crate) const fn end(&self) -> usize {
        self.offset + self.len
    }

    pub(crate) fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.offset..self.end()]
    }
}

pub(crate) fn read_u8(buf: &[u8], offset: usize) -> u8 {
    buf[offset]
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Copies a fixed-width byte field out of `buf`.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}

pub(crate) fn write_u8(buf: &mut [u8], offset: usize, value: u8) {
    buf[offset] = value;
}

pub(crate) fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_bytes(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Trailer shared by the MBR and the boot sector, stored as `55 AA` at offset 510.
pub(crate) const SIGNATURE: Field = Field::new(510, 2);
pub(crate) const SIGNATURE_VALUE: u16 = 0xAA55;

pub(crate) fn write_signature(sector: &mut [u8]) {
    write_u16(sector, SIGNATURE.offset, SIGNATURE_VALUE);
}

pub(crate) fn check_signature(sector: &[u8], structure: Structure) -> Result<()> {
    let found = read_u16(sector, SIGNATURE.offset);
    if found != SIGNATURE_VALUE {
        return Err(Fat16Error::BadSignature { structure, found });
    }
    Ok(())
}

/// Returns the leading `len` bytes of `buf`, or [`Fat16Error::InvalidLength`] if it is shorter.
pub(crate) fn require(buf: &[u8], len: usize, structure: Structure) -> Result<&[u8]> {
    buf.get(..len)
        .ok_or(Fat16Error::length(structure, len, buf.len()))
}

#[test]
fn little_endian_round_trip() {
    let mut buf = [0u8; 8];
    write_u16(&mut buf, 1, 0x0200);
    write_u32(&mut buf, 3, 102400);

    assert_eq!(buf[1..3], [0x00, 0x02]);
    assert_eq!(buf[3..7], [0x00, 0x90, 0x01, 0x00]);
    assert_eq!(read_u16(&buf, 1), 512);
    assert_eq!(read_u32(&buf, 3), 102400);
}

#[test]
fn short_buffer_is_rejected() {
    let buf = [0u8; 31];
    let err = require(&buf, 32, Structure::DirectoryEntry).unwrap_err();
    assert!(matches!(
        err,
        Fat16Error::InvalidLength {
            expected: 32,
            actual: 31,
            ..
        }
    ));
}
