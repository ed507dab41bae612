//! The extension header (EHDR): a fixed-size prefix stored at offset 0 of a
//! record's payload region when the record's engine flags carry `HAS_EXTHDR`.
//!
//! Layout MUST stay bit-exact for on-disk compatibility with existing
//! deployments (spec §3 Invariant 1, §4.1): 8-byte little-endian timestamp,
//! 4-byte little-endian user flags, 4 reserved bytes preserved verbatim on
//! read (forward-compat for fields this version doesn't know about yet).

use crate::denc::Denc;
use crate::error::{CodecError, Result};
use crate::io_attr::IoAttr;
use bytes::{Buf, BufMut, BytesMut};
use std::fs::File;
use std::os::unix::fs::FileExt;

pub const EHDR_LEN: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtHeader {
    pub timestamp: u64,
    pub user_flags: u32,
    /// Unknown/reserved bits from a future schema version. Round-tripped
    /// verbatim rather than zeroed, per spec §4.1.
    pub reserved: u32,
}

impl Denc for ExtHeader {
    fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.timestamp.encode(buf)?;
        self.user_flags.encode(buf)?;
        self.reserved.encode(buf)?;
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let timestamp = u64::decode(buf)?;
        let user_flags = u32::decode(buf)?;
        let reserved = u32::decode(buf)?;
        Ok(ExtHeader {
            timestamp,
            user_flags,
            reserved,
        })
    }

    const SIZE: usize = EHDR_LEN;
}

/// Projects the user-visible fields of an `IoAttr` into an on-disk `ExtHeader`.
pub fn encode_ext(io: &IoAttr) -> ExtHeader {
    ExtHeader {
        timestamp: io.timestamp,
        user_flags: io.flags.bits(),
        reserved: 0,
    }
}

/// Reads exactly `EHDR_LEN` bytes at `offset` in `file` and decodes them.
pub fn decode_ext(file: &File, offset: u64) -> Result<ExtHeader> {
    let mut raw = [0u8; EHDR_LEN];
    file.read_exact_at(&mut raw, offset).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CodecError::ShortRead {
                need: EHDR_LEN,
                have: 0,
            }
        } else {
            CodecError::Io(e)
        }
    })?;
    let mut buf = BytesMut::from(&raw[..]);
    let hdr = ExtHeader::decode(&mut buf)?;
    if hdr.timestamp > (i64::MAX as u64) {
        tracing::warn!(timestamp = hdr.timestamp, offset, "extension header timestamp out of range");
        return Err(CodecError::Corrupt(format!(
            "implausible timestamp {}",
            hdr.timestamp
        )));
    }
    Ok(hdr)
}

/// Installs the stored timestamp and flags into the I/O envelope so reply
/// builders see the record's on-disk metadata rather than whatever the
/// caller supplied.
pub fn apply_ext_to_io(hdr: &ExtHeader, io: &mut IoAttr) {
    io.timestamp = hdr.timestamp;
    let preserved_high_bits = io.flags.bits() & !0xFFFu32;
    io.flags = crate::io_attr::CommandFlags::from_bits_truncate(hdr.user_flags)
        | crate::io_attr::CommandFlags::from_bits_truncate(preserved_high_bits);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_attr::CommandFlags;
    use tempfile::NamedTempFile;

    #[test]
    fn encode_decode_roundtrip_via_file() {
        let mut io = IoAttr::new(crate::key::Key::ZERO);
        io.timestamp = 1_700_000_000;
        io.flags = CommandFlags::HAS_EXTHDR | CommandFlags::APPEND;
        let hdr = encode_ext(&io);

        let mut buf = BytesMut::new();
        hdr.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), EHDR_LEN);

        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &buf).unwrap();
        let file = File::open(tmp.path()).unwrap();
        let decoded = decode_ext(&file, 0).unwrap();
        assert_eq!(decoded.timestamp, io.timestamp);
        assert_eq!(decoded.user_flags, io.flags.bits());
    }

    #[test]
    fn short_read_is_an_error() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), [0u8; 4]).unwrap();
        let file = File::open(tmp.path()).unwrap();
        assert!(decode_ext(&file, 0).is_err());
    }

    #[test]
    fn reserved_bits_round_trip_verbatim() {
        let hdr = ExtHeader {
            timestamp: 1,
            user_flags: 0,
            reserved: 0xDEAD_BEEF,
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf).unwrap();
        let decoded = ExtHeader::decode(&mut buf).unwrap();
        assert_eq!(decoded.reserved, 0xDEAD_BEEF);
    }
}
