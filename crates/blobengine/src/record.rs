//! The engine's own fixed-size per-record control struct, written
//! immediately before the (optional) extension header and payload.
//!
//! ```text
//! [ engine disk-control struct | (extension header, if HAS_EXTHDR) | user payload ]
//! ```

use crate::error::{EngineError, Result};
use crate::flags::EngineFlags;
use blobcodec::denc::Denc as _;
use blobcodec::{Key, ID_LEN};
use bytes::{Buf, BufMut, BytesMut};

const MAGIC: u32 = 0x424C_4F42; // "BLOB"

/// `CTL_LEN`: encoded size of [`DiskControl`].
pub const CTL_LEN: usize = 4 + 4 + ID_LEN + 8 + 8 + 4;

/// Fixed-size header preceding every record's data area.
#[derive(Debug, Clone, Copy)]
pub struct DiskControl {
    pub flags: EngineFlags,
    pub key: Key,
    /// Total size of the data area that follows (extension header included
    /// when `HAS_EXTHDR` is set).
    pub size: u64,
    pub timestamp: u64,
    pub crc32: u32,
}

impl DiskControl {
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(CTL_LEN);
        buf.put_u32_le(MAGIC);
        buf.put_u32_le(self.flags.bits());
        buf.put_slice(self.key.as_bytes());
        self.size.encode(&mut buf).expect("fixed-size encode");
        self.timestamp.encode(&mut buf).expect("fixed-size encode");
        buf.put_u32_le(self.crc32);
        buf
    }

    pub fn decode(mut raw: &[u8]) -> Result<Self> {
        if raw.len() < CTL_LEN {
            return Err(EngineError::Corrupt(format!(
                "control struct short read: need {}, have {}",
                CTL_LEN,
                raw.len()
            )));
        }
        let magic = raw.get_u32_le();
        if magic != MAGIC {
            return Err(EngineError::Corrupt(format!("bad magic 0x{:08x}", magic)));
        }
        let flags = EngineFlags::from_bits_truncate(raw.get_u32_le());
        let mut key_bytes = [0u8; ID_LEN];
        raw.copy_to_slice(&mut key_bytes);
        let key = Key(key_bytes);
        let size = u64::decode(&mut raw)?;
        let timestamp = u64::decode(&mut raw)?;
        let crc32 = raw.get_u32_le();
        Ok(DiskControl {
            flags,
            key,
            size,
            timestamp,
            crc32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let ctl = DiskControl {
            flags: EngineFlags::HAS_EXTHDR,
            key: Key::ZERO,
            size: 128,
            timestamp: 1_700_000_000,
            crc32: 0xdead_beef,
        };
        let encoded = ctl.encode();
        assert_eq!(encoded.len(), CTL_LEN);
        let decoded = DiskControl::decode(&encoded).unwrap();
        assert_eq!(decoded.size, ctl.size);
        assert_eq!(decoded.flags, ctl.flags);
        assert_eq!(decoded.crc32, ctl.crc32);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut encoded = DiskControl {
            flags: EngineFlags::empty(),
            key: Key::ZERO,
            size: 0,
            timestamp: 0,
            crc32: 0,
        }
        .encode();
        encoded[0] = 0xff;
        assert!(DiskControl::decode(&encoded).is_err());
    }
}
