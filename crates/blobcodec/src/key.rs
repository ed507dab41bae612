//! Fixed-width opaque record identifier.
//!
//! Simplified from the corpus's `denc::hobject::HObject`: that type orders by
//! `(max, pool, key-or-hash, nspace, oid, snap)` because a RADOS object carries
//! pool/namespace/snapshot structure. A blob-store key carries none of that —
//! it is `ID_LEN` opaque bytes, ordered bytewise, full stop.

pub const ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub [u8; ID_LEN]);

impl Key {
    pub const ZERO: Key = Key([0u8; ID_LEN]);

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ID_LEN {
            return None;
        }
        let mut buf = [0u8; ID_LEN];
        buf.copy_from_slice(bytes);
        Some(Key(buf))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0.iter().take(8) {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytewise_ordering() {
        let mut k0 = Key::ZERO;
        let mut k1 = Key::ZERO;
        k1.0[0] = 0x01;
        assert!(k0 < k1);
        k0.0[63] = 0xff;
        assert!(k0 < k1, "first byte dominates ordering");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Key::from_bytes(&[0u8; 32]).is_none());
        assert!(Key::from_bytes(&[0u8; ID_LEN]).is_some());
    }
}
