//! Minimal buffer-based encode/decode trait for fixed on-disk record structures.
//!
//! Modeled on the corpus's `denc::Denc` trait (direct encode into a `BufMut`,
//! direct decode from a `Buf`, no intermediate allocation), trimmed of the
//! ceph-specific `features: u64` wire-negotiation parameter: every type this
//! crate encodes has one bit-exact on-disk layout, not a feature-dependent one.

use crate::error::{CodecError, Result};
use bytes::{Buf, BufMut};

pub trait Denc: Sized {
    /// Encode directly into `buf`.
    fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()>;

    /// Decode from `buf`.
    fn decode<B: Buf>(buf: &mut B) -> Result<Self>;

    /// Encoded size in bytes. Every type in this crate has a fixed size.
    const SIZE: usize;
}

fn need(buf: &impl Buf, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(CodecError::ShortRead {
            need: n,
            have: buf.remaining(),
        });
    }
    Ok(())
}

impl Denc for u32 {
    fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u32_le(*self);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        need(buf, 4)?;
        Ok(buf.get_u32_le())
    }

    const SIZE: usize = 4;
}

impl Denc for u64 {
    fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        buf.put_u64_le(*self);
        Ok(())
    }

    fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        need(buf, 8)?;
        Ok(buf.get_u64_le())
    }

    const SIZE: usize = 8;
}
