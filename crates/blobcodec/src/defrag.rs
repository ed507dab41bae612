//! Defrag control struct and status, and its endian converter
//! (`convert_defrag_ctl`, spec §6).

use crate::error::{CodecError, Result};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DefragFlags: u32 {
        /// Start a pass now regardless of the scheduled splay.
        const FORCE = 1 << 0;
    }
}

/// Payload of a DEFRAG/start command. Overrides the configured schedule for
/// this one invocation; zero fields mean "use the configured default".
#[derive(Debug, Clone, Copy, Default)]
pub struct DefragCtl {
    pub flags: DefragFlags,
    pub timeout_secs: u32,
    pub percentage: u8,
}

impl Default for DefragFlags {
    fn default() -> Self {
        DefragFlags::empty()
    }
}

impl DefragCtl {
    /// Spec §6: `-EINVAL` for a malformed defrag payload. `percentage` is a
    /// 0-100 threshold; anything else is malformed.
    pub fn validate(&self) -> Result<()> {
        if self.percentage > 100 {
            return Err(CodecError::Corrupt(format!(
                "defrag percentage {} out of range 0..=100",
                self.percentage
            )));
        }
        Ok(())
    }
}

/// Current state of the background defragmenter, returned by DEFRAG/status
/// and after DEFRAG/start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefragState {
    Idle,
    InProgress { percent_complete: u8 },
    Complete,
}

/// Byte-swaps the multibyte fields of a `DefragCtl` at the wire boundary,
/// mirroring `convert_io_attr`.
pub fn convert_defrag_ctl(ctl: &mut DefragCtl) {
    if cfg!(target_endian = "little") {
        return;
    }
    ctl.flags = DefragFlags::from_bits_truncate(ctl.flags.bits().swap_bytes());
    ctl.timeout_secs = ctl.timeout_secs.swap_bytes();
}
