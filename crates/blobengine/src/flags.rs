//! Per-record on-disk flags (spec §3, §6: "`HAS_EXTHDR` is a bit in the
//! engine's per-record flags").

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineFlags: u32 {
        /// The record's data area begins with an extension header.
        const HAS_EXTHDR = 1 << 0;
        /// New data is appended to any existing record for this key instead
        /// of replacing it.
        const APPEND     = 1 << 1;
        /// Skip checksum verification on lookup.
        const NOCSUM     = 1 << 2;
        /// Internal: the record is a reserved-but-uncommitted `PREPARE`
        /// placeholder and must not be visible to lookups or range scans.
        const PENDING    = 1 << 3;
        /// Internal: tombstone left behind by `remove`, physically reclaimed
        /// on the next defrag pass.
        const REMOVED    = 1 << 4;
    }
}

impl Default for EngineFlags {
    fn default() -> Self {
        EngineFlags::empty()
    }
}
