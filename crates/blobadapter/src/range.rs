//! Range engine: collect then apply (spec.md §4.4).
//!
//! Collection copies flat hit descriptors out of the engine into a buffer
//! that does not borrow engine memory past the callback's return, per
//! spec.md §9's "pointer graphs" design note.

use crate::error::Result;
use blobcodec::{CommandFlags, IoAttr, Key, EHDR_LEN};
use blobengine::{BlobEngine, EngineFlags, RangeHit};
use tracing::{debug, info};

const INITIAL_CAPACITY: usize = 1000;

/// Collects every hit in `[start, end]` whose record is at least
/// `requested_offset` bytes long. The buffer grows by doubling, mirroring
/// the engine-side allocation policy spec.md §4.4 describes.
pub fn collect(engine: &BlobEngine, start: Key, end: Key, requested_offset: u64) -> Vec<RangeHit> {
    let mut hits = Vec::with_capacity(INITIAL_CAPACITY);
    engine.for_each_in_range(start, end, |hit| {
        if requested_offset > hit.record_size {
            return;
        }
        if hits.len() == hits.capacity() {
            hits.reserve(hits.capacity());
        }
        hits.push(hit);
    });
    hits
}

/// A single read frame emitted by the apply pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeReadFrame {
    pub key: Key,
    pub fd: std::os::unix::io::RawFd,
    pub offset: u64,
    pub size: u64,
}

/// Outcome of an apply pass: how many hits were actually emitted/removed,
/// and whether a terminating reply is owed (spec.md §4.4: "if any hits were
/// collected").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeResult {
    pub emitted: u64,
    pub any_collected: bool,
}

/// READ_RANGE apply pass. `on_frame` models sending a read reply to the
/// transport; a per-hit error aborts the remaining frames and is returned,
/// matching spec.md §4.4's "failure policy" (already-sent frames are not
/// unsent).
pub fn apply_read(
    engine: &BlobEngine,
    io: &IoAttr,
    mut hits: Vec<RangeHit>,
    sort: bool,
    mut on_frame: impl FnMut(RangeReadFrame) -> Result<()>,
) -> Result<RangeResult> {
    let any_collected = !hits.is_empty();
    if sort {
        hits.sort_by_key(|h| h.key);
    }

    let start = io.start as usize;
    let mut emitted = 0u64;

    for (i, hit) in hits.iter().enumerate().skip(start) {
        if io.num > 0 && (i as u64) >= io.num + io.start {
            break;
        }

        let wc = engine.lookup(hit.key, io.flags.contains(CommandFlags::NOCSUM))?;
        let mut offset = wc.data_offset;
        let mut size = wc.total_data_size;
        if wc.flags.contains(EngineFlags::HAS_EXTHDR) {
            offset += EHDR_LEN as u64;
            size -= EHDR_LEN as u64;
        }

        let frame = RangeReadFrame {
            key: hit.key,
            fd: wc.raw_fd(),
            offset: offset + io.offset,
            size: size.saturating_sub(io.offset),
        };
        on_frame(frame)?;
        emitted += 1;
        debug!(%hit.key, "range read frame sent");
    }

    if any_collected {
        info!(emitted, "range read apply pass complete");
    }

    Ok(RangeResult { emitted, any_collected })
}

/// DEL_RANGE apply pass: removes every collected key (subject to the same
/// `io.start` windowing as the read pass), propagating the first error.
pub fn apply_delete(engine: &BlobEngine, io: &IoAttr, mut hits: Vec<RangeHit>, sort: bool) -> Result<RangeResult> {
    let any_collected = !hits.is_empty();
    if sort {
        hits.sort_by_key(|h| h.key);
    }

    let start = io.start as usize;
    let mut emitted = 0u64;

    for hit in hits.iter().skip(start) {
        engine.remove(hit.key)?;
        emitted += 1;
    }

    if any_collected {
        info!(emitted, "range delete apply pass complete");
    }

    Ok(RangeResult { emitted, any_collected })
}
