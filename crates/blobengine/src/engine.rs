//! The append-only blob engine: segment files, an in-memory index, and
//! synchronous defragmentation.
//!
//! This is the "external collaborator" spec.md deliberately excludes from
//! its own scope ("the low-level blob engine itself ... exposes write/read/
//! remove/iterate/defrag primitives"). It is implemented here, in full,
//! because the backend crate has nothing to call otherwise; see
//! SPEC_FULL.md §2 item 4 and DESIGN.md for the grounding of this choice.

use crate::error::{EngineError, Result};
use crate::flags::EngineFlags;
use crate::record::{DiskControl, CTL_LEN};
use crate::segment::Segment;
use blobcodec::Key;
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::FileExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub blob_size: u64,
    pub blob_size_limit: u64,
    pub records_in_blob: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            blob_size: 50 * 1024 * 1024,
            blob_size_limit: 0,
            records_in_blob: 1_000_000,
        }
    }
}

/// Adapter-facing result of a write or lookup (spec §3 "Write control").
#[derive(Clone)]
pub struct WriteControl {
    file: Arc<fs::File>,
    pub ctl_data_offset: u64,
    /// Points at the payload, extension header included when present.
    pub data_offset: u64,
    pub total_data_size: u64,
    pub flags: EngineFlags,
    pub timestamp: u64,
}

impl WriteControl {
    #[cfg(unix)]
    pub fn raw_fd(&self) -> RawFd {
        use std::os::unix::io::AsRawFd;
        self.file.as_raw_fd()
    }

    pub fn file(&self) -> &fs::File {
        &self.file
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RangeHit {
    pub key: Key,
    pub record_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub total_records: u64,
    pub removed_records: u64,
}

#[derive(Clone, Copy)]
struct IndexEntry {
    segment_id: u64,
    ctl_offset: u64,
    total_size: u64,
}

struct State {
    segments: HashMap<u64, Segment>,
    next_segment_id: u64,
    active_segment_id: u64,
    index: HashMap<Key, IndexEntry>,
    pending: HashMap<Key, IndexEntry>,
    removed_records: u64,
}

pub struct BlobEngine {
    data_dir: PathBuf,
    options: EngineOptions,
    state: Mutex<State>,
}

impl BlobEngine {
    /// Opens (creating if absent) the engine's data directory and rebuilds
    /// the index by scanning any segment files already there.
    pub fn open(data_dir: impl AsRef<Path>, options: EngineOptions) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        let mut segments = HashMap::new();
        let mut index = HashMap::new();
        let mut max_id = 0u64;
        let mut entries: Vec<_> = fs::read_dir(&data_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().map(|e| e == "data").unwrap_or(false)
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with("blob-"))
                        .unwrap_or(false)
            })
            .collect();
        entries.sort();

        for path in entries {
            let id = segment_id_from_path(&path).unwrap_or(0);
            max_id = max_id.max(id);
            let mut seg = Segment::open_existing(path.clone(), id)?;
            scan_segment_into_index(&mut seg, &mut index)?;
            segments.insert(id, seg);
        }

        let active_segment_id = if segments.is_empty() {
            let seg = Segment::create(&data_dir, 0)?;
            segments.insert(0, seg);
            0
        } else {
            max_id
        };

        info!(
            data_dir = %data_dir.display(),
            segments = segments.len(),
            records = index.len(),
            "blob engine opened"
        );

        Ok(BlobEngine {
            data_dir,
            options,
            state: Mutex::new(State {
                segments,
                next_segment_id: max_id + 1,
                active_segment_id,
                index,
                pending: HashMap::new(),
                removed_records: 0,
            }),
        })
    }

    /// Reserves `reserved_len` bytes of data-area space for `key`, ahead of
    /// a sequence of `write_patch` calls and a final `commit` (spec §4.3
    /// step 1, the `PREPARE` path).
    pub fn prepare(&self, key: Key, reserved_len: u64, has_exthdr: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut flags = EngineFlags::PENDING;
        if has_exthdr {
            flags |= EngineFlags::HAS_EXTHDR;
        }
        let ctl = DiskControl {
            flags,
            key,
            size: reserved_len,
            timestamp: 0,
            crc32: 0,
        };
        let mut bytes = ctl.encode();
        bytes.resize(CTL_LEN + reserved_len as usize, 0);

        let segment_id = ensure_capacity(&mut state, &self.data_dir, &self.options, bytes.len() as u64)?;
        let seg = state.segments.get_mut(&segment_id).unwrap();
        let ctl_offset = seg.append(&bytes)?;

        state.pending.insert(
            key,
            IndexEntry {
                segment_id,
                ctl_offset,
                total_size: reserved_len,
            },
        );
        Ok(())
    }

    /// Patches `data` into the data area of a pending (prepared) record at
    /// `patch_offset`, optionally reading the bytes back to verify the
    /// write landed (spec §4.3 step 2: plain vs verifying write).
    pub fn write_patch(&self, key: Key, patch_offset: u64, data: &[u8], verify: bool) -> Result<()> {
        let state = self.state.lock().unwrap();
        let entry = *state
            .pending
            .get(&key)
            .ok_or_else(|| EngineError::InvalidState("no pending reservation for key".into()))?;
        let seg = state.segments.get(&entry.segment_id).unwrap();
        let file_offset = entry.ctl_offset + CTL_LEN as u64 + patch_offset;
        seg.file.write_at(data, file_offset)?;
        if verify {
            let mut readback = vec![0u8; data.len()];
            seg.file.read_exact_at(&mut readback, file_offset)?;
            if readback != data {
                return Err(EngineError::Corrupt("write verification mismatch".into()));
            }
        }
        Ok(())
    }

    /// Finalizes a `PREPARE`d record at `final_len` bytes, publishing it to
    /// the index (spec §4.3 step 3).
    pub fn commit(&self, key: Key, final_len: u64) -> Result<WriteControl> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .pending
            .remove(&key)
            .ok_or_else(|| EngineError::InvalidState("commit with no pending reservation".into()))?;
        let seg = state.segments.get(&entry.segment_id).unwrap();

        let mut data = vec![0u8; final_len as usize];
        seg.file.read_exact_at(&mut data, entry.ctl_offset + CTL_LEN as u64)?;
        let crc32 = crc32fast::hash(&data);

        let mut ctl_buf = [0u8; CTL_LEN];
        seg.file.read_exact_at(&mut ctl_buf, entry.ctl_offset)?;
        let mut ctl = DiskControl::decode(&ctl_buf)?;
        ctl.flags.remove(EngineFlags::PENDING);
        ctl.size = final_len;
        ctl.crc32 = crc32;
        seg.file.write_at(&ctl.encode(), entry.ctl_offset)?;

        let committed = IndexEntry {
            segment_id: entry.segment_id,
            ctl_offset: entry.ctl_offset,
            total_size: final_len,
        };
        state.index.insert(key, committed);

        Ok(WriteControl {
            file: seg.file.clone(),
            ctl_data_offset: entry.ctl_offset,
            data_offset: entry.ctl_offset + CTL_LEN as u64,
            total_data_size: final_len,
            flags: ctl.flags,
            timestamp: ctl.timestamp,
        })
    }

    /// A one-shot write: `data_area` is the full data area content
    /// (extension header, if any, followed by payload). If `flags` carries
    /// `APPEND` and `key` already has a live record, the existing data area
    /// is read back and `data_area` is appended to it before the combined
    /// bytes are written as a fresh record; the prior record becomes dead
    /// space, reclaimed on the next defrag.
    pub fn write(
        &self,
        key: Key,
        flags: EngineFlags,
        timestamp: u64,
        data_area: &[u8],
        verify: bool,
    ) -> Result<WriteControl> {
        let mut state = self.state.lock().unwrap();

        let full_data: Vec<u8> = if flags.contains(EngineFlags::APPEND) {
            if let Some(existing) = state.index.get(&key).copied() {
                let seg = state.segments.get(&existing.segment_id).unwrap();
                let mut prior = vec![0u8; existing.total_size as usize];
                seg.file.read_exact_at(&mut prior, existing.ctl_offset + CTL_LEN as u64)?;
                prior.extend_from_slice(data_area);
                prior
            } else {
                data_area.to_vec()
            }
        } else {
            data_area.to_vec()
        };

        let crc32 = if flags.contains(EngineFlags::NOCSUM) {
            0
        } else {
            crc32fast::hash(&full_data)
        };

        let ctl = DiskControl {
            flags: flags & !(EngineFlags::PENDING | EngineFlags::REMOVED),
            key,
            size: full_data.len() as u64,
            timestamp,
            crc32,
        };
        let mut bytes = ctl.encode();
        bytes.extend_from_slice(&full_data);

        let segment_id = ensure_capacity(&mut state, &self.data_dir, &self.options, bytes.len() as u64)?;
        let seg = state.segments.get_mut(&segment_id).unwrap();
        let ctl_offset = seg.append(&bytes)?;
        let file = seg.file.clone();

        if verify {
            let mut readback = vec![0u8; bytes.len()];
            file.read_exact_at(&mut readback, ctl_offset)?;
            if readback != bytes {
                return Err(EngineError::Corrupt("write verification mismatch".into()));
            }
        }

        state.index.insert(
            key,
            IndexEntry {
                segment_id,
                ctl_offset,
                total_size: full_data.len() as u64,
            },
        );

        Ok(WriteControl {
            file,
            ctl_data_offset: ctl_offset,
            data_offset: ctl_offset + CTL_LEN as u64,
            total_data_size: full_data.len() as u64,
            flags: ctl.flags,
            timestamp,
        })
    }

    /// Whether `key` has an outstanding `prepare` reservation awaiting `commit`.
    pub fn has_pending(&self, key: Key) -> bool {
        self.state.lock().unwrap().pending.contains_key(&key)
    }

    /// A write-control view of an uncommitted `prepare` reservation. Callers
    /// use this to report a file descriptor for a record that is still being
    /// assembled across several `write_patch` calls, before any committed
    /// index entry exists for it.
    pub fn pending_control(&self, key: Key) -> Result<WriteControl> {
        let state = self.state.lock().unwrap();
        let entry = *state.pending.get(&key).ok_or(EngineError::NotFound)?;
        let seg = state.segments.get(&entry.segment_id).unwrap();
        Ok(WriteControl {
            file: seg.file.clone(),
            ctl_data_offset: entry.ctl_offset,
            data_offset: entry.ctl_offset + CTL_LEN as u64,
            total_data_size: entry.total_size,
            flags: EngineFlags::PENDING | EngineFlags::HAS_EXTHDR,
            timestamp: 0,
        })
    }

    pub fn lookup(&self, key: Key, nocsum: bool) -> Result<WriteControl> {
        let state = self.state.lock().unwrap();
        let entry = *state.index.get(&key).ok_or(EngineError::NotFound)?;
        let seg = state.segments.get(&entry.segment_id).ok_or(EngineError::NotFound)?;

        let mut ctl_buf = [0u8; CTL_LEN];
        seg.file.read_exact_at(&mut ctl_buf, entry.ctl_offset)?;
        let ctl = DiskControl::decode(&ctl_buf)?;

        if !nocsum && ctl.crc32 != 0 {
            let mut data = vec![0u8; entry.total_size as usize];
            seg.file.read_exact_at(&mut data, entry.ctl_offset + CTL_LEN as u64)?;
            if crc32fast::hash(&data) != ctl.crc32 {
                return Err(EngineError::Corrupt(format!("checksum mismatch for key {}", key)));
            }
        }

        Ok(WriteControl {
            file: seg.file.clone(),
            ctl_data_offset: entry.ctl_offset,
            data_offset: entry.ctl_offset + CTL_LEN as u64,
            total_data_size: entry.total_size,
            flags: ctl.flags,
            timestamp: ctl.timestamp,
        })
    }

    pub fn remove(&self, key: Key) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state.index.remove(&key).ok_or(EngineError::NotFound)?;
        let seg = state.segments.get(&entry.segment_id).ok_or(EngineError::NotFound)?;

        let mut ctl_buf = [0u8; CTL_LEN];
        seg.file.read_exact_at(&mut ctl_buf, entry.ctl_offset)?;
        let mut ctl = DiskControl::decode(&ctl_buf)?;
        ctl.flags |= EngineFlags::REMOVED;
        seg.file.write_at(&ctl.encode(), entry.ctl_offset)?;

        state.removed_records += 1;
        debug!(%key, "record removed");
        Ok(())
    }

    /// Invokes `f` for every live key in `[start, end]` (spec §4.4 collect
    /// pass). Iteration order is index order (unordered across segments);
    /// the caller sorts if it needs `SORT` semantics.
    pub fn for_each_in_range(&self, start: Key, end: Key, mut f: impl FnMut(RangeHit)) {
        let state = self.state.lock().unwrap();
        for (key, entry) in state.index.iter() {
            if *key >= start && *key <= end {
                f(RangeHit {
                    key: *key,
                    record_size: entry.total_size,
                });
            }
        }
    }

    /// Read-only traversal of every live record in engine order, for
    /// external collaborators (recovery, replication) per spec §4.6.
    pub fn iterate(
        &self,
        mut f: impl FnMut(Key, &fs::File, u64, u64, bool) -> Result<()>,
    ) -> Result<()> {
        let state = self.state.lock().unwrap();
        let mut ordered: Vec<(Key, IndexEntry)> = state.index.iter().map(|(k, v)| (*k, *v)).collect();
        ordered.sort_by_key(|(_, e)| (e.segment_id, e.ctl_offset));

        for (key, entry) in ordered {
            let seg = state.segments.get(&entry.segment_id).ok_or(EngineError::NotFound)?;
            let mut ctl_buf = [0u8; CTL_LEN];
            seg.file.read_exact_at(&mut ctl_buf, entry.ctl_offset)?;
            let ctl = DiskControl::decode(&ctl_buf)?;
            f(
                key,
                &seg.file,
                entry.ctl_offset + CTL_LEN as u64,
                entry.total_size,
                ctl.flags.contains(EngineFlags::HAS_EXTHDR),
            )?;
        }
        Ok(())
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.lock().unwrap();
        EngineStats {
            total_records: state.index.len() as u64,
            removed_records: state.removed_records,
        }
    }

    /// Compacts every segment into one fresh segment, dropping dead space
    /// left by `remove`/`APPEND`/overwrite. Runs synchronously on the
    /// calling thread (spec §5: engine calls block the caller).
    pub fn defrag(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let new_id = state.next_segment_id;
        state.next_segment_id += 1;
        let mut new_seg = Segment::create(&self.data_dir, new_id)?;

        let mut ordered: Vec<(Key, IndexEntry)> = state.index.iter().map(|(k, v)| (*k, *v)).collect();
        ordered.sort_by_key(|(_, e)| (e.segment_id, e.ctl_offset));

        let mut new_index = HashMap::with_capacity(ordered.len());
        for (key, entry) in ordered {
            let old_seg = state.segments.get(&entry.segment_id).unwrap();
            let mut record = vec![0u8; CTL_LEN + entry.total_size as usize];
            old_seg.file.read_exact_at(&mut record, entry.ctl_offset)?;
            let new_ctl_offset = new_seg.append(&record)?;
            new_index.insert(
                key,
                IndexEntry {
                    segment_id: new_id,
                    ctl_offset: new_ctl_offset,
                    total_size: entry.total_size,
                },
            );
        }

        let old_paths: Vec<PathBuf> = state.segments.values().map(|s| s.path.clone()).collect();
        state.segments.clear();
        state.segments.insert(new_id, new_seg);
        state.active_segment_id = new_id;
        state.index = new_index;
        state.removed_records = 0;

        for path in old_paths {
            let _ = fs::remove_file(path);
        }

        info!(records = state.index.len(), "defrag pass complete");
        Ok(())
    }

    pub fn close(&self) {
        info!(data_dir = %self.data_dir.display(), "blob engine closed");
    }
}

/// Rotates to a fresh segment if the active one would exceed `blob_size` or
/// `records_in_blob` by accepting `incoming_len` more bytes. Returns the
/// segment id to append to.
fn ensure_capacity(
    state: &mut State,
    data_dir: &Path,
    options: &EngineOptions,
    incoming_len: u64,
) -> Result<u64> {
    if options.blob_size_limit > 0 && incoming_len > options.blob_size_limit {
        return Err(EngineError::InvalidState(format!(
            "record of {incoming_len} bytes exceeds blob_size_limit of {}",
            options.blob_size_limit
        )));
    }

    let active_id = state.active_segment_id;
    let needs_rotation = {
        let active = state.segments.get(&active_id).unwrap();
        active.len > 0
            && (active.len + incoming_len > options.blob_size
                || active.record_count >= options.records_in_blob)
    };

    if needs_rotation {
        let new_id = state.next_segment_id;
        state.next_segment_id += 1;
        let seg = Segment::create(data_dir, new_id)?;
        state.segments.insert(new_id, seg);
        state.active_segment_id = new_id;
        debug!(new_id, "rotated to fresh segment");
        Ok(new_id)
    } else {
        Ok(active_id)
    }
}

fn segment_id_from_path(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("blob-")?.parse().ok()
}

fn scan_segment_into_index(seg: &mut Segment, index: &mut HashMap<Key, IndexEntry>) -> Result<()> {
    let mut offset = 0u64;
    while offset < seg.len {
        let mut ctl_buf = [0u8; CTL_LEN];
        if seg.file.read_exact_at(&mut ctl_buf, offset).is_err() {
            break;
        }
        let ctl = match DiskControl::decode(&ctl_buf) {
            Ok(ctl) => ctl,
            Err(_) => break,
        };
        let record_len = CTL_LEN as u64 + ctl.size;
        if !ctl.flags.contains(EngineFlags::REMOVED) && !ctl.flags.contains(EngineFlags::PENDING) {
            index.insert(
                ctl.key,
                IndexEntry {
                    segment_id: seg.id,
                    ctl_offset: offset,
                    total_size: ctl.size,
                },
            );
        }
        seg.record_count += 1;
        offset += record_len;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::FileExt;

    fn key_from_byte(b: u8) -> Key {
        let mut bytes = [0u8; blobcodec::ID_LEN];
        bytes[0] = b;
        Key(bytes)
    }

    #[test]
    fn write_then_lookup_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let key = key_from_byte(1);
        engine.write(key, EngineFlags::empty(), 42, b"hello world", false).unwrap();

        let wc = engine.lookup(key, false).unwrap();
        let mut data = vec![0u8; wc.total_data_size as usize];
        wc.file().read_exact_at(&mut data, wc.data_offset).unwrap();
        assert_eq!(&data, b"hello world");
        assert_eq!(wc.timestamp, 42);
    }

    #[test]
    fn lookup_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let err = engine.lookup(key_from_byte(9), false).unwrap_err();
        assert!(matches!(err, EngineError::NotFound));
    }

    #[test]
    fn prepare_patch_commit_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let key = key_from_byte(2);
        engine.prepare(key, 10, false).unwrap();
        engine.write_patch(key, 0, b"abcde", true).unwrap();
        engine.write_patch(key, 5, b"fghij", true).unwrap();
        engine.commit(key, 10).unwrap();

        let wc = engine.lookup(key, false).unwrap();
        let mut data = vec![0u8; 10];
        wc.file().read_exact_at(&mut data, wc.data_offset).unwrap();
        assert_eq!(&data, b"abcdefghij");
    }

    #[test]
    fn append_flag_concatenates_onto_existing_record() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let key = key_from_byte(3);
        engine.write(key, EngineFlags::empty(), 1, b"foo", false).unwrap();
        engine.write(key, EngineFlags::APPEND, 2, b"bar", false).unwrap();

        let wc = engine.lookup(key, false).unwrap();
        let mut data = vec![0u8; wc.total_data_size as usize];
        wc.file().read_exact_at(&mut data, wc.data_offset).unwrap();
        assert_eq!(&data, b"foobar");
    }

    #[test]
    fn corrupted_payload_fails_checksum_on_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let key = key_from_byte(4);
        let wc = engine.write(key, EngineFlags::empty(), 0, b"untouched", false).unwrap();
        wc.file().write_at(b"X", wc.data_offset).unwrap();

        let err = engine.lookup(key, false).unwrap_err();
        assert!(matches!(err, EngineError::Corrupt(_)));

        // nocsum bypasses the check entirely.
        assert!(engine.lookup(key, true).is_ok());
    }

    #[test]
    fn remove_then_lookup_is_not_found_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let key = key_from_byte(5);
        engine.write(key, EngineFlags::empty(), 0, b"gone soon", false).unwrap();
        engine.remove(key).unwrap();

        assert!(matches!(engine.lookup(key, false).unwrap_err(), EngineError::NotFound));
        assert_eq!(engine.stats().removed_records, 1);
        assert_eq!(engine.stats().total_records, 0);
    }

    #[test]
    fn range_scan_finds_only_keys_within_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        for b in [1u8, 5, 10, 20] {
            engine.write(key_from_byte(b), EngineFlags::empty(), 0, b"v", false).unwrap();
        }

        let mut hits = Vec::new();
        engine.for_each_in_range(key_from_byte(4), key_from_byte(15), |hit| hits.push(hit.key));
        hits.sort();
        assert_eq!(hits, vec![key_from_byte(5), key_from_byte(10)]);
    }

    #[test]
    fn defrag_reclaims_space_and_preserves_live_records() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let kept = key_from_byte(6);
        let dropped = key_from_byte(7);
        engine.write(kept, EngineFlags::empty(), 0, b"keep me", false).unwrap();
        engine.write(dropped, EngineFlags::empty(), 0, b"drop me", false).unwrap();
        engine.remove(dropped).unwrap();

        engine.defrag().unwrap();

        assert_eq!(engine.stats().total_records, 1);
        assert_eq!(engine.stats().removed_records, 0);
        let wc = engine.lookup(kept, false).unwrap();
        let mut data = vec![0u8; wc.total_data_size as usize];
        wc.file().read_exact_at(&mut data, wc.data_offset).unwrap();
        assert_eq!(&data, b"keep me");
    }

    #[test]
    fn reopen_rebuilds_index_from_segment_files() {
        let dir = tempfile::tempdir().unwrap();
        let key = key_from_byte(8);
        {
            let engine = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
            engine.write(key, EngineFlags::empty(), 7, b"persisted", false).unwrap();
        }
        let reopened = BlobEngine::open(dir.path(), EngineOptions::default()).unwrap();
        let wc = reopened.lookup(key, false).unwrap();
        assert_eq!(wc.timestamp, 7);
    }

    #[test]
    fn rotates_to_a_new_segment_once_records_in_blob_is_reached() {
        let dir = tempfile::tempdir().unwrap();
        let options = EngineOptions {
            records_in_blob: 2,
            ..EngineOptions::default()
        };
        let engine = BlobEngine::open(dir.path(), options).unwrap();
        for b in 0..5u8 {
            engine.write(key_from_byte(b), EngineFlags::empty(), 0, b"x", false).unwrap();
        }
        let state = engine.state.lock().unwrap();
        assert!(state.segments.len() > 1);
    }
}
