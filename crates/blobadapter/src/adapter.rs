//! Blob adapter: write/read/lookup/delete/checksum (spec.md §4.3).
//!
//! Wraps [`blobengine::BlobEngine`]'s primitives with the extension-header
//! codec and translates command-level flags into engine flags.

use crate::error::{BackendError, Result};
use blobcodec::{apply_ext_to_io, decode_ext, encode_ext, CommandFlags, Denc as _, IoAttr, Key, EHDR_LEN};
use blobengine::{BlobEngine, EngineFlags};
use std::os::unix::io::RawFd;

/// Reply to WRITE/LOOKUP: a zero-copy descriptor into the engine's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfoReply {
    pub fd: RawFd,
    pub fd_offset: u64,
    pub size: u64,
    pub timestamp: u64,
}

/// Reply to READ: a zero-copy descriptor plus the classifier's cache hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReply {
    pub fd: RawFd,
    pub offset: u64,
    pub size: u64,
    pub cache_forget: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOutcome {
    /// The effective payload is empty; the caller should zero-fill its buffer.
    Zeroed,
    Range { fd: RawFd, offset: u64, size: u64 },
}

fn translate_write_flags(flags: CommandFlags) -> EngineFlags {
    let mut out = EngineFlags::HAS_EXTHDR;
    if flags.contains(CommandFlags::APPEND) {
        out |= EngineFlags::APPEND;
    }
    if flags.contains(CommandFlags::NOCSUM) {
        out |= EngineFlags::NOCSUM;
    }
    out
}

/// Writes `payload` (length `io.size`) under the envelope in `io`, mutating
/// `io` in place the way the lower layers expect (spec.md §4.3 "Write").
pub fn write(engine: &BlobEngine, io: &mut IoAttr, payload: &[u8]) -> Result<Option<FileInfoReply>> {
    if io.flags.contains(CommandFlags::COMPRESS) {
        return Err(BackendError::Unsupported("compression is not supported".into()));
    }

    io.flags |= CommandFlags::HAS_EXTHDR;
    let verify = !io.flags.contains(CommandFlags::PLAIN_WRITE);

    if io.flags.contains(CommandFlags::PREPARE) {
        engine.prepare(io.id, io.num + EHDR_LEN as u64, true)?;
    }

    let mut wc = None;

    if io.size > 0 {
        let ehdr = encode_ext(io);
        let mut ehdr_bytes = bytes::BytesMut::with_capacity(EHDR_LEN);
        ehdr.encode(&mut ehdr_bytes)?;

        if engine.has_pending(io.id) {
            engine.write_patch(io.id, 0, &ehdr_bytes, verify)?;
            engine.write_patch(io.id, EHDR_LEN as u64 + io.offset, payload, verify)?;
        } else {
            let mut data_area = vec![0u8; EHDR_LEN + io.offset as usize + payload.len()];
            data_area[..EHDR_LEN].copy_from_slice(&ehdr_bytes);
            data_area[EHDR_LEN + io.offset as usize..].copy_from_slice(payload);
            let engine_flags = translate_write_flags(io.flags);
            wc = Some(engine.write(io.id, engine_flags, io.timestamp, &data_area, verify)?);
        }
    }

    if io.flags.contains(CommandFlags::COMMIT) && io.flags.contains(CommandFlags::PLAIN_WRITE) {
        wc = Some(engine.commit(io.id, io.num + EHDR_LEN as u64)?);
    }

    let wc = match wc {
        Some(wc) => wc,
        None => match engine.lookup(io.id, true) {
            Ok(wc) => wc,
            Err(blobengine::EngineError::NotFound) => engine.pending_control(io.id)?,
            Err(e) => return Err(e.into()),
        },
    };

    if io.flags.contains(CommandFlags::WRITE_NO_FILE_INFO) {
        io.flags |= CommandFlags::ACK;
        return Ok(None);
    }

    Ok(Some(FileInfoReply {
        fd: wc.raw_fd(),
        fd_offset: wc.data_offset + EHDR_LEN as u64,
        size: wc.total_data_size,
        timestamp: wc.timestamp,
    }))
}

/// Reads the record named by `io.id`, applying caller slicing and the
/// access-pattern classifier (spec.md §4.3 "Read"). This is always the
/// last frame of its command, so `NEED_ACK` is cleared on success.
pub fn read(
    engine: &BlobEngine,
    classifier: &accessclassifier::Classifier,
    io: &mut IoAttr,
) -> Result<ReadReply> {
    let wc = engine.lookup(io.id, io.flags.contains(CommandFlags::NOCSUM))?;

    let mut offset = wc.data_offset;
    let mut size = wc.total_data_size;
    if wc.flags.contains(EngineFlags::HAS_EXTHDR) {
        let ehdr = decode_ext(wc.file(), offset)?;
        apply_ext_to_io(&ehdr, io);
        offset += EHDR_LEN as u64;
        size -= EHDR_LEN as u64;
    }
    io.total_size = size;

    if io.offset >= size {
        return Err(BackendError::OutOfRange { offset: io.offset, size });
    }
    offset += io.offset;
    size -= io.offset;
    if io.size != 0 {
        size = size.min(io.size);
    } else {
        io.size = size;
    }

    if size > 0 {
        io.flags.remove(CommandFlags::NEED_ACK);
    }

    let random = classifier.record_read(wc.raw_fd(), offset);

    Ok(ReadReply {
        fd: wc.raw_fd(),
        offset,
        size,
        cache_forget: random,
    })
}

/// Lookup / file-info: read steps 1-3 of spec.md §4.3, reported instead of
/// served. Fails with `NotFound` when the record's effective user size
/// (post extension-header adjustment) is zero.
pub fn lookup(engine: &BlobEngine, io: &mut IoAttr) -> Result<FileInfoReply> {
    let wc = engine.lookup(io.id, io.flags.contains(CommandFlags::NOCSUM))?;

    let mut offset = wc.data_offset;
    let mut size = wc.total_data_size;
    if wc.flags.contains(EngineFlags::HAS_EXTHDR) {
        let ehdr = decode_ext(wc.file(), offset)?;
        apply_ext_to_io(&ehdr, io);
        offset += EHDR_LEN as u64;
        size -= EHDR_LEN as u64;
    }
    io.total_size = size;

    if size == 0 {
        return Err(BackendError::NotFound);
    }

    Ok(FileInfoReply {
        fd: wc.raw_fd(),
        fd_offset: offset,
        size,
        timestamp: wc.timestamp,
    })
}

pub fn delete(engine: &BlobEngine, key: Key) -> Result<()> {
    engine.remove(key)?;
    Ok(())
}

/// Checksum: a `NOCSUM` lookup with the same extension-header adjustment as
/// read/lookup, but no classifier update (spec.md §4.3 "Checksum").
pub fn checksum(engine: &BlobEngine, io: &IoAttr) -> Result<ChecksumOutcome> {
    let wc = engine.lookup(io.id, true)?;

    let mut offset = wc.data_offset;
    let mut size = wc.total_data_size;
    if wc.flags.contains(EngineFlags::HAS_EXTHDR) {
        offset += EHDR_LEN as u64;
        size -= EHDR_LEN as u64;
    }

    if size == 0 {
        Ok(ChecksumOutcome::Zeroed)
    } else {
        Ok(ChecksumOutcome::Range {
            fd: wc.raw_fd(),
            offset,
            size,
        })
    }
}
