//! Command dispatcher: maps command codes to adapter operations
//! (spec.md §4.5).

use crate::adapter::{self, ChecksumOutcome, FileInfoReply, RangeReadFrame};
use crate::error::{BackendError, Result};
use crate::range;
use blobcodec::{CommandFlags, DefragCtl, DefragState, IoAttr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Lookup,
    Write,
    Read,
    ReadRange,
    DelRange,
    Stat,
    Del,
    Defrag,
    Unknown(u32),
}

/// Everything a dispatched command can produce. Range commands stream
/// frames through a caller-supplied callback instead, and are summarized by
/// [`range::RangeResult`].
pub enum Reply {
    FileInfo(FileInfoReply),
    Read(adapter::ReadReply),
    Deleted,
    Stat(crate::backend::FsStat),
    DefragState(DefragState),
    DefragStarted,
    RangeRead(range::RangeResult),
    RangeDelete(range::RangeResult),
}

/// Dispatches a single command against `backend`. `on_range_frame` is only
/// invoked for `ReadRange`; other codes ignore it.
#[allow(clippy::too_many_arguments)]
pub fn dispatch(
    backend: &crate::backend::Backend,
    code: CommandCode,
    io: &mut IoAttr,
    payload: &[u8],
    defrag_ctl: Option<&DefragCtl>,
    mut on_range_frame: impl FnMut(RangeReadFrame) -> Result<()>,
) -> Result<Reply> {
    match code {
        CommandCode::Lookup => Ok(Reply::FileInfo(adapter::lookup(backend.engine(), io)?)),

        CommandCode::Write => match adapter::write(backend.engine(), io, payload)? {
            Some(info) => Ok(Reply::FileInfo(info)),
            None => Ok(Reply::FileInfo(FileInfoReply {
                fd: -1,
                fd_offset: 0,
                size: 0,
                timestamp: io.timestamp,
            })),
        },

        CommandCode::Read => Ok(Reply::Read(adapter::read(backend.engine(), backend.classifier(), io)?)),

        CommandCode::ReadRange => {
            let hits = range::collect(backend.engine(), io.id, io.parent, io.offset);
            let sort = io.flags.contains(CommandFlags::SORT);
            let result = range::apply_read(backend.engine(), io, hits, sort, &mut on_range_frame)?;
            Ok(Reply::RangeRead(result))
        }

        CommandCode::DelRange => {
            let hits = range::collect(backend.engine(), io.id, io.parent, io.offset);
            let sort = io.flags.contains(CommandFlags::SORT);
            let result = range::apply_delete(backend.engine(), io, hits, sort)?;
            Ok(Reply::RangeDelete(result))
        }

        CommandCode::Stat => Ok(Reply::Stat(backend.stat()?)),

        CommandCode::Del => {
            adapter::delete(backend.engine(), io.id)?;
            Ok(Reply::Deleted)
        }

        CommandCode::Defrag => {
            if io.flags.contains(CommandFlags::STATUS) {
                Ok(Reply::DefragState(backend.defrag_status()))
            } else {
                let ctl = defrag_ctl.ok_or_else(|| {
                    BackendError::BadDefragPayload("DEFRAG start requires a control payload".into())
                })?;
                ctl.validate()
                    .map_err(|e| BackendError::BadDefragPayload(e.to_string()))?;
                backend.defrag_start()?;
                Ok(Reply::DefragStarted)
            }
        }

        CommandCode::Unknown(code) => Err(BackendError::Unsupported(format!("unknown command code {code}"))),
    }
}

/// Delegates to [`adapter::checksum`]; exposed at the dispatcher level
/// because the checksum command is reached the same way as the others.
pub fn checksum(backend: &crate::backend::Backend, io: &IoAttr) -> Result<ChecksumOutcome> {
    adapter::checksum(backend.engine(), io)
}
