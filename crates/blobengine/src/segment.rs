//! A single append-only segment file.

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Segment {
    pub id: u64,
    pub path: PathBuf,
    pub file: Arc<File>,
    /// Current append offset == file length.
    pub len: u64,
    pub record_count: u64,
}

impl Segment {
    pub fn create(dir: &Path, id: u64) -> Result<Self> {
        let path = dir.join(format!("blob-{:020}.data", id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        Ok(Segment {
            id,
            path,
            file: Arc::new(file),
            len: 0,
            record_count: 0,
        })
    }

    pub fn open_existing(path: PathBuf, id: u64) -> Result<Self> {
        let file = OpenOptions::new().read(true).append(true).open(&path)?;
        let len = file.metadata()?.len();
        Ok(Segment {
            id,
            path,
            file: Arc::new(file),
            len,
            record_count: 0,
        })
    }

    /// Appends `bytes` atomically from the caller's point of view: one
    /// `write_all` call, returning the offset it was written at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        use std::io::Write;
        let offset = self.len;
        (&*self.file).write_all(bytes)?;
        self.len += bytes.len() as u64;
        self.record_count += 1;
        Ok(offset)
    }
}
