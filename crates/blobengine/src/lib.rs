//! Append-only segment blob engine.
//!
//! Owns the actual bytes on disk: segment files and the in-memory index
//! that backend adapters build their key/value semantics on top of.

mod engine;
mod error;
mod flags;
mod record;
mod segment;

pub use engine::{BlobEngine, EngineOptions, EngineStats, RangeHit, WriteControl};
pub use error::{EngineError, Result};
pub use flags::EngineFlags;
