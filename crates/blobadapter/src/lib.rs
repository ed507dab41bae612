//! Blob adapter, range engine, command dispatcher, and lifecycle/stats
//! bridge over an append-only blob engine.

pub mod adapter;
pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod range;

pub use backend::{Backend, BackendCallbacks, FsStat, IterRecord, StatsReply};
pub use dispatcher::{dispatch, CommandCode, Reply};
pub use error::{BackendError, Result};
