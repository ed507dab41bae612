//! Error kinds for the blob backend (spec.md §7), plus the negated-errno
//! mapping a command reply header carries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("record not found")]
    NotFound,

    #[error("offset {offset} out of range for record of size {size}")]
    OutOfRange { offset: u64, size: u64 },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt: {0}")]
    Corrupt(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid defrag payload: {0}")]
    BadDefragPayload(String),

    #[error("engine error: {0}")]
    Engine(#[from] blobengine::EngineError),

    #[error("codec error: {0}")]
    Codec(#[from] blobcodec::CodecError),

    #[error("config error: {0}")]
    Config(#[from] blobconfig::ConfigError),
}

impl BackendError {
    /// Negated POSIX errno, per spec.md §6: the value a command reply
    /// header carries.
    pub fn errno(&self) -> i32 {
        match self {
            BackendError::NotFound => -libc::ENOENT,
            BackendError::OutOfRange { .. } => -libc::E2BIG,
            BackendError::Unsupported(_) => -libc::ENOTSUP,
            BackendError::Protocol(_) => -libc::EPROTO,
            BackendError::Io(_) => -libc::EIO,
            BackendError::Corrupt(_) => -libc::EPROTO,
            BackendError::OutOfMemory(_) => -libc::ENOMEM,
            BackendError::InvalidConfig(_) => -libc::EINVAL,
            BackendError::BadDefragPayload(_) => -libc::EINVAL,
            BackendError::Engine(blobengine::EngineError::NotFound) => -libc::ENOENT,
            BackendError::Engine(blobengine::EngineError::Io(_)) => -libc::EIO,
            BackendError::Engine(blobengine::EngineError::Corrupt(_)) => -libc::EPROTO,
            BackendError::Engine(blobengine::EngineError::InvalidState(_)) => -libc::EINVAL,
            BackendError::Engine(blobengine::EngineError::Codec(_)) => -libc::EPROTO,
            BackendError::Codec(_) => -libc::EPROTO,
            BackendError::Config(_) => -libc::EINVAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
