use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("record not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("invalid engine state: {0}")]
    InvalidState(String),

    #[error("codec error: {0}")]
    Codec(#[from] blobcodec::CodecError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
