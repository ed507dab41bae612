use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("short read: need {need} bytes, have {have}")]
    ShortRead { need: usize, have: usize },

    #[error("corrupt extension header: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
