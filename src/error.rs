use std::io;
use std::sync::PoisonError;

use crate::extractor::ExtractionError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Index must be opened before it is used")]
    NotOpen,

    #[error("Corruption: {0}")]
    Corruption(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Mutex was poisoned")]
    MutexPoisoned,
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::MutexPoisoned
    }
}
