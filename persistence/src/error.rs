//! Error types for persistence operations

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Bincode encoding errors
    #[error("Bincode encoding error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),

    /// Bincode decoding errors
    #[error("Bincode decoding error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Compression errors
    #[error("Compression error: {0}")]
    Compression(String),

    /// Invalid magic bytes in file header
    #[error("Invalid file format: expected RBOT magic bytes")]
    InvalidMagic,

    /// Unsupported format version
    #[error("Unsupported format version: {0} (expected {1})")]
    UnsupportedVersion(u16, u16),

    /// Truncated or otherwise corrupt snapshot
    #[error("Corrupt snapshot data: {0}")]
    CorruptData(String),
}
