//! Vector index snapshots with Zstd compression
//!
//! A snapshot holds every chunk together with its embedding so that a restart
//! against the same document and settings can skip the embedding service.

pub mod compression;
pub mod error;
pub mod snapshot;

pub use compression::CompressionLevel;
pub use compression::Compressor;
pub use error::PersistenceError;
pub use error::Result;
pub use snapshot::IndexSnapshot;
pub use snapshot::SnapshotStore;
pub use snapshot::index_fingerprint;

/// Header for resumebot snapshot files
pub const RBOT_MAGIC: &[u8] = b"RBOT";

/// Current snapshot format version
pub const FORMAT_VERSION: u16 = 1;
