//! On-disk index snapshots.
//!
//! File layout:
//!
//! ```text
//! "RBOT" | version: u16 LE | payload length: u64 LE | zstd(bincode(IndexSnapshot))
//! ```
//!
//! A snapshot is only reused when its fingerprint matches the current
//! embedding model, chunking settings and document text.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use resumebot_core::PreparedChunk;
use resumebot_core::RagConfig;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::info;

use crate::FORMAT_VERSION;
use crate::RBOT_MAGIC;
use crate::compression::CompressionLevel;
use crate::compression::Compressor;
use crate::error::PersistenceError;
use crate::error::Result;

const HEADER_LEN: usize = 4 + 2 + 8;

/// Identity of everything an index depends on.
pub fn index_fingerprint(config: &RagConfig, document: &str) -> String {
    format!(
        "embedding={};chunk={}/{}/{};document={:x}",
        config.embedding_model.trim(),
        config.chunk_size,
        config.chunk_overlap,
        config.chunk_unit,
        Sha256::digest(document.as_bytes())
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub fingerprint: String,
    pub entries: Vec<PreparedChunk>,
}

impl IndexSnapshot {
    pub fn new(fingerprint: String, entries: Vec<PreparedChunk>) -> Self {
        Self {
            fingerprint,
            entries,
        }
    }

    pub fn encode(&self, compressor: &Compressor) -> Result<Vec<u8>> {
        let serialized = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        let compressed = compressor.compress(&serialized)?;
        debug!(
            entries = self.entries.len(),
            raw = serialized.len(),
            compressed = compressed.len(),
            ratio = Compressor::compression_ratio(serialized.len(), compressed.len()),
            "encoded snapshot"
        );

        let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
        out.extend_from_slice(RBOT_MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(compressed.len() as u64).to_le_bytes());
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    pub fn decode(bytes: &[u8], compressor: &Compressor) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(PersistenceError::CorruptData(format!(
                "file is {} bytes, shorter than the header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != RBOT_MAGIC {
            return Err(PersistenceError::InvalidMagic);
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(version, FORMAT_VERSION));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[6..HEADER_LEN]);
        let declared = u64::from_le_bytes(len_bytes);
        let payload = &bytes[HEADER_LEN..];
        if payload.len() as u64 != declared {
            return Err(PersistenceError::CorruptData(format!(
                "payload is {} bytes, header declares {declared}",
                payload.len()
            )));
        }

        let decompressed = compressor.decompress(payload)?;
        let (snapshot, _): (IndexSnapshot, usize) =
            bincode::serde::decode_from_slice(&decompressed, bincode::config::standard())?;
        Ok(snapshot)
    }
}

/// A single snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    compressor: Compressor,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_level(path, CompressionLevel::default())
    }

    pub fn with_level(path: impl Into<PathBuf>, level: CompressionLevel) -> Self {
        Self {
            path: path.into(),
            compressor: Compressor::new(level),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file atomically: readers see the old or the new snapshot,
    /// never a partial one.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let bytes = snapshot.encode(&self.compressor)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| PersistenceError::Io(e.error))?;
        info!(
            path = %self.path.display(),
            entries = snapshot.entries.len(),
            bytes = bytes.len(),
            "saved index snapshot"
        );
        Ok(())
    }

    /// `None` when no snapshot file exists.
    pub fn load(&self) -> Result<Option<IndexSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        IndexSnapshot::decode(&bytes, &self.compressor).map(Some)
    }

    /// Load only a snapshot built for `fingerprint`.
    pub fn load_matching(&self, fingerprint: &str) -> Result<Option<IndexSnapshot>> {
        match self.load()? {
            Some(snapshot) if snapshot.fingerprint == fingerprint => Ok(Some(snapshot)),
            Some(snapshot) => {
                info!(
                    path = %self.path.display(),
                    stored = %snapshot.fingerprint,
                    "snapshot is stale, ignoring"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
