//! Overlapping fixed-size windows over document text.
//!
//! Adjacent chunks share exactly `overlap` units; only the last chunk may be
//! shorter than `size`. For a text of `len` units the chunk count is
//! `ceil((len - overlap) / (size - overlap))`, with the one exception that a
//! non-empty text no longer than `overlap` still produces a single chunk.

use serde::Deserialize;
use serde::Serialize;

use crate::config::ChunkUnit;
use crate::config::RagConfig;
use crate::error::RagError;
use crate::error::Result;

pub type ChunkId = u64;

/// A contiguous slice of the source document, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Join key into the vector index. Stable for the life of the process.
    pub id: ChunkId,
    pub text: String,
    /// Position in source order, starting at zero.
    pub ordinal: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
    unit: ChunkUnit,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize, unit: ChunkUnit) -> Result<Self> {
        if size == 0 {
            return Err(RagError::configuration("CHUNK_SIZE", "must be positive"));
        }
        if overlap >= size {
            return Err(RagError::configuration(
                "CHUNK_OVERLAP",
                format!("must be smaller than CHUNK_SIZE ({overlap} >= {size})"),
            ));
        }
        Ok(Self {
            size,
            overlap,
            unit,
        })
    }

    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap, config.chunk_unit)
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    pub const fn overlap(&self) -> usize {
        self.overlap
    }

    pub const fn unit(&self) -> ChunkUnit {
        self.unit
    }

    /// Split `text` into ordered chunks. Pure and deterministic.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        match self.unit {
            ChunkUnit::Words => {
                let words: Vec<&str> = text.split_whitespace().collect();
                self.windows(words.len())
                    .into_iter()
                    .map(|(start, end)| words[start..end].join(" "))
                    .enumerate()
                    .map(into_chunk)
                    .collect()
            }
            ChunkUnit::Chars => {
                if text.trim().is_empty() {
                    return Vec::new();
                }
                // Byte offset of every char boundary, including the end.
                let boundaries: Vec<usize> = text
                    .char_indices()
                    .map(|(offset, _)| offset)
                    .chain(std::iter::once(text.len()))
                    .collect();
                let units = boundaries.len() - 1;
                self.windows(units)
                    .into_iter()
                    .map(|(start, end)| text[boundaries[start]..boundaries[end]].to_string())
                    .enumerate()
                    .map(into_chunk)
                    .collect()
            }
        }
    }

    /// Number of chunks `chunk` produces for a text of `units` units.
    pub const fn expected_chunk_count(&self, units: usize) -> usize {
        if units == 0 {
            0
        } else if units <= self.size {
            1
        } else {
            let step = self.size - self.overlap;
            (units - self.overlap).div_ceil(step)
        }
    }

    fn windows(&self, units: usize) -> Vec<(usize, usize)> {
        let mut spans = Vec::with_capacity(self.expected_chunk_count(units));
        if units == 0 {
            return spans;
        }
        let step = self.size - self.overlap;
        let mut start = 0;
        loop {
            let end = (start + self.size).min(units);
            spans.push((start, end));
            if end == units {
                break;
            }
            start += step;
        }
        spans
    }
}

fn into_chunk((ordinal, text): (usize, String)) -> Chunk {
    Chunk {
        id: ordinal as ChunkId,
        text,
        ordinal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbered_words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("word{i}")).collect()
    }

    #[test]
    fn test_small_text_is_single_chunk() {
        let text = "This is a small text that should be returned as a single chunk.";
        let chunker = Chunker::new(100, 20, ChunkUnit::Words).unwrap();
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].ordinal, 0);
    }

    #[test]
    fn test_large_text_overlapping_word_windows() {
        let words = numbered_words(100);
        let text = words.join(" ");
        let chunker = Chunker::new(30, 10, ChunkUnit::Words).unwrap();

        let chunks = chunker.chunk(&text);

        // 0-29, 20-49, 40-69, 60-89, 80-99
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[0].text, words[0..30].join(" "));
        assert_eq!(chunks[4].text, words[80..100].join(" "));
        for pair in chunks.windows(2) {
            let prev: Vec<&str> = pair[0].text.split(' ').collect();
            let next: Vec<&str> = pair[1].text.split(' ').collect();
            assert_eq!(prev[prev.len() - 10..], next[..10]);
        }
    }

    #[test]
    fn test_word_chunks_reconstruct_normalized_text() {
        let text = "alpha  beta\ngamma delta\tepsilon zeta eta theta iota";
        let chunker = Chunker::new(4, 1, ChunkUnit::Words).unwrap();
        let chunks = chunker.chunk(text);

        let mut rebuilt: Vec<&str> = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let words: Vec<&str> = chunk.text.split(' ').collect();
            let skip = if i == 0 { 0 } else { chunker.overlap() };
            rebuilt.extend(&words[skip..]);
        }
        assert_eq!(rebuilt.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn test_char_chunks_reconstruct_original_text() {
        let text = "Rust engineer.\n\nBuilt a vector index, and a cache for ünïcödé input.";
        let chunker = Chunker::new(12, 5, ChunkUnit::Chars).unwrap();
        let chunks = chunker.chunk(text);

        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { chunker.overlap() };
            rebuilt.extend(chunk.text.chars().skip(skip));
        }
        assert_eq!(rebuilt, text);

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert_eq!(prev.len(), 12);
            assert_eq!(prev[prev.len() - 5..], next[..5]);
        }
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        for size in 1..12 {
            for overlap in 0..size {
                let chunker = Chunker::new(size, overlap, ChunkUnit::Chars).unwrap();
                for len in (overlap + 1)..40 {
                    let text = "x".repeat(len);
                    let expected = (len - overlap).div_ceil(size - overlap);
                    assert_eq!(
                        chunker.chunk(&text).len(),
                        expected,
                        "size={size} overlap={overlap} len={len}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_text_shorter_than_overlap_is_one_chunk() {
        let chunker = Chunker::new(50, 10, ChunkUnit::Chars).unwrap();
        let chunks = chunker.chunk("tiny");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
        assert_eq!(chunker.expected_chunk_count(4), 1);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let words = Chunker::new(10, 2, ChunkUnit::Words).unwrap();
        let chars = Chunker::new(10, 2, ChunkUnit::Chars).unwrap();
        assert!(words.chunk("").is_empty());
        assert!(words.chunk("  \n ").is_empty());
        assert!(chars.chunk("").is_empty());
        assert!(chars.chunk("\n\n").is_empty());
    }

    #[test]
    fn test_ids_and_ordinals_follow_source_order() {
        let chunker = Chunker::new(3, 1, ChunkUnit::Words).unwrap();
        let chunks = chunker.chunk("a b c d e f g h");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i);
            assert_eq!(chunk.id, i as ChunkId);
        }
        assert_eq!(chunker.chunk("a b c d e f g h"), chunks);
    }

    #[test]
    fn test_invalid_parameters_are_configuration_errors() {
        assert!(matches!(
            Chunker::new(10, 10, ChunkUnit::Words),
            Err(RagError::Configuration { .. })
        ));
        assert!(matches!(
            Chunker::new(0, 0, ChunkUnit::Chars),
            Err(RagError::Configuration { .. })
        ));
    }
}
