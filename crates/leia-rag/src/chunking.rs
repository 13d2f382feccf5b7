//! Overlapping text chunks for retrieval
//!
//! Sizes are counted in characters, never bytes, so accented text is never
//! split inside a code point.

/// Chunking configuration
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Characters repeated at the start of the next chunk
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 300,
            overlap: 30,
        }
    }
}

impl From<&leia_core::RagConfig> for ChunkConfig {
    fn from(config: &leia_core::RagConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }
}

/// Separators tried in order when looking for a break point
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Split `text` into trimmed, non-empty chunks of at most `chunk_size` characters
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let size = config.chunk_size.max(1);
    let overlap = config.overlap.min(size / 2);

    // byte offset of every char, plus the end of the text
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let limit = (start + size).min(total);
        let end = if limit < total {
            find_break_point(text, &offsets, start, limit)
        } else {
            limit
        };

        let chunk = text[offsets[start]..offsets[end]].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= total {
            break;
        }
        start = if end - start > overlap { end - overlap } else { end };
    }

    chunks
}

/// Char index just past the last separator inside `(start, limit]`, or `limit`
fn find_break_point(text: &str, offsets: &[usize], start: usize, limit: usize) -> usize {
    let window = &text[offsets[start]..offsets[limit]];

    for separator in SEPARATORS {
        if let Some(pos) = window.rfind(separator) {
            let cut = window[..pos + separator.len()].chars().count();
            // a separator at the very start would produce an empty chunk
            if cut > separator.chars().count() {
                return start + cut;
            }
        }
    }
    limit
}
