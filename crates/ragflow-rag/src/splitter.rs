//! Recursive, token-aware text splitter

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ragflow_core::{Error, Result};

type LengthFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text on paragraph, line and word boundaries until every chunk
/// fits `chunk_size` as measured by the length function.
#[derive(Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    length: LengthFn,
}

impl fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextSplitter")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("separators", &self.separators)
            .finish()
    }
}

impl TextSplitter {
    /// Create a splitter measuring length with a custom function
    pub fn with_length_fn<F>(chunk_size: usize, chunk_overlap: usize, length: F) -> Result<Self>
    where
        F: Fn(&str) -> usize + Send + Sync + 'static,
    {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "Invalid splitter sizes: chunk_size={}, chunk_overlap={}",
                chunk_size, chunk_overlap
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            length: Arc::new(length),
        })
    }

    /// Create a splitter measuring length in tiktoken tokens
    pub fn from_tiktoken(
        encoding_name: &str,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        let bpe = match encoding_name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => {
                return Err(Error::Configuration(format!("Unknown tiktoken encoding: {}", other)));
            }
        }
        .map_err(|e| Error::Configuration(format!("Failed to load {}: {}", encoding_name, e)))?;

        let bpe = Arc::new(bpe);
        Self::with_length_fn(chunk_size, chunk_overlap, move |text| {
            bpe.encode_ordinary(text).len()
        })
    }

    /// Replace the separator list (tried in order, `""` splits into characters)
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Length of `text` as measured by this splitter
    pub fn length_of(&self, text: &str) -> usize {
        (self.length)(text)
    }

    /// Split a text into chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut good_splits: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if self.length_of(&piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                if let Some(piece) = non_blank(&piece) {
                    chunks.push(piece);
                }
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits));
        }

        chunks
    }

    /// Greedily pack small splits into chunks, carrying over a tail of up to
    /// `chunk_overlap` into the next chunk
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = self.length_of(split);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }
                if !current.is_empty() {
                    if let Some(doc) = join_chunk(&current) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        match current.pop_front() {
                            Some(first) => total -= self.length_of(first),
                            None => break,
                        }
                    }
                }
            }

            current.push_back(split);
            total += len;
        }

        if let Some(doc) = join_chunk(&current) {
            docs.push(doc);
        }

        docs
    }
}

/// Split on `separator`, gluing it to the start of every following piece
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = text.split(separator);
    let mut out: Vec<String> = pieces.next().map(String::from).into_iter().collect();
    out.extend(pieces.map(|p| format!("{}{}", separator, p)));
    out.retain(|s| !s.is_empty());
    out
}

fn join_chunk(parts: &VecDeque<&str>) -> Option<String> {
    let joined: String = parts.iter().copied().collect();
    non_blank(&joined)
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::with_length_fn(size, overlap, |s| s.chars().count()).unwrap()
    }

    #[test]
    fn test_split_words_without_overlap_room() {
        let chunks = char_splitter(10, 3).split_text("aaa bbb ccc ddd");
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn test_split_with_overlap() {
        let chunks = char_splitter(10, 5).split_text("a b c d e f g h");
        assert_eq!(chunks, vec!["a b c d e", "d e f g h"]);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = char_splitter(100, 10).split_text("para one.\n\npara two.");
        assert_eq!(chunks, vec!["para one.\n\npara two."]);
    }

    #[test]
    fn test_paragraphs_split_first() {
        let chunks = char_splitter(12, 0).split_text("first para\n\nsecond one");
        assert_eq!(chunks, vec!["first para", "second one"]);
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let chunks = char_splitter(4, 0).split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_blank_text() {
        assert!(char_splitter(10, 2).split_text("   \n\n  ").is_empty());
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(TextSplitter::with_length_fn(10, 10, |s| s.len()).is_err());
        assert!(TextSplitter::with_length_fn(0, 0, |s| s.len()).is_err());
    }

    #[test]
    fn test_tiktoken_splitter() {
        let splitter = TextSplitter::from_tiktoken("cl100k_base", 300, 50).unwrap();
        assert_eq!(splitter.length_of("hello"), 1);

        let chunks = splitter.split_text("  Sustained immunity comes from memory cells.  ");
        assert_eq!(chunks, vec!["Sustained immunity comes from memory cells."]);

        let long_text = "word ".repeat(1000);
        let chunks = splitter.split_text(&long_text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| splitter.length_of(c) <= 300));
    }

    #[test]
    fn test_unknown_encoding() {
        let err = TextSplitter::from_tiktoken("gpt2_fancy", 300, 50).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
