//! Error type for vocabulary construction, table storage and training.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A training parameter is out of range. Reported before the corpus is read.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// No word in the corpus occurs at least `min_count` times.
    #[error("vocabulary is empty: no word occurs at least {min_count} times; lower min_count")]
    EmptyVocabulary { min_count: u64 },

    #[error(
        "embedding table of {vocab_size} words x {vector_size} dimensions exceeds the limit of \
         {limit} elements; increase min_count or decrease vector_size"
    )]
    EmbeddingTableTooLarge {
        vocab_size: usize,
        vector_size: usize,
        limit: u64,
    },

    #[error("row index {index} out of range for matrix with {rows} rows")]
    IndexOutOfRange { index: usize, rows: usize },

    #[error("row has length {actual}, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The Huffman tree is deeper than the code buffers allow.
    #[error("Huffman code for {word:?} has length {length}, more than the maximum of {max}")]
    CodeTooLong {
        word: String,
        length: usize,
        max: usize,
    },

    #[error("failed to allocate matrix block: {0}")]
    Allocation(String),

    #[error("vocabulary file syntax error on line {line}: {message}")]
    VocabularyFormat { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
