//! Skip-gram word vectors with a hierarchical softmax output layer, trained
//! over partitions of the corpus.
//!
//! ```no_run
//! use skipgram::{Word2Vec, Word2VecConfig};
//!
//! let corpus = vec![vec!["the", "cat", "sat"], vec!["the", "dog", "sat"]];
//! let config = Word2VecConfig { min_count: 1, vector_size: 4, ..Word2VecConfig::default() };
//! let model = Word2Vec::new(config)?.fit(&corpus)?;
//! for (word, vector) in model.word_vectors() {
//!     println!("{word} {vector:?}");
//! }
//! # Ok::<(), skipgram::Error>(())
//! ```

pub mod chunked;
pub mod config;
pub mod error;
pub mod exec;
pub mod huffman;
pub mod model;
pub mod sigmoid;
pub mod vocab;
pub mod word2vec;

pub use chunked::ChunkedMatrix;
pub use config::Word2VecConfig;
pub use error::{Error, Result};
pub use exec::{Broadcast, Executor, LocalExecutor, Partitioned};
pub use model::{ModelDump, Word2VecModel};
pub use vocab::{VocabWord, Vocabulary};
pub use word2vec::{IterationSummary, Word2Vec};

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers

pub fn dot(a: &[real], b: &[real]) -> real {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&a, &b)| a * b).sum()
}

/// `y += a * x`
pub fn axpy(a: real, x: &[real], y: &mut [real]) {
    assert_eq!(x.len(), y.len());
    for (y, &x) in y.iter_mut().zip(x) {
        *y += a * x;
    }
}
