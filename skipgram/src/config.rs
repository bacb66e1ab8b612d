//! Training parameters.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::real;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word2VecConfig {
    /// Dimension of the word vectors.
    /// Default: 100.
    pub vector_size: usize,

    /// Starting learning rate.
    /// Default: 0.025.
    pub learning_rate: real,

    /// Number of partitions the training sentences are split into. Each
    /// partition trains on its own copy of the tables; the updates are summed
    /// after every iteration.
    /// Default: 1.
    pub num_partitions: usize,

    /// Number of passes over the corpus.
    /// Default: 1.
    pub num_iterations: usize,

    /// Words occurring fewer times than this are left out of the vocabulary.
    /// Default: 5.
    pub min_count: u64,

    /// Maximum distance between a word and its context words.
    /// Default: 5.
    pub window: usize,

    /// Seed for table initialization and the per-partition generators.
    /// Default: 1.
    pub seed: u64,

    /// Sentences longer than this are split into several.
    /// Default: 1000.
    pub max_sentence_length: usize,
}

impl Default for Word2VecConfig {
    fn default() -> Self {
        Word2VecConfig {
            vector_size: 100,
            learning_rate: 0.025,
            num_partitions: 1,
            num_iterations: 1,
            min_count: 5,
            window: 5,
            seed: 1,
            max_sentence_length: 1000,
        }
    }
}

impl Word2VecConfig {
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, message: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(Error::Configuration(message.to_string()))
            }
        }
        check(self.vector_size > 0, "vector_size must be positive")?;
        check(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "learning_rate must be positive",
        )?;
        check(self.num_partitions > 0, "num_partitions must be positive")?;
        check(self.num_iterations > 0, "num_iterations must be positive")?;
        check(self.window > 0, "window must be positive")?;
        check(
            self.max_sentence_length > 0,
            "max_sentence_length must be positive",
        )?;
        Ok(())
    }
}
