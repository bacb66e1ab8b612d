use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::chunked::ChunkedMatrix;
use crate::config::Word2VecConfig;
use crate::error::Result;
use crate::real;
use crate::vocab::{VocabWord, Vocabulary};

/// Trained word vectors, plus the tree weights they were trained against.
#[derive(Debug)]
pub struct Word2VecModel {
    config: Word2VecConfig,
    vocab: Vocabulary,
    /// The learned word-vectors.
    embeddings: ChunkedMatrix,
    /// Weights for hierarchical softmax predictors.
    weights: ChunkedMatrix,
}

/// Everything needed to reload a model, in a serde-friendly shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDump {
    pub config: Word2VecConfig,
    pub vocab: Vec<VocabWord>,
    /// `embeddings[k * size..(k+1) * size]` is the vector embedding for word `k`.
    pub embeddings: Vec<real>,
    pub weights: Vec<real>,
}

impl Word2VecModel {
    pub(crate) fn new(
        config: Word2VecConfig,
        vocab: Vocabulary,
        embeddings: ChunkedMatrix,
        weights: ChunkedMatrix,
    ) -> Self {
        Word2VecModel {
            config,
            vocab,
            embeddings,
            weights,
        }
    }

    pub fn config(&self) -> &Word2VecConfig {
        &self.config
    }

    /// Returns the vector size.
    pub fn vector_size(&self) -> usize {
        self.embeddings.columns()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn embeddings(&self) -> &ChunkedMatrix {
        &self.embeddings
    }

    pub fn weights(&self) -> &ChunkedMatrix {
        &self.weights
    }

    /// Get the vector for a word. Exact match only, case-sensitive.
    pub fn vector(&self, word: &str) -> Option<&[real]> {
        let id = self.vocab.lookup(word)?;
        self.embeddings.row(id).ok()
    }

    /// `(word, vector)` pairs in vocabulary order.
    pub fn word_vectors(&self) -> Vec<(String, Vec<real>)> {
        self.vocab
            .iter()
            .zip(self.embeddings.iter_rows())
            .map(|(vw, row)| (vw.word.clone(), row.to_vec()))
            .collect()
    }

    /// Write the vectors in the classic word2vec format: a `"<words> <size>"`
    /// header, then each word followed by its vector, either as text or as raw
    /// native-endian `f32`s.
    pub fn write_word2vec<W: Write>(&self, mut out: W, binary: bool) -> Result<()> {
        writeln!(out, "{} {}", self.len(), self.vector_size())?;
        for (vw, row) in self.vocab.iter().zip(self.embeddings.iter_rows()) {
            write!(out, "{} ", vw.word)?;
            if binary {
                out.write_all(bytemuck::cast_slice::<real, u8>(row))?;
            } else {
                for f in row {
                    write!(out, "{} ", f)?;
                }
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_dump(&self) -> ModelDump {
        ModelDump {
            config: self.config.clone(),
            vocab: self.vocab.words().to_vec(),
            embeddings: self.embeddings.to_vec(),
            weights: self.weights.to_vec(),
        }
    }
}
