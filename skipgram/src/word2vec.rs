//! Partitioned skip-gram training with hierarchical softmax.
//!
//! The coordinator owns the two parameter tables. Every iteration it
//! broadcasts a snapshot of both, each partition trains a private copy on its
//! share of the sentences, and the per-row differences from the snapshot are
//! summed by key and added back into the tables. Partitions never touch the
//! coordinator's tables, so iterations need no locking.

use std::time::{Duration, Instant};

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::chunked::ChunkedMatrix;
use crate::config::Word2VecConfig;
use crate::error::{Error, Result};
use crate::exec::{Broadcast, Executor, LocalExecutor, Partitioned};
use crate::huffman::create_binary_tree;
use crate::model::Word2VecModel;
use crate::sigmoid::SigmoidTable;
use crate::vocab::Vocabulary;
use crate::{axpy, dot, real};

/// Largest number of elements a parameter table may hold.
pub const MAX_TABLE_ELEMENTS: u64 = i32::MAX as u64;

/// Words a partition processes between learning-rate updates.
const ALPHA_UPDATE_INTERVAL: u64 = 10_000;

/// The learning rate never decays below this fraction of its starting value.
const MIN_ALPHA_FACTOR: real = 0.0001;

/// Fails if a `vocab_size × vector_size` table would exceed [`MAX_TABLE_ELEMENTS`].
pub fn check_table_size(vocab_size: usize, vector_size: usize) -> Result<()> {
    match (vocab_size as u64).checked_mul(vector_size as u64) {
        Some(n) if n <= MAX_TABLE_ELEMENTS => Ok(()),
        _ => Err(Error::EmbeddingTableTooLarge {
            vocab_size,
            vector_size,
            limit: MAX_TABLE_ELEMENTS,
        }),
    }
}

/// Seed of the generator used by `partition` during `iteration` (1-based).
pub fn partition_seed(seed: u64, partition: usize, iteration: usize) -> u64 {
    seed ^ ((partition as u64 + 1) << 16) ^ ((!(iteration as u64)) << 8)
}

/// Learning rate after `word_count` words of one partition.
pub fn decayed_alpha(learning_rate: real, word_count: u64, train_words_count: u64) -> real {
    let progress = (word_count as f64 / (train_words_count + 1) as f64) as real;
    (learning_rate * (1.0 - progress)).max(learning_rate * MIN_ALPHA_FACTOR)
}

/// Positions of the context words of `pos`, with the window shrunk by
/// `reduce` on both sides and positions outside `0..len` skipped.
fn context_positions(
    pos: usize,
    reduce: usize,
    window: usize,
    len: usize,
) -> impl Iterator<Item = usize> {
    (reduce..(window * 2 + 1 - reduce))
        .filter(move |&a| a != window && pos + a >= window)
        .map(move |a| pos + a - window)
        .filter(move |&c| c < len)
}

/// Accumulated update to one table row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDelta {
    pub delta: Vec<real>,
    /// Number of partitions that modified the row.
    pub contributions: u32,
}

impl RowDelta {
    fn between(before: &[real], after: &[real]) -> Self {
        RowDelta {
            delta: after.iter().zip(before).map(|(a, b)| a - b).collect(),
            contributions: 1,
        }
    }

    /// Deltas from different partitions add up; they are not averaged.
    pub fn combine(mut self, other: RowDelta) -> RowDelta {
        axpy(1.0, &other.delta, &mut self.delta);
        self.contributions += other.contributions;
        self
    }
}

/// Reported after each iteration is applied.
#[derive(Debug, Clone)]
pub struct IterationSummary {
    /// 1-based.
    pub iteration: usize,
    pub starting_alpha: real,
    /// Smallest learning rate any partition reached.
    pub final_alpha: real,
    pub words_processed: u64,
    pub rows_updated: usize,
    /// Rows modified by more than one partition.
    pub contended_rows: usize,
    pub elapsed: Duration,
}

pub struct Word2Vec {
    config: Word2VecConfig,
}

impl Word2Vec {
    pub fn new(config: Word2VecConfig) -> Result<Self> {
        config.validate()?;
        Ok(Word2Vec { config })
    }

    pub fn config(&self) -> &Word2VecConfig {
        &self.config
    }

    /// Train on `corpus` (a list of tokenized sentences) using a local thread pool.
    pub fn fit<S, W>(&self, corpus: &[S]) -> Result<Word2VecModel>
    where
        S: AsRef<[W]>,
        W: AsRef<str>,
    {
        let executor = LocalExecutor::new(None)?;
        self.fit_with(&executor, corpus, |_| {})
    }

    /// Train on `corpus` using `executor`, calling `progress` after each iteration.
    pub fn fit_with<E, S, W, P>(
        &self,
        executor: &E,
        corpus: &[S],
        progress: P,
    ) -> Result<Word2VecModel>
    where
        E: Executor,
        S: AsRef<[W]>,
        W: AsRef<str>,
        P: FnMut(&IterationSummary),
    {
        let vocab = Vocabulary::learn(corpus, self.config.min_count)?;
        self.fit_with_vocabulary(executor, vocab, corpus, progress)
    }

    /// Like [`Word2Vec::fit_with`], but with a vocabulary prepared beforehand
    /// (for example by [`Vocabulary::read_counts`]) instead of one learned
    /// from `corpus`. Corpus words missing from `vocab` are skipped.
    pub fn fit_with_vocabulary<E, S, W, P>(
        &self,
        executor: &E,
        vocab: Vocabulary,
        corpus: &[S],
        mut progress: P,
    ) -> Result<Word2VecModel>
    where
        E: Executor,
        S: AsRef<[W]>,
        W: AsRef<str>,
        P: FnMut(&IterationSummary),
    {
        let mut training = Training::prepare(executor, &self.config, vocab, corpus)?;
        for k in 1..=self.config.num_iterations {
            let summary = training.run_iteration(executor, k)?;
            progress(&summary);
        }
        Ok(training.finish())
    }
}

/// Coordinator state between iterations.
struct Training {
    config: Word2VecConfig,
    vocab: Vocabulary,
    vocab_broadcast: Broadcast<Vocabulary>,
    sigmoid_broadcast: Broadcast<SigmoidTable>,
    sentences: Partitioned<Vec<usize>>,
    /// Word vectors, one row per word.
    syn0: ChunkedMatrix,
    /// Hierarchical softmax weights, one row per internal tree node.
    syn1: ChunkedMatrix,
}

impl Training {
    fn prepare<E, S, W>(
        executor: &E,
        config: &Word2VecConfig,
        mut vocab: Vocabulary,
        corpus: &[S],
    ) -> Result<Self>
    where
        E: Executor,
        S: AsRef<[W]>,
        W: AsRef<str>,
    {
        create_binary_tree(&mut vocab)?;
        let vocab_size = vocab.len();
        info!(
            "vocabulary size = {vocab_size}, train words = {}",
            vocab.train_words_count()
        );
        check_table_size(vocab_size, config.vector_size)?;

        let sentences = vocab.encode_sentences(corpus, config.max_sentence_length);
        info!(
            "{} sentences split into {} partitions",
            sentences.len(),
            config.num_partitions
        );
        let sentences = executor.parallelize(sentences, config.num_partitions);

        let dim = config.vector_size;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let syn0 = ChunkedMatrix::new(vocab_size, dim, || {
            (rng.gen::<real>() - 0.5) / dim as real
        })?;
        let syn1 = ChunkedMatrix::zeros(vocab_size, dim)?;
        debug!("allocated tables: {syn0:?}");

        let vocab_broadcast = executor.broadcast(vocab.clone());
        let sigmoid_broadcast = executor.broadcast(SigmoidTable::new());
        Ok(Training {
            config: config.clone(),
            vocab,
            vocab_broadcast,
            sigmoid_broadcast,
            sentences,
            syn0,
            syn1,
        })
    }

    fn run_iteration<E: Executor>(&mut self, executor: &E, k: usize) -> Result<IterationSummary> {
        let start = Instant::now();
        let starting_alpha = self.config.learning_rate / k as real;

        let syn0_broadcast = executor.broadcast(self.syn0.try_clone()?);
        let syn1_broadcast = executor.broadcast(self.syn1.try_clone()?);
        let task = PartitionTask {
            config: &self.config,
            vocab: self.vocab_broadcast.value(),
            sigmoid: self.sigmoid_broadcast.value(),
            syn0: syn0_broadcast.value(),
            syn1: syn1_broadcast.value(),
            iteration: k,
            starting_alpha,
        };
        let results = executor
            .map_partitions(&self.sentences, |idx, sentences| task.train(idx, sentences))
            .into_iter()
            .collect::<Result<Vec<PartitionResult>>>()?;

        let words_processed = results.iter().map(|r| r.words).sum::<u64>();
        let final_alpha = results
            .iter()
            .map(|r| r.final_alpha)
            .fold(starting_alpha, real::min);
        let partials = results.into_iter().map(|r| r.deltas).collect();
        let merged = executor.reduce_by_key(partials, RowDelta::combine);

        let vocab_size = self.vocab.len();
        let mut contended_rows = 0;
        for (key, row_delta) in &merged {
            if row_delta.contributions > 1 {
                contended_rows += 1;
            }
            if *key < vocab_size {
                apply_delta(&mut self.syn0, *key, &row_delta.delta)?;
            } else {
                apply_delta(&mut self.syn1, *key - vocab_size, &row_delta.delta)?;
            }
        }
        syn0_broadcast.destroy();
        syn1_broadcast.destroy();

        let summary = IterationSummary {
            iteration: k,
            starting_alpha,
            final_alpha,
            words_processed,
            rows_updated: merged.len(),
            contended_rows,
            elapsed: start.elapsed(),
        };
        info!(
            "iteration {k}/{}: alpha {} -> {}, {} words, {} rows updated ({} by several partitions) in {:.2?}",
            self.config.num_iterations,
            summary.starting_alpha,
            summary.final_alpha,
            summary.words_processed,
            summary.rows_updated,
            summary.contended_rows,
            summary.elapsed,
        );
        Ok(summary)
    }

    fn finish(self) -> Word2VecModel {
        self.vocab_broadcast.destroy();
        self.sigmoid_broadcast.destroy();
        Word2VecModel::new(self.config, self.vocab, self.syn0, self.syn1)
    }
}

fn apply_delta(table: &mut ChunkedMatrix, row: usize, delta: &[real]) -> Result<()> {
    let mut updated = table.copy_row(row)?;
    axpy(1.0, delta, &mut updated);
    table.write_row(row, &updated)
}

/// Everything one partition reads during an iteration.
struct PartitionTask<'a> {
    config: &'a Word2VecConfig,
    vocab: &'a Vocabulary,
    sigmoid: &'a SigmoidTable,
    syn0: &'a ChunkedMatrix,
    syn1: &'a ChunkedMatrix,
    iteration: usize,
    starting_alpha: real,
}

struct PartitionResult {
    /// `syn0` rows are keyed by word id, `syn1` rows by node id + vocab size.
    deltas: Vec<(usize, RowDelta)>,
    words: u64,
    final_alpha: real,
}

impl PartitionTask<'_> {
    fn train(&self, idx: usize, sentences: &[Vec<usize>]) -> Result<PartitionResult> {
        let config = self.config;
        let window = config.window;
        let vocab_size = self.vocab.len();
        let words = self.vocab.words();

        let mut rng = ChaCha8Rng::seed_from_u64(partition_seed(config.seed, idx, self.iteration));
        let mut syn0 = self.syn0.try_clone()?;
        let mut syn1 = self.syn1.try_clone()?;
        let mut syn0_modified = vec![false; vocab_size];
        let mut syn1_modified = vec![false; vocab_size];
        let mut neu1e: Vec<real> = vec![0.0; config.vector_size];

        let mut alpha = self.starting_alpha;
        let mut word_count: u64 = 0;
        let mut last_word_count: u64 = 0;
        for sentence in sentences {
            if word_count - last_word_count > ALPHA_UPDATE_INTERVAL {
                last_word_count = word_count;
                alpha = decayed_alpha(
                    config.learning_rate,
                    word_count,
                    self.vocab.train_words_count(),
                );
                debug!("partition {idx}: word count {word_count}, alpha {alpha}");
            }
            word_count += sentence.len() as u64;

            for (pos, &word) in sentence.iter().enumerate() {
                let vw = &words[word];
                let b = rng.gen_range(0..window);
                for c in context_positions(pos, b, window, sentence.len()) {
                    let last_word = sentence[c];
                    neu1e.fill(0.0);
                    let l1 = syn0.row(last_word)?;
                    // Walk the tree path of the center word.
                    for d in 0..vw.code_len() {
                        let inner = vw.path[d] as usize;
                        let l2 = syn1.row_mut(inner)?;
                        // Saturated outputs contribute no gradient.
                        let Some(f) = self.sigmoid.get(dot(l1, l2)) else {
                            continue;
                        };
                        // 'g' is the gradient multiplied by the learning rate
                        let g = (1.0 - vw.code[d] as real - f) * alpha;
                        // Propagate errors output -> hidden
                        axpy(g, l2, &mut neu1e);
                        // Learn weights hidden -> output
                        axpy(g, l1, l2);
                        syn1_modified[inner] = true;
                    }
                    // Learn weights input -> hidden
                    axpy(1.0, &neu1e, syn0.row_mut(last_word)?);
                    syn0_modified[last_word] = true;
                }
            }
        }

        let mut deltas = vec![];
        for (row, _) in syn0_modified.iter().enumerate().filter(|&(_, &m)| m) {
            deltas.push((row, RowDelta::between(self.syn0.row(row)?, syn0.row(row)?)));
        }
        for (row, _) in syn1_modified.iter().enumerate().filter(|&(_, &m)| m) {
            deltas.push((
                row + vocab_size,
                RowDelta::between(self.syn1.row(row)?, syn1.row(row)?),
            ));
        }
        debug!(
            "partition {idx}: {} sentences, {word_count} words, {} modified rows",
            sentences.len(),
            deltas.len()
        );
        Ok(PartitionResult {
            deltas,
            words: word_count,
            final_alpha: alpha,
        })
    }
}
