use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use skipgram::{real, LocalExecutor, Vocabulary, Word2Vec, Word2VecConfig};

const MAX_STRING: usize = 100;

#[derive(Parser)]
#[command(about = "Train skip-gram word vectors with hierarchical softmax", long_about = None)]
struct Options {
    /// Use text data from FILE to train the model
    #[arg(long = "train", value_name = "FILE")]
    train_file: PathBuf,

    /// Use FILE to save the resulting word vectors
    #[arg(long = "output", value_name = "FILE")]
    output_file: PathBuf,

    /// Set size of word vectors
    #[arg(long = "size", default_value_t = 100)]
    vector_size: usize,

    /// Set max skip length between words
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Set the starting learning rate
    #[arg(long, default_value_t = 0.025)]
    alpha: real,

    /// Split the training sentences into N partitions
    #[arg(long = "partitions", value_name = "N", default_value_t = 1)]
    num_partitions: usize,

    /// Run more training iterations
    #[arg(long, default_value_t = 1)]
    iter: usize,

    /// Discard words that appear less than N times
    #[arg(long = "min-count", value_name = "N", default_value_t = 5)]
    min_count: u64,

    /// Seed for the random number generators
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Split sentences longer than N words
    #[arg(long = "max-sentence-length", value_name = "N", default_value_t = 1000)]
    max_sentence_length: usize,

    /// Use N threads (default: one per core)
    #[arg(long = "threads", value_name = "N")]
    num_threads: Option<usize>,

    /// Save the resulting vectors in binary mode
    #[arg(long, group = "format")]
    binary: bool,

    /// Save the model in bincode format
    #[arg(long, group = "format")]
    bincode: bool,

    /// The vocabulary will be saved to FILE
    #[arg(long = "save-vocab", value_name = "FILE")]
    save_vocab_file: Option<PathBuf>,

    /// The vocabulary will be read from FILE, not constructed from the training data
    #[arg(long = "read-vocab", value_name = "FILE")]
    read_vocab_file: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Options {
    fn config(&self) -> Word2VecConfig {
        Word2VecConfig {
            vector_size: self.vector_size,
            learning_rate: self.alpha,
            num_partitions: self.num_partitions,
            num_iterations: self.iter,
            min_count: self.min_count,
            window: self.window,
            seed: self.seed,
            max_sentence_length: self.max_sentence_length,
        }
    }
}

/// Read sentences from a file, one per line, assuming space + tab to be word
/// boundaries.
fn read_sentences(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut fin = BufReader::new(File::open(path).context("error opening training data file")?);
    let mut sentences = vec![];
    let mut line = Vec::<u8>::new();
    loop {
        line.clear();
        let n = fin
            .read_until(b'\n', &mut line)
            .context("error reading training data file")?;
        if n == 0 {
            break;
        }
        let sentence: Vec<String> = line
            .split(|&ch| ch == b' ' || ch == b'\t' || ch == b'\n' || ch == b'\r')
            .filter(|word| !word.is_empty())
            .map(|word| {
                // Truncate too long words
                let word = &word[..word.len().min(MAX_STRING - 1)];
                String::from_utf8_lossy(word).to_string()
            })
            .collect();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
    }
    Ok(sentences)
}

fn train(options: &Options) -> Result<()> {
    let word2vec = Word2Vec::new(options.config()).context("invalid training parameters")?;
    let executor =
        LocalExecutor::new(options.num_threads).context("error starting worker threads")?;

    info!(
        "Starting training using file {} on {} threads",
        options.train_file.display(),
        executor.num_threads()
    );
    let sentences = read_sentences(&options.train_file)?;
    let vocab = match &options.read_vocab_file {
        Some(f) => {
            let fin = BufReader::new(File::open(f).context("error opening vocabulary file")?);
            let vocab = Vocabulary::read_counts(fin, options.min_count)
                .context("error reading vocabulary file")?;
            info!("read {} words from {}", vocab.len(), f.display());
            vocab
        }
        None => Vocabulary::learn(&sentences, options.min_count)?,
    };

    let progress = ProgressBar::new(options.iter as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} iterations  {msg}")
            .context("bad progress bar template")?,
    );
    let model = word2vec
        .fit_with_vocabulary(&executor, vocab, &sentences, |summary| {
            progress.set_message(format!(
                "alpha: {:.6}  words: {}",
                summary.final_alpha, summary.words_processed
            ));
            progress.inc(1);
        })
        .context("training failed")?;
    progress.finish();

    if let Some(f) = &options.save_vocab_file {
        let fo = BufWriter::new(File::create(f).context("error creating vocab file for write")?);
        model
            .vocabulary()
            .write_counts(fo)
            .context("error writing vocab file")?;
    }

    let fo = BufWriter::new(
        File::create(&options.output_file).context("error creating output file")?,
    );
    if options.bincode {
        bincode::serialize_into(fo, &model.to_dump()).context("error writing output file")?;
    } else {
        model
            .write_word2vec(fo, options.binary)
            .context("error writing output file")?;
    }
    info!(
        "wrote {} vectors to {}",
        model.len(),
        options.output_file.display()
    );
    Ok(())
}

fn main() {
    let options = Options::parse();

    let default_filter = if options.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(err) = train(&options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
