//! End-to-end training runs through the public API.

use skipgram::word2vec::check_table_size;
use skipgram::{Error, LocalExecutor, Word2Vec, Word2VecConfig};

fn tokenize(lines: &[&str]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|l| l.split_whitespace().map(str::to_string).collect())
        .collect()
}

fn small_config() -> Word2VecConfig {
    Word2VecConfig {
        vector_size: 4,
        learning_rate: 0.025,
        num_partitions: 1,
        num_iterations: 1,
        min_count: 1,
        window: 1,
        seed: 2024,
        max_sentence_length: 1000,
    }
}

/// A corpus big enough to cross several learning-rate updates.
fn larger_corpus() -> Vec<Vec<String>> {
    let templates = [
        "the king rules the kingdom with the queen",
        "the queen rules the kingdom with the king",
        "a cat chases a mouse around the house",
        "a dog chases a cat around the yard",
        "the mouse hides from the cat in the house",
        "the dog sleeps in the yard all day",
    ];
    let mut lines = vec![];
    for i in 0..3000 {
        lines.push(templates[i % templates.len()]);
    }
    tokenize(&lines)
}

#[test]
fn cat_sat_dog_sat() {
    let corpus = tokenize(&["the cat sat", "the dog sat"]);
    let model = Word2Vec::new(small_config()).unwrap().fit(&corpus).unwrap();

    let vocab = model.vocabulary();
    assert_eq!(vocab.len(), 4);
    for word in ["the", "cat", "sat", "dog"] {
        let id = vocab.lookup(word).unwrap();
        assert!(vocab.get(id).unwrap().count >= 1);
    }
    assert_eq!(vocab.get(vocab.lookup("the").unwrap()).unwrap().count, 2);
    assert_eq!(vocab.get(vocab.lookup("sat").unwrap()).unwrap().count, 2);
    assert_eq!(vocab.train_words_count(), 6);

    assert_eq!(model.embeddings().rows(), 4);
    assert_eq!(model.embeddings().columns(), 4);
    let vectors = model.word_vectors();
    assert_eq!(vectors.len(), 4);
    for (word, vector) in &vectors {
        assert_eq!(vector.len(), 4, "vector for {word}");
        assert!(vector.iter().all(|v| v.is_finite()), "vector for {word}: {vector:?}");
    }
}

#[test]
fn everything_below_min_count() {
    let corpus = tokenize(&["the cat sat", "the dog sat"]);
    let config = Word2VecConfig {
        min_count: 3,
        ..small_config()
    };
    let err = Word2Vec::new(config).unwrap().fit(&corpus).unwrap_err();
    assert!(matches!(err, Error::EmptyVocabulary { min_count: 3 }));
}

#[test]
fn oversized_table_rejected() {
    let err = check_table_size(10_000_000, 1000).unwrap_err();
    assert!(matches!(err, Error::EmbeddingTableTooLarge { .. }));
    let message = err.to_string();
    assert!(message.contains("min_count"), "{message}");
}

#[test]
fn oversized_table_rejected_before_allocation() {
    // 4 words × 2^30 floats would need 16 GiB per table.
    let corpus = tokenize(&["a b c d"]);
    let config = Word2VecConfig {
        vector_size: 1 << 30,
        ..small_config()
    };
    let err = Word2Vec::new(config).unwrap().fit(&corpus).unwrap_err();
    assert!(
        matches!(
            err,
            Error::EmbeddingTableTooLarge {
                vocab_size: 4,
                vector_size: 1_073_741_824,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn bad_config_rejected_up_front() {
    let config = Word2VecConfig {
        num_partitions: 0,
        ..small_config()
    };
    assert!(matches!(Word2Vec::new(config), Err(Error::Configuration(_))));
}

#[test]
fn same_seed_same_vectors() {
    let corpus = larger_corpus();
    let config = Word2VecConfig {
        vector_size: 16,
        num_partitions: 3,
        num_iterations: 2,
        window: 3,
        ..small_config()
    };
    let w2v = Word2Vec::new(config).unwrap();
    let one = LocalExecutor::new(Some(1)).unwrap();
    let four = LocalExecutor::new(Some(4)).unwrap();

    let a = w2v.fit_with(&one, &corpus, |_| {}).unwrap().word_vectors();
    let b = w2v.fit_with(&four, &corpus, |_| {}).unwrap().word_vectors();
    assert_eq!(a, b);

    let other_seed = Word2Vec::new(Word2VecConfig {
        seed: 7,
        ..w2v.config().clone()
    })
    .unwrap();
    let c = other_seed.fit_with(&one, &corpus, |_| {}).unwrap().word_vectors();
    assert_ne!(a, c);
}

#[test]
fn iterations_report_progress() {
    let corpus = larger_corpus();
    let config = Word2VecConfig {
        vector_size: 10,
        num_partitions: 2,
        num_iterations: 3,
        window: 2,
        ..small_config()
    };
    let exec = LocalExecutor::new(Some(2)).unwrap();
    let mut summaries = vec![];
    let model = Word2Vec::new(config.clone())
        .unwrap()
        .fit_with(&exec, &corpus, |s| summaries.push(s.clone()))
        .unwrap();

    assert_eq!(summaries.len(), 3);
    let total_words = model.vocabulary().train_words_count();
    for (i, s) in summaries.iter().enumerate() {
        assert_eq!(s.iteration, i + 1);
        assert_eq!(s.starting_alpha, config.learning_rate / (i + 1) as f32);
        assert_eq!(s.words_processed, total_words);
        assert!(s.rows_updated > 0);
        assert!(s.contended_rows > 0);
        assert!(s.final_alpha > 0.0 && s.final_alpha <= config.learning_rate);
    }
    // Over 10k words per partition, so the rate was recomputed and decayed.
    assert!(summaries[0].final_alpha < config.learning_rate);

    for (_, vector) in model.word_vectors() {
        assert!(vector.iter().all(|v| v.is_finite()));
    }
    // tree weights were trained too
    assert!(model.weights().iter_rows().any(|row| row.iter().any(|&v| v != 0.0)));
}

#[test]
fn long_sentences_are_split() {
    let line = vec!["a b c d e f g h"; 50].join(" ");
    let corpus = tokenize(&[line.as_str()]);
    let config = Word2VecConfig {
        max_sentence_length: 7,
        num_partitions: 4,
        ..small_config()
    };
    let exec = LocalExecutor::new(Some(2)).unwrap();
    let mut words = 0;
    Word2Vec::new(config)
        .unwrap()
        .fit_with(&exec, &corpus, |s| words = s.words_processed)
        .unwrap();
    assert_eq!(words, 400);
}
