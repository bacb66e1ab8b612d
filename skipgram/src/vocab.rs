use std::cmp::Reverse;
use std::collections::HashMap;
use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabWord {
    pub word: String,
    pub count: u64,
    /// Huffman code, root first. `code[d]` is the branch taken at `path[d]`.
    pub code: Vec<u8>,
    /// Internal tree nodes from the root down; each is a row of `syn1`.
    pub path: Vec<u32>,
}

impl VocabWord {
    fn new(word: String, count: u64) -> Self {
        VocabWord {
            word,
            count,
            code: Vec::new(),
            path: Vec::new(),
        }
    }

    pub fn code_len(&self) -> usize {
        self.code.len()
    }
}

/// Words sorted by descending count. A word's id is its position.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<VocabWord>,
    index: HashMap<String, usize>,
    train_words_count: u64,
}

impl Vocabulary {
    /// Count every token of the corpus and keep the ones occurring at least
    /// `min_count` times.
    pub fn learn<S, W>(sentences: &[S], min_count: u64) -> Result<Self>
    where
        S: AsRef<[W]>,
        W: AsRef<str>,
    {
        let mut words: Vec<VocabWord> = Vec::new();
        let mut hash: HashMap<String, usize> = HashMap::new();
        for sentence in sentences {
            for word in sentence.as_ref() {
                let word = word.as_ref();
                if let Some(&a) = hash.get(word) {
                    words[a].count += 1;
                } else {
                    hash.insert(word.to_string(), words.len());
                    words.push(VocabWord::new(word.to_string(), 1));
                }
            }
        }
        Vocabulary::from_words(words, min_count)
    }

    /// Build a vocabulary from precomputed counts. Duplicate words are summed.
    pub fn from_counts<I, W>(counts: I, min_count: u64) -> Result<Self>
    where
        I: IntoIterator<Item = (W, u64)>,
        W: Into<String>,
    {
        let mut words: Vec<VocabWord> = Vec::new();
        let mut hash: HashMap<String, usize> = HashMap::new();
        for (word, count) in counts {
            let word = word.into();
            if let Some(&a) = hash.get(&word) {
                words[a].count += count;
            } else {
                hash.insert(word.clone(), words.len());
                words.push(VocabWord::new(word, count));
            }
        }
        Vocabulary::from_words(words, min_count)
    }

    fn from_words(mut words: Vec<VocabWord>, min_count: u64) -> Result<Self> {
        // Words occurring less than min_count times are discarded.
        words.retain(|vw| vw.count >= min_count);
        if words.is_empty() {
            return Err(Error::EmptyVocabulary { min_count });
        }
        // Stable, so ties keep first-encounter order.
        words.sort_by_key(|vw| Reverse(vw.count));

        let index = words
            .iter()
            .enumerate()
            .map(|(i, vw)| (vw.word.clone(), i))
            .collect();
        let train_words_count = words.iter().map(|vw| vw.count).sum();
        Ok(Vocabulary {
            words,
            index,
            train_words_count,
        })
    }

    /// Read `word count` lines, as written by [`Vocabulary::write_counts`].
    pub fn read_counts<R: BufRead>(reader: R, min_count: u64) -> Result<Self> {
        let mut counts = vec![];
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let fields = line.split_whitespace().collect::<Vec<&str>>();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 2 {
                return Err(Error::VocabularyFormat {
                    line: line_num + 1,
                    message: format!("expected 2 fields, found {}", fields.len()),
                });
            }
            let count = fields[1]
                .parse::<u64>()
                .map_err(|err| Error::VocabularyFormat {
                    line: line_num + 1,
                    message: format!("unrecognized frequency {:?}: {err}", fields[1]),
                })?;
            counts.push((fields[0].to_string(), count));
        }
        Vocabulary::from_counts(counts, min_count)
    }

    pub fn write_counts<W: Write>(&self, mut out: W) -> Result<()> {
        for vw in &self.words {
            writeln!(out, "{} {}", vw.word, vw.count)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Sum of the counts of all words in the vocabulary.
    pub fn train_words_count(&self) -> u64 {
        self.train_words_count
    }

    /// Returns the id of `word`, if it is in the vocabulary.
    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn get(&self, id: usize) -> Option<&VocabWord> {
        self.words.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VocabWord> {
        self.words.iter()
    }

    pub fn words(&self) -> &[VocabWord] {
        &self.words
    }

    pub(crate) fn words_mut(&mut self) -> &mut [VocabWord] {
        &mut self.words
    }

    /// Map each sentence to word ids, dropping unknown words, and split it
    /// into pieces of at most `max_sentence_length` ids.
    pub fn encode_sentences<S, W>(
        &self,
        sentences: &[S],
        max_sentence_length: usize,
    ) -> Vec<Vec<usize>>
    where
        S: AsRef<[W]>,
        W: AsRef<str>,
    {
        let mut out = vec![];
        for sentence in sentences {
            let ids: Vec<usize> = sentence
                .as_ref()
                .iter()
                .filter_map(|w| self.lookup(w.as_ref()))
                .collect();
            out.extend(ids.chunks(max_sentence_length.max(1)).map(|chunk| chunk.to_vec()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<&'static str>> {
        vec![
            "a b c d a b a e".split(' ').collect(),
            "e e b a f".split(' ').collect(),
        ]
    }

    #[test]
    fn counts_filter_and_order() {
        let vocab = Vocabulary::learn(&corpus(), 2).unwrap();
        let words: Vec<(&str, u64)> = vocab.iter().map(|vw| (vw.word.as_str(), vw.count)).collect();
        // b and e both occur 3 times; b was seen first.
        assert_eq!(words, vec![("a", 4), ("b", 3), ("e", 3)]);
        assert_eq!(vocab.train_words_count(), 10);
        assert_eq!(vocab.lookup("e"), Some(2));
        assert_eq!(vocab.lookup("c"), None);
    }

    #[test]
    fn every_word_meets_min_count() {
        for min_count in 0..6 {
            match Vocabulary::learn(&corpus(), min_count) {
                Ok(vocab) => {
                    assert!(vocab.iter().all(|vw| vw.count >= min_count));
                    let total: u64 = vocab.iter().map(|vw| vw.count).sum();
                    assert_eq!(total, vocab.train_words_count());
                    for (i, vw) in vocab.iter().enumerate() {
                        assert_eq!(vocab.lookup(&vw.word), Some(i));
                    }
                }
                Err(Error::EmptyVocabulary { .. }) => assert_eq!(min_count, 5),
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    }

    #[test]
    fn empty_vocabulary() {
        let err = Vocabulary::learn(&corpus(), 100).unwrap_err();
        assert!(matches!(err, Error::EmptyVocabulary { min_count: 100 }));
        let none: Vec<Vec<String>> = vec![];
        assert!(Vocabulary::learn(&none, 0).is_err());
    }

    #[test]
    fn counts_file_round_trip() {
        let vocab = Vocabulary::learn(&corpus(), 1).unwrap();
        let mut buf = vec![];
        vocab.write_counts(&mut buf).unwrap();
        assert!(String::from_utf8_lossy(&buf).starts_with("a 4\nb 3\ne 3\n"));

        let reread = Vocabulary::read_counts(&buf[..], 1).unwrap();
        assert_eq!(reread.words(), vocab.words());
        assert_eq!(reread.train_words_count(), vocab.train_words_count());
    }

    #[test]
    fn bad_counts_file() {
        let err = Vocabulary::read_counts(&b"a 4\nb three\n"[..], 1).unwrap_err();
        assert!(matches!(err, Error::VocabularyFormat { line: 2, .. }));
        let err = Vocabulary::read_counts(&b"a 4 5\n"[..], 1).unwrap_err();
        assert!(matches!(err, Error::VocabularyFormat { line: 1, .. }));
    }

    #[test]
    fn encode_drops_unknown_and_splits() {
        let vocab = Vocabulary::learn(&corpus(), 2).unwrap();
        let encoded = vocab.encode_sentences(&corpus(), 3);
        // sentence 1 -> a b a b a e, sentence 2 -> e e b a
        assert_eq!(
            encoded,
            vec![vec![0, 1, 0], vec![1, 0, 2], vec![2, 2, 1], vec![0]]
        );
        let only_unknown = vec![vec!["zzz"]];
        assert!(vocab.encode_sentences(&only_unknown, 3).is_empty());
    }
}
