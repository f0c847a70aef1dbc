use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::Rng;

/// Number of slots in the negative-sampling table.
pub const UNIGRAM_TABLE_SIZE: usize = 10_000_000;

/// Smoothing exponent for the sampling distribution ('normal' value would
/// be 1.0; this is the standard word2vec tweak).
const UNIGRAM_POWER: f64 = 0.75;

/// A vocabulary term with its corpus count and its position in the binary
/// coding tree.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VocabWord {
    pub word: String,
    pub count: u64,
    /// Branch bits along this word's path, left 0 and right 1.
    pub code: Vec<u8>,
    /// Internal-node indices from the root down to this word's parent.
    pub parents: Vec<u32>,
}

/// Term store: insertion-ordered words plus a name index.
///
/// Word indices are dense in `0..len` and are reassigned by [`reduce`].
/// Tokenized sentences carry `Option<usize>`; `None` marks an
/// out-of-vocabulary token.
///
/// [`reduce`]: Vocabulary::reduce
#[derive(Debug, Default)]
pub struct Vocabulary {
    words: Vec<VocabWord>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Vocabulary::default()
    }

    /// Rebuild from stored terms, e.g. after loading a model from disk.
    pub fn from_words(words: Vec<VocabWord>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.word.clone(), i))
            .collect();
        Vocabulary { words, index }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn word(&self, index: usize) -> &VocabWord {
        &self.words[index]
    }

    pub fn words(&self) -> &[VocabWord] {
        &self.words
    }

    /// Count an occurrence, inserting the word with the next free index on
    /// first sight.
    pub fn add_word(&mut self, word: &str) {
        if let Some(&i) = self.index.get(word) {
            self.words[i].count += 1;
        } else {
            self.index.insert(word.to_string(), self.words.len());
            self.words.push(VocabWord {
                word: word.to_string(),
                count: 1,
                code: Vec::new(),
                parents: Vec::new(),
            });
        }
    }

    /// Drop terms seen fewer than `min_count` times and reassign dense
    /// indices.
    pub fn reduce(&mut self, min_count: u64) {
        self.words.retain(|w| w.count >= min_count);
        self.index.clear();
        for (i, w) in self.words.iter().enumerate() {
            self.index.insert(w.word.clone(), i);
        }
    }

    /// Total token count across the vocabulary.
    pub fn word_count(&self) -> u64 {
        self.words.iter().map(|w| w.count).sum()
    }

    /// Word indices ordered by count descending, ties alphabetically.
    pub fn sorted(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..self.words.len()).collect();
        ids.sort_by(|&a, &b| {
            let (wa, wb) = (&self.words[a], &self.words[b]);
            wb.count.cmp(&wa.count).then_with(|| wa.word.cmp(&wb.word))
        });
        ids
    }

    /// Map a whitespace-separated line to word indices; `None` marks OOV.
    pub fn tokenize(&self, line: &str) -> Vec<Option<usize>> {
        line.split_ascii_whitespace().map(|w| self.lookup(w)).collect()
    }

    /// Build the Huffman tree over term counts and record each word's code
    /// and parent path.
    ///
    /// The working list starts with the leaves sorted by count descending
    /// (ties keep insertion order); the two smallest nodes are repeatedly
    /// merged and the parent is inserted back at its descending-order
    /// position. Internal nodes are numbered `0..len-1` in construction
    /// order, so the root is always the last one.
    pub fn build_huffman_tree(&mut self) {
        #[derive(Clone, Copy)]
        enum Node {
            Leaf(usize),
            Internal(usize),
        }
        struct Internal {
            left: Node,
            right: Node,
        }

        if self.words.is_empty() {
            return;
        }

        let mut list: Vec<(u64, Node)> = (0..self.words.len())
            .map(|i| (self.words[i].count, Node::Leaf(i)))
            .collect();
        list.sort_by(|a, b| b.0.cmp(&a.0)); // stable: equal counts keep insertion order

        let mut internals: Vec<Internal> = Vec::with_capacity(self.words.len().saturating_sub(1));
        while list.len() > 1 {
            let (left_count, left) = list.pop().expect("list has two nodes");
            let (right_count, right) = list.pop().expect("list has two nodes");
            let count = left_count + right_count;
            internals.push(Internal { left, right });
            let node = (count, Node::Internal(internals.len() - 1));
            let pos = list.partition_point(|&(c, _)| c > count);
            list.insert(pos, node);
        }

        // Depth-first code assignment: left contributes bit 0, right bit 1.
        let (_, root) = list[0];
        let mut stack = vec![(root, Vec::new(), Vec::new())];
        while let Some((node, code, parents)) = stack.pop() {
            match node {
                Node::Leaf(w) => {
                    self.words[w].code = code;
                    self.words[w].parents = parents;
                }
                Node::Internal(i) => {
                    let mut parents = parents;
                    parents.push(i as u32);
                    let mut code_left = code.clone();
                    code_left.push(0);
                    let mut code_right = code;
                    code_right.push(1);
                    stack.push((internals[i].left, code_left, parents.clone()));
                    stack.push((internals[i].right, code_right, parents));
                }
            }
        }
    }

    /// Flat sampling table: term `i` fills `floor(count_i^0.75 / Z * SIZE)`
    /// slots.
    pub fn build_unigram_table(&self) -> Vec<u32> {
        let z: f64 = self
            .words
            .iter()
            .map(|w| (w.count as f64).powf(UNIGRAM_POWER))
            .sum();

        let mut table = Vec::with_capacity(UNIGRAM_TABLE_SIZE);
        for (i, w) in self.words.iter().enumerate() {
            let f = (w.count as f64).powf(UNIGRAM_POWER) / z;
            let slots = (f * UNIGRAM_TABLE_SIZE as f64) as usize;
            for _ in 0..slots {
                table.push(i as u32);
            }
        }
        table
    }
}

/// O(1) draw from the unigram distribution.
pub fn sample_unigram(table: &[u32], rng: &mut Rng) -> usize {
    table[rng.rand_range(table.len())] as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab_with_counts(counts: &[(&str, u64)]) -> Vocabulary {
        let mut vocab = Vocabulary::new();
        for &(word, count) in counts {
            for _ in 0..count {
                vocab.add_word(word);
            }
        }
        vocab
    }

    #[test]
    fn add_and_reduce_reassign_dense_indices() {
        let mut vocab = vocab_with_counts(&[("a", 3), ("b", 1), ("c", 2)]);
        assert_eq!(vocab.len(), 3);
        vocab.reduce(2);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.lookup("a"), Some(0));
        assert_eq!(vocab.lookup("c"), Some(1));
        assert_eq!(vocab.lookup("b"), None);
    }

    #[test]
    fn code_and_parent_lengths_match() {
        let mut vocab = vocab_with_counts(&[("w1", 5), ("w2", 3), ("w3", 3), ("w4", 1)]);
        vocab.build_huffman_tree();
        let root = (vocab.len() - 2) as u32;
        for w in vocab.words() {
            assert_eq!(w.code.len(), w.parents.len(), "word {}", w.word);
            assert_eq!(w.parents[0], root, "paths start at the root");
        }
    }

    #[test]
    fn huffman_is_stable_and_depth_ordered() {
        let build = || {
            let mut vocab = vocab_with_counts(&[("w1", 5), ("w2", 3), ("w3", 3), ("w4", 1)]);
            vocab.build_huffman_tree();
            vocab
                .words()
                .iter()
                .map(|w| (w.word.clone(), w.code.clone()))
                .collect::<Vec<_>>()
        };
        let first = build();
        assert_eq!(first, build(), "same counts must give identical codes");

        let code_len = |word: &str| first.iter().find(|(w, _)| w == word).unwrap().1.len();
        for other in ["w2", "w3", "w4"] {
            assert!(code_len("w1") <= code_len(other));
        }
        for other in ["w1", "w2", "w3"] {
            assert!(code_len("w4") >= code_len(other));
        }
    }

    #[test]
    fn codes_are_prefix_free() {
        let mut vocab =
            vocab_with_counts(&[("a", 9), ("b", 7), ("c", 4), ("d", 4), ("e", 2), ("f", 1)]);
        vocab.build_huffman_tree();
        let codes: Vec<&Vec<u8>> = vocab.words().iter().map(|w| &w.code).collect();
        for (i, a) in codes.iter().enumerate() {
            for (j, b) in codes.iter().enumerate() {
                if i != j {
                    assert!(!b.starts_with(a), "code {a:?} is a prefix of {b:?}");
                }
            }
        }
    }

    #[test]
    fn unigram_table_matches_smoothed_frequencies() {
        let vocab = vocab_with_counts(&[("a", 100), ("b", 10), ("c", 1)]);
        let table = vocab.build_unigram_table();
        let z: f64 = vocab
            .words()
            .iter()
            .map(|w| (w.count as f64).powf(0.75))
            .sum();
        for (i, w) in vocab.words().iter().enumerate() {
            let expected = (w.count as f64).powf(0.75) / z;
            let actual =
                table.iter().filter(|&&t| t as usize == i).count() as f64 / table.len() as f64;
            assert!(
                (actual - expected).abs() <= 1.0 / UNIGRAM_TABLE_SIZE as f64 + 1e-6,
                "term {} frequency {} vs expected {}",
                w.word,
                actual,
                expected
            );
        }
    }

    #[test]
    fn sorted_orders_by_count_then_word() {
        let vocab = vocab_with_counts(&[("b", 2), ("c", 5), ("a", 2)]);
        let order: Vec<&str> = vocab
            .sorted()
            .into_iter()
            .map(|i| vocab.word(i).word.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
