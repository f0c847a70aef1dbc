use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::config::Policy;
use crate::error::{ModelError, Result};
use crate::math;
use crate::monolingual::MonolingualModel;
use crate::real;

/// POS weights under the universal tagset (Petrov, Das & McDonald).
pub(crate) fn syntax_weight(tag: &str) -> Option<real> {
    Some(match tag {
        "VERB" => 0.75,
        "NOUN" => 1.00,
        "PRON" => 0.10,
        "ADJ" => 0.75,
        "ADV" => 0.50,
        "ADP" => 0.10,
        "CONJ" => 0.10,
        "DET" => 0.10,
        "NUM" => 0.50,
        "PRT" => 0.10,
        "X" => 0.50,
        "." => 0.05,
        _ => return None,
    })
}

/// Keep the `n` best pairs, similarity descending.
pub(crate) fn take_best(mut results: Vec<(String, real)>, n: usize) -> Vec<(String, real)> {
    let n = n.min(results.len());
    if n < results.len() {
        results.select_nth_unstable_by_key(n, |(_, sim)| Reverse(OrderedFloat(*sim)));
        results.truncate(n);
    }
    results.sort_unstable_by_key(|(_, sim)| Reverse(OrderedFloat(*sim)));
    results
}

impl MonolingualModel {
    pub(crate) fn check_policy(&self, policy: Policy) -> Result<()> {
        if policy != Policy::Input && self.config.negative == 0 {
            return Err(ModelError::InvalidInput(format!(
                "policy {policy:?} reads output weights, which need negative sampling"
            )));
        }
        Ok(())
    }

    /// Vector width under the given policy.
    pub(crate) fn policy_width(&self, policy: Policy) -> usize {
        match policy {
            Policy::Concat => 2 * self.config.dimension,
            _ => self.config.dimension,
        }
    }

    pub(crate) fn word_vec_index(&self, index: usize, policy: Policy) -> Vec<real> {
        match policy {
            Policy::Input => self.input_weights.row_to_vec(index),
            Policy::Concat => {
                let mut v = self.input_weights.row_to_vec(index);
                v.extend(self.output_weights.row_to_vec(index));
                v
            }
            Policy::Sum => {
                let mut v = self.input_weights.row_to_vec(index);
                for (x, y) in v.iter_mut().zip(self.output_weights.row_to_vec(index)) {
                    *x += y;
                }
                v
            }
            Policy::Output => self.output_weights.row_to_vec(index),
        }
    }

    /// Weight vector for `word` under `policy`.
    pub fn word_vec(&self, word: &str, policy: Policy) -> Result<Vec<real>> {
        self.check_policy(policy)?;
        let index = self
            .vocab
            .lookup(word)
            .ok_or_else(|| ModelError::Oov(word.to_string()))?;
        Ok(self.word_vec_index(index, policy))
    }

    /// Cosine similarity between two words; 0 if either is unknown, 1 if
    /// they resolve to the same term.
    pub fn similarity(&self, word1: &str, word2: &str, policy: Policy) -> Result<real> {
        self.check_policy(policy)?;
        match (self.vocab.lookup(word1), self.vocab.lookup(word2)) {
            (Some(i1), Some(i2)) if i1 == i2 => Ok(1.0),
            (Some(i1), Some(i2)) => Ok(math::cosine_similarity(
                &self.word_vec_index(i1, policy),
                &self.word_vec_index(i2, policy),
            )),
            _ => Ok(0.0),
        }
    }

    /// Half cosine distance, in [0, 1].
    pub fn distance(&self, word1: &str, word2: &str, policy: Policy) -> Result<real> {
        Ok((1.0 - self.similarity(word1, word2, policy)?) / 2.0)
    }

    /// The `n` terms closest to `word`, similarity descending. `word`
    /// itself is excluded.
    pub fn closest(&self, word: &str, n: usize, policy: Policy) -> Result<Vec<(String, real)>> {
        self.check_policy(policy)?;
        let index = self
            .vocab
            .lookup(word)
            .ok_or_else(|| ModelError::Oov(word.to_string()))?;
        let v = self.word_vec_index(index, policy);

        let results = self
            .vocab
            .words()
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != index)
            .map(|(i, w)| {
                let sim = math::cosine_similarity(&v, &self.word_vec_index(i, policy));
                (w.word.clone(), sim)
            })
            .collect();
        Ok(take_best(results, n))
    }

    /// The `n` terms closest to an arbitrary vector.
    pub fn closest_to_vec(&self, v: &[real], n: usize, policy: Policy) -> Result<Vec<(String, real)>> {
        self.check_policy(policy)?;
        if v.len() != self.policy_width(policy) {
            return Err(ModelError::ShapeMismatch {
                left: v.len(),
                right: self.policy_width(policy),
            });
        }
        let results = self
            .vocab
            .words()
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let sim = math::cosine_similarity(v, &self.word_vec_index(i, policy));
                (w.word.clone(), sim)
            })
            .collect();
        Ok(take_best(results, n))
    }

    /// Sort the known terms of `candidates` by similarity to `word`.
    pub fn closest_among(
        &self,
        word: &str,
        candidates: &[String],
        policy: Policy,
    ) -> Result<Vec<(String, real)>> {
        self.check_policy(policy)?;
        let index = self
            .vocab
            .lookup(word)
            .ok_or_else(|| ModelError::Oov(word.to_string()))?;
        let v = self.word_vec_index(index, policy);

        let mut results: Vec<(String, real)> = candidates
            .iter()
            .filter_map(|c| {
                let i = self.vocab.lookup(c)?;
                let sim = math::cosine_similarity(&v, &self.word_vec_index(i, policy));
                Some((self.vocab.word(i).word.clone(), sim))
            })
            .collect();
        results.sort_unstable_by_key(|(_, sim)| Reverse(OrderedFloat(*sim)));
        Ok(results)
    }

    /// Average the positional similarities of two equal-length sequences.
    /// Pairs with an unknown side are skipped; when nothing contributes the
    /// result is an error.
    pub fn similarity_ngrams(&self, seq1: &str, seq2: &str, policy: Policy) -> Result<real> {
        self.check_policy(policy)?;
        let words1: Vec<&str> = seq1.split_ascii_whitespace().collect();
        let words2: Vec<&str> = seq2.split_ascii_whitespace().collect();
        if words1.len() != words2.len() {
            return Err(ModelError::ShapeMismatch {
                left: words1.len(),
                right: words2.len(),
            });
        }

        let mut total = 0.0;
        let mut n = 0;
        for (w1, w2) in words1.iter().zip(&words2) {
            if self.vocab.lookup(w1).is_some() && self.vocab.lookup(w2).is_some() {
                total += self.similarity(w1, w2, policy)?;
                n += 1;
            }
        }

        if n == 0 {
            Err(ModelError::AllOov)
        } else {
            Ok(total / n as real)
        }
    }

    /// Cosine of the two bag-of-words sums. Unknown terms are skipped;
    /// returns 0 when either side has no mass.
    pub fn similarity_sentence(&self, seq1: &str, seq2: &str, policy: Policy) -> Result<real> {
        self.check_policy(policy)?;
        let v1 = self.sentence_sum(seq1, policy);
        let v2 = self.sentence_sum(seq2, policy);
        Ok(math::cosine_similarity(&v1, &v2))
    }

    pub(crate) fn sentence_sum(&self, seq: &str, policy: Policy) -> Vec<real> {
        let mut sum = vec![0.0; self.policy_width(policy)];
        for word in seq.split_ascii_whitespace() {
            if let Some(i) = self.vocab.lookup(word) {
                for (s, x) in sum.iter_mut().zip(self.word_vec_index(i, policy)) {
                    *s += x;
                }
            }
        }
        sum
    }

    /// Sentence similarity where each term is weighted by its POS tag and
    /// inverse document frequency: `pos^(1-alpha) * idf^alpha`. Terms with
    /// an unknown word or tag are skipped. Returns 0 when either side has
    /// no mass.
    #[allow(clippy::too_many_arguments)]
    pub fn similarity_sentence_syntax(
        &self,
        seq1: &str,
        seq2: &str,
        tags1: &str,
        tags2: &str,
        idf1: &[real],
        idf2: &[real],
        alpha: real,
        policy: Policy,
    ) -> Result<real> {
        self.check_policy(policy)?;
        let v1 = self.weighted_sentence_sum(seq1, tags1, idf1, alpha, policy);
        let v2 = self.weighted_sentence_sum(seq2, tags2, idf2, alpha, policy);
        Ok(math::cosine_similarity(&v1, &v2))
    }

    pub(crate) fn weighted_sentence_sum(
        &self,
        seq: &str,
        tags: &str,
        idf: &[real],
        alpha: real,
        policy: Policy,
    ) -> Vec<real> {
        let words: Vec<&str> = seq.split_ascii_whitespace().collect();
        let tags: Vec<&str> = tags.split_ascii_whitespace().collect();
        let mut sum = vec![0.0; self.policy_width(policy)];

        let n = words.len().min(tags.len()).min(idf.len());
        for i in 0..n {
            let (Some(index), Some(pos_weight)) = (self.vocab.lookup(words[i]), syntax_weight(tags[i]))
            else {
                continue;
            };
            let weight = pos_weight.powf(1.0 - alpha) * idf[i].powf(alpha);
            for (s, x) in sum.iter_mut().zip(self.word_vec_index(index, policy)) {
                *s += weight * x;
            }
        }
        sum
    }

    /// Word error rate of `hyp` against `reference`, with the embedding
    /// distance between words as the substitution cost. Insertion and
    /// deletion cost 1; substitution costs are usually well below 1, so
    /// the result reads low compared to plain WER.
    pub fn soft_wer(&self, hyp: &str, reference: &str, policy: Policy) -> Result<real> {
        self.check_policy(policy)?;
        let h: Vec<&str> = hyp.split_ascii_whitespace().collect();
        let r: Vec<&str> = reference.split_ascii_whitespace().collect();
        if r.is_empty() {
            return Err(ModelError::InvalidInput("empty reference sequence".into()));
        }

        let mut d = vec![vec![0.0 as real; r.len() + 1]; h.len() + 1];
        for (i, row) in d.iter_mut().enumerate() {
            row[0] = i as real;
        }
        for j in 0..=r.len() {
            d[0][j] = j as real;
        }

        for i in 1..=h.len() {
            for j in 1..=r.len() {
                let substitution = d[i - 1][j - 1] + self.distance(h[i - 1], r[j - 1], policy)?;
                let deletion = d[i - 1][j] + 1.0;
                let insertion = d[i][j - 1] + 1.0;
                d[i][j] = substitution.min(deletion).min(insertion);
            }
        }

        Ok(d[h.len()][r.len()] / r.len() as real)
    }
}
