use std::thread;

use serde::{Deserialize, Serialize};

use crate::config::{Config, Policy};
use crate::error::{ModelError, Result};
use crate::math::{self, Rng};
use crate::monolingual::MonolingualModel;
use crate::query::take_best;
use crate::real;

/// Linear map from source embedding space into target embedding space,
/// stored row-major as `rows x cols` (target dim x source dim).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mapping {
    rows: usize,
    cols: usize,
    data: Vec<real>,
}

impl Mapping {
    fn zeros(rows: usize, cols: usize) -> Self {
        Mapping {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn row(&self, i: usize) -> &[real] {
        &self.data[i * self.cols..][..self.cols]
    }

    fn row_mut(&mut self, i: usize) -> &mut [real] {
        &mut self.data[i * self.cols..][..self.cols]
    }

    /// `W * x`
    pub fn apply(&self, x: &[real]) -> Vec<real> {
        (0..self.rows).map(|i| math::dot(self.row(i), x)).collect()
    }
}

/// Two independently trained monolingual models plus an optional learned
/// mapping between their embedding spaces.
pub struct BilingualModel {
    pub(crate) config: Config,
    pub src_model: MonolingualModel,
    pub trg_model: MonolingualModel,
    pub(crate) mapping: Option<Mapping>,
}

impl BilingualModel {
    /// Fresh pair of untrained models sharing one configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(BilingualModel {
            src_model: MonolingualModel::new(config.clone())?,
            trg_model: MonolingualModel::new(config.clone())?,
            config,
            mapping: None,
        })
    }

    /// Wrap two already trained (or loaded) models. The source model's
    /// configuration drives bilingual operations.
    pub fn from_models(src_model: MonolingualModel, trg_model: MonolingualModel) -> Self {
        BilingualModel {
            config: src_model.config().clone(),
            src_model,
            trg_model,
            mapping: None,
        }
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }

    /// Cosine similarity between a source word and a target word; 0 if
    /// either is unknown.
    pub fn similarity(&self, src_word: &str, trg_word: &str, policy: Policy) -> Result<real> {
        self.src_model.check_policy(policy)?;
        self.trg_model.check_policy(policy)?;
        match (
            self.src_model.vocab().lookup(src_word),
            self.trg_model.vocab().lookup(trg_word),
        ) {
            (Some(i1), Some(i2)) => Ok(math::cosine_similarity(
                &self.src_model.word_vec_index(i1, policy),
                &self.trg_model.word_vec_index(i2, policy),
            )),
            _ => Ok(0.0),
        }
    }

    /// Cross-space cosine distance (no halving: the two spaces are not
    /// assumed to share an origin).
    pub fn distance(&self, src_word: &str, trg_word: &str, policy: Policy) -> Result<real> {
        Ok(1.0 - self.similarity(src_word, trg_word, policy)?)
    }

    /// The `n` target terms closest to a source word.
    pub fn trg_closest(&self, src_word: &str, n: usize, policy: Policy) -> Result<Vec<(String, real)>> {
        let v = self.src_model.word_vec(src_word, policy)?;
        self.trg_model.closest_to_vec(&v, n, policy)
    }

    /// The `n` source terms closest to a target word.
    pub fn src_closest(&self, trg_word: &str, n: usize, policy: Policy) -> Result<Vec<(String, real)>> {
        let v = self.trg_model.word_vec(trg_word, policy)?;
        self.src_model.closest_to_vec(&v, n, policy)
    }

    /// Average the positional cross-lingual similarities of two
    /// equal-length sequences, skipping pairs with an unknown side.
    pub fn similarity_ngrams(&self, src_seq: &str, trg_seq: &str, policy: Policy) -> Result<real> {
        self.src_model.check_policy(policy)?;
        self.trg_model.check_policy(policy)?;
        let src_words: Vec<&str> = src_seq.split_ascii_whitespace().collect();
        let trg_words: Vec<&str> = trg_seq.split_ascii_whitespace().collect();
        if src_words.len() != trg_words.len() {
            return Err(ModelError::ShapeMismatch {
                left: src_words.len(),
                right: trg_words.len(),
            });
        }

        let mut total = 0.0;
        let mut n = 0;
        for (s, t) in src_words.iter().zip(&trg_words) {
            if self.src_model.vocab().lookup(s).is_some()
                && self.trg_model.vocab().lookup(t).is_some()
            {
                total += self.similarity(s, t, policy)?;
                n += 1;
            }
        }

        if n == 0 {
            Err(ModelError::AllOov)
        } else {
            Ok(total / n as real)
        }
    }

    /// Cosine of the source and target bag-of-words sums.
    pub fn similarity_sentence(&self, src_seq: &str, trg_seq: &str, policy: Policy) -> Result<real> {
        self.src_model.check_policy(policy)?;
        self.trg_model.check_policy(policy)?;
        let v1 = self.src_model.sentence_sum(src_seq, policy);
        let v2 = self.trg_model.sentence_sum(trg_seq, policy);
        Ok(math::cosine_similarity(&v1, &v2))
    }

    /// POS- and IDF-weighted cross-lingual sentence similarity; see the
    /// monolingual variant for the weighting scheme.
    #[allow(clippy::too_many_arguments)]
    pub fn similarity_sentence_syntax(
        &self,
        src_seq: &str,
        trg_seq: &str,
        src_tags: &str,
        trg_tags: &str,
        src_idf: &[real],
        trg_idf: &[real],
        alpha: real,
        policy: Policy,
    ) -> Result<real> {
        self.src_model.check_policy(policy)?;
        self.trg_model.check_policy(policy)?;
        let v1 = self
            .src_model
            .weighted_sentence_sum(src_seq, src_tags, src_idf, alpha, policy);
        let v2 = self
            .trg_model
            .weighted_sentence_sum(trg_seq, trg_tags, trg_idf, alpha, policy);
        Ok(math::cosine_similarity(&v1, &v2))
    }

    /// Induce a seed lexicon: for every known source word, the target word
    /// whose unit-normalized vector has the highest dot product.
    ///
    /// With more than one configured thread the source list is cut into
    /// contiguous slices processed in parallel; results are concatenated in
    /// slice order, so the outcome does not depend on the thread count.
    pub fn dictionary_induction(
        &self,
        src_vocab: &[String],
        trg_vocab: &[String],
        policy: Policy,
    ) -> Result<Vec<(String, String)>> {
        self.src_model.check_policy(policy)?;
        self.trg_model.check_policy(policy)?;

        let src_words = unit_vectors(&self.src_model, src_vocab, policy);
        let trg_words = unit_vectors(&self.trg_model, trg_vocab, policy);

        let threads = self.config.threads;
        if threads <= 1 || src_words.len() < threads {
            return Ok(induce(&src_words, &trg_words));
        }

        let size = src_words.len() / threads;
        let dictionary = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|i| {
                    let begin = i * size;
                    let end = if i == threads - 1 {
                        src_words.len()
                    } else {
                        begin + size
                    };
                    let slice = &src_words[begin..end];
                    let trg_words = &trg_words;
                    s.spawn(move || induce(slice, trg_words))
                })
                .collect();

            let mut dictionary = Vec::with_capacity(src_words.len());
            for handle in handles {
                dictionary.extend(handle.join().expect("induction worker panicked"));
            }
            dictionary
        });
        Ok(dictionary)
    }

    /// Induce over the `src_count` and `trg_count` most frequent terms of
    /// each vocabulary (0 means all).
    pub fn dictionary_induction_top(
        &self,
        src_count: usize,
        trg_count: usize,
        policy: Policy,
    ) -> Result<Vec<(String, String)>> {
        let top = |model: &MonolingualModel, count: usize| -> Vec<String> {
            let ids = model.vocab().sorted();
            let limit = if count == 0 { ids.len() } else { count.min(ids.len()) };
            ids[..limit]
                .iter()
                .map(|&i| model.vocab().word(i).word.clone())
                .collect()
        };
        self.dictionary_induction(
            &top(&self.src_model, src_count),
            &top(&self.trg_model, trg_count),
            policy,
        )
    }

    /// Fit the linear map from source to target input weights over a seed
    /// dictionary by per-sample SGD, halving the learning rate whenever the
    /// loss stops improving.
    pub fn learn_mapping(&mut self, dict: &[(String, String)]) -> Result<()> {
        let d_src = self.src_model.dimension();
        let d_trg = self.trg_model.dimension();

        let mut dict_indices: Vec<(usize, usize)> = dict
            .iter()
            .filter_map(|(s, t)| {
                Some((
                    self.src_model.vocab().lookup(s)?,
                    self.trg_model.vocab().lookup(t)?,
                ))
            })
            .collect();
        if dict_indices.is_empty() {
            return Err(ModelError::InvalidInput(
                "no dictionary pair is known to both models".into(),
            ));
        }

        let mut mapping = Mapping::zeros(d_trg, d_src);
        let mut rng = Rng(self.config.seed);
        let starting_patience = 10;
        let mut patience = starting_patience;
        let mut best_loss: real = -1.0;
        let mut prev_best_loss: real = -1.0;
        let mut alpha: real = 0.01;
        let epsilon: real = 1e-4;

        while alpha > 1e-10 {
            let mut loss = 0.0;
            rng.shuffle(&mut dict_indices);

            for &(si, ti) in &dict_indices {
                let x = self.src_model.input_weights.row_to_vec(si);
                let z = self.trg_model.input_weights.row_to_vec(ti);

                let y = mapping.apply(&x);
                let e: Vec<real> = y.iter().zip(&z).map(|(&y, &z)| y - z).collect();
                loss += math::dot(&e, &e) / dict_indices.len() as real;

                for (i, &ei) in e.iter().enumerate() {
                    let row = mapping.row_mut(i);
                    for (j, &xj) in x.iter().enumerate() {
                        row[j] -= alpha * 2.0 * ei * xj;
                    }
                }
            }

            if loss == 0.0 {
                break; // exact fit; the patience rule cannot trigger at zero
            }

            if best_loss > 0.0 && loss >= best_loss - epsilon {
                patience -= 1;
            }
            best_loss = if best_loss <= 0.0 {
                loss
            } else {
                best_loss.min(loss)
            };

            if patience == 0 {
                if prev_best_loss > 0.0 && best_loss >= prev_best_loss - epsilon {
                    break;
                }
                prev_best_loss = best_loss;
                alpha /= 2.0;
                patience = starting_patience;
                if self.config.verbose {
                    println!("loss: {best_loss}, alpha: {alpha}");
                }
            }
        }

        self.mapping = Some(mapping);
        Ok(())
    }

    /// Map a source-space vector into target space through the learned
    /// mapping.
    pub fn map_vec(&self, v: &[real]) -> Result<Vec<real>> {
        let mapping = self
            .mapping
            .as_ref()
            .ok_or_else(|| ModelError::InvalidInput("no mapping has been learned".into()))?;
        if v.len() != mapping.cols {
            return Err(ModelError::ShapeMismatch {
                left: v.len(),
                right: mapping.cols,
            });
        }
        Ok(mapping.apply(v))
    }

    /// The `n` target terms closest to a source word after applying the
    /// learned mapping to its input-weight vector.
    pub fn mapped_closest(&self, src_word: &str, n: usize) -> Result<Vec<(String, real)>> {
        let v = self.src_model.word_vec(src_word, Policy::Input)?;
        let mapped = self.map_vec(&v)?;
        let results: Vec<(String, real)> = self
            .trg_model
            .vocab()
            .words()
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let sim = math::cosine_similarity(
                    &mapped,
                    &self.trg_model.word_vec_index(i, Policy::Input),
                );
                (w.word.clone(), sim)
            })
            .collect();
        Ok(take_best(results, n))
    }
}

fn unit_vectors(
    model: &MonolingualModel,
    words: &[String],
    policy: Policy,
) -> Vec<(String, Vec<real>)> {
    words
        .iter()
        .filter_map(|w| {
            let i = model.vocab().lookup(w)?;
            let mut v = model.word_vec_index(i, policy);
            math::normalize(&mut v);
            Some((w.clone(), v))
        })
        .collect()
}

/// Serial nearest-neighbor scan of each source vector against the full
/// target list. Ties keep the earliest target.
fn induce(
    src_words: &[(String, Vec<real>)],
    trg_words: &[(String, Vec<real>)],
) -> Vec<(String, String)> {
    let mut dictionary = Vec::with_capacity(src_words.len());
    for (src_word, src_vec) in src_words {
        let mut best: Option<(&String, real)> = None;
        for (trg_word, trg_vec) in trg_words {
            let sim = math::dot(src_vec, trg_vec);
            match best {
                Some((_, best_sim)) if sim <= best_sim => {}
                _ => best = Some((trg_word, sim)),
            }
        }
        if let Some((trg_word, _)) = best {
            dictionary.push((src_word.clone(), trg_word.clone()));
        }
    }
    dictionary
}
