use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Which weights constitute a term's exposed vector.
///
/// Everything except [`Policy::Input`] reads the negative-sampling output
/// weights and therefore requires a model trained with `negative > 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Policy {
    /// Input weights only.
    #[default]
    Input,
    /// Concatenation of input and output weights, length `2 * dimension`.
    Concat,
    /// Element-wise sum of input and output weights.
    Sum,
    /// Output weights only.
    Output,
}

impl Policy {
    pub fn from_int(n: i64) -> Result<Policy> {
        match n {
            0 => Ok(Policy::Input),
            1 => Ok(Policy::Concat),
            2 => Ok(Policy::Sum),
            3 => Ok(Policy::Output),
            _ => Err(ModelError::InvalidInput(format!(
                "unknown weight policy {n} (expected 0-3)"
            ))),
        }
    }
}

/// Training and query knobs. Immutable once a model has been built from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Embedding width D.
    pub dimension: usize,
    /// Prune terms seen fewer than this many times.
    pub min_count: u64,
    /// Maximum context radius; the effective radius of each update is drawn
    /// uniformly from `1..=window_size`.
    pub window_size: usize,
    /// Negative samples per positive example; 0 disables negative sampling.
    pub negative: usize,
    /// Train with the hierarchical-softmax objective.
    pub hierarchical_softmax: bool,
    /// Skip-gram instead of CBOW. Combined with `sent_vector` this selects
    /// the distributed bag-of-words (DBOW) objective.
    pub skip_gram: bool,
    /// Jointly train one vector per input line.
    pub sent_vector: bool,
    /// Frequent-word downsampling threshold; 0 disables.
    pub subsampling: f32,
    /// Initial learning rate.
    pub learning_rate: f32,
    /// Epochs over the corpus.
    pub iterations: usize,
    pub threads: usize,
    /// CBOW combines context vectors by sum instead of mean.
    pub no_average: bool,
    pub verbose: bool,
    /// Base seed for the per-worker generators.
    pub seed: u64,
    /// Serialize every weight-matrix touch on a per-matrix lock instead of
    /// the default racy asynchronous updates.
    pub sync_sgd: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dimension: 100,
            min_count: 5,
            window_size: 5,
            negative: 5,
            hierarchical_softmax: false,
            skip_gram: false,
            sent_vector: false,
            subsampling: 1e-3,
            learning_rate: 0.05,
            iterations: 5,
            threads: 4,
            no_average: false,
            verbose: false,
            seed: 1,
            sync_sgd: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(ModelError::InvalidInput("dimension must be positive".into()));
        }
        if self.window_size == 0 {
            return Err(ModelError::InvalidInput("window size must be positive".into()));
        }
        if self.iterations == 0 {
            return Err(ModelError::InvalidInput("need at least one iteration".into()));
        }
        if self.threads == 0 {
            return Err(ModelError::InvalidInput("need at least one thread".into()));
        }
        if self.learning_rate <= 0.0 {
            return Err(ModelError::InvalidInput("learning rate must be positive".into()));
        }
        if self.subsampling < 0.0 {
            return Err(ModelError::InvalidInput(
                "subsampling threshold cannot be negative".into(),
            ));
        }
        if !self.hierarchical_softmax && self.negative == 0 {
            return Err(ModelError::InvalidInput(
                "enable hierarchical softmax or negative sampling (or both)".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_disabled_objectives() {
        let config = Config {
            negative: 0,
            hierarchical_softmax: false,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn policy_from_int() {
        assert_eq!(Policy::from_int(0).unwrap(), Policy::Input);
        assert_eq!(Policy::from_int(3).unwrap(), Policy::Output);
        assert!(Policy::from_int(4).is_err());
    }
}
