//! Monolingual and cross-lingual word vector estimation.
//!
//! A [`MonolingualModel`] learns dense vectors for the terms of one corpus
//! (CBOW, skip-gram, or distributed bag-of-words, trained with hierarchical
//! softmax and/or negative sampling) and answers similarity and
//! nearest-neighbor queries over them. A [`BilingualModel`] pairs two
//! trained models, induces a seed lexicon by nearest-neighbor search, and
//! fits a linear mapping between the two embedding spaces.
//!
//! Training input is plain UTF-8 text, one sentence per line, tokens
//! separated by ASCII whitespace.

mod bilingual;
mod chunk;
mod config;
mod error;
mod math;
mod monolingual;
mod query;
mod saveload;
mod vocab;
mod weights;

pub use bilingual::{BilingualModel, Mapping};
pub use chunk::{chunkify, FileChunks};
pub use config::{Config, Policy};
pub use error::{ModelError, Result};
pub use math::{cosine_similarity, dot, norm, normalize, sigmoid, Rng, EXP_TABLE_SIZE, MAX_EXP};
pub use monolingual::MonolingualModel;
pub use saveload::Vectors;
pub use vocab::{VocabWord, Vocabulary, UNIGRAM_TABLE_SIZE};
pub use weights::{Real, WeightMatrix};

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers
