use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::ops::Index;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bilingual::{BilingualModel, Mapping};
use crate::config::{Config, Policy};
use crate::error::{ModelError, Result};
use crate::math;
use crate::monolingual::MonolingualModel;
use crate::real;
use crate::vocab::{VocabWord, Vocabulary};
use crate::weights::WeightMatrix;

fn format_err(err: bincode::Error) -> ModelError {
    ModelError::Io(io::Error::new(io::ErrorKind::InvalidData, err))
}

/// On-disk form of a monolingual model.
#[derive(Serialize, Deserialize)]
struct ModelData {
    config: Config,
    words: Vec<VocabWord>,
    input_weights: Vec<real>,
    output_weights: Vec<real>,
    output_weights_hs: Vec<real>,
    sent_weights: Vec<real>,
    sent_rows: usize,
    training_words: u64,
    training_lines: u64,
}

#[derive(Serialize, Deserialize)]
struct BilingualData {
    src: ModelData,
    trg: ModelData,
    mapping: Option<Mapping>,
}

impl MonolingualModel {
    fn to_data(&self) -> ModelData {
        ModelData {
            config: self.config.clone(),
            words: self.vocab.words().to_vec(),
            input_weights: self.input_weights.to_vec(),
            output_weights: self.output_weights.to_vec(),
            output_weights_hs: self.output_weights_hs.to_vec(),
            sent_weights: self.sent_weights.to_vec(),
            sent_rows: self.sent_weights.rows(),
            training_words: self.training_words,
            training_lines: self.training_lines,
        }
    }

    fn from_data(data: ModelData) -> Result<Self> {
        data.config.validate()?;
        let v = data.words.len();
        let d = data.config.dimension;

        let ensure = |ok: bool, what: &str| -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(ModelError::InvariantViolation(what.to_string()))
            }
        };
        ensure(
            data.input_weights.len() == v * d,
            "input weight matrix does not match vocabulary and dimension",
        )?;
        ensure(
            data.output_weights.len() == v * d,
            "output weight matrix does not match vocabulary and dimension",
        )?;
        ensure(
            data.output_weights_hs.len() == v.saturating_sub(1) * d,
            "softmax weight matrix does not match the coding tree",
        )?;
        ensure(
            data.sent_weights.len() == data.sent_rows * d,
            "sentence weight matrix does not match its row count",
        )?;
        for w in &data.words {
            ensure(
                w.code.len() == w.parents.len(),
                "code and parent paths differ in length",
            )?;
            for &p in &w.parents {
                ensure((p as usize) < v.saturating_sub(1), "parent index out of range")?;
            }
        }

        let vocab = Vocabulary::from_words(data.words);
        ensure(vocab.len() == v, "duplicate words in vocabulary")?;

        let mut model = MonolingualModel::new(data.config)?;
        model.vocab = vocab;
        model.input_weights = WeightMatrix::from_vec(v, d, &data.input_weights);
        model.output_weights = WeightMatrix::from_vec(v, d, &data.output_weights);
        model.output_weights_hs =
            WeightMatrix::from_vec(v.saturating_sub(1), d, &data.output_weights_hs);
        model.sent_weights = WeightMatrix::from_vec(data.sent_rows, d, &data.sent_weights);
        model.training_words = data.training_words;
        model.training_lines = data.training_lines;
        model.rebuild_unigram_table()?;
        Ok(model)
    }

    /// Save the complete model: configuration, vocabulary with codes, all
    /// weight matrices, and training counters.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.config.verbose {
            println!("Saving model as {}", path.display());
        }
        let out = BufWriter::new(File::create(path)?);
        bincode::serialize_into(out, &self.to_data()).map_err(format_err)
    }

    /// Load a complete model. The sampling table is rebuilt from the stored
    /// counts.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let data: ModelData = bincode::deserialize_from(reader).map_err(format_err)?;
        Self::from_data(data)
    }

    /// Export word vectors in the word2vec text format: a `"V D"` header,
    /// then one `"word f0 f1 ..."` line per term in frequency order.
    pub fn save_vectors(&self, path: &Path, policy: Policy, norm: bool) -> Result<()> {
        self.check_policy(policy)?;
        if self.config.verbose {
            println!("Saving embeddings in text format to {}", path.display());
        }
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{} {}", self.vocab.len(), self.policy_width(policy))?;
        for i in self.vocab.sorted() {
            let mut v = self.word_vec_index(i, policy);
            if norm {
                math::normalize(&mut v);
            }
            write!(out, "{}", self.vocab.word(i).word)?;
            for x in &v {
                write!(out, " {x}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Export word vectors in the word2vec binary format: a `"V D"` header,
    /// then per term the word, a space, D native little-endian floats, and
    /// a newline.
    pub fn save_vectors_bin(&self, path: &Path, policy: Policy, norm: bool) -> Result<()> {
        self.check_policy(policy)?;
        if self.config.verbose {
            println!("Saving embeddings in binary format to {}", path.display());
        }
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "{} {}", self.vocab.len(), self.policy_width(policy))?;
        for i in self.vocab.sorted() {
            let mut v = self.word_vec_index(i, policy);
            if norm {
                math::normalize(&mut v);
            }
            out.write_all(self.vocab.word(i).word.as_bytes())?;
            out.write_all(b" ")?;
            out.write_all(bytemuck::cast_slice::<real, u8>(&v))?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Export the per-line sentence vectors, one space-separated row per
    /// line of the training file.
    pub fn save_sent_vectors(&self, path: &Path, norm: bool) -> Result<()> {
        if self.config.verbose {
            println!("Saving sentence vectors in text format to {}", path.display());
        }
        let mut out = BufWriter::new(File::create(path)?);
        for i in 0..self.sent_weights.rows() {
            let mut v = self.sent_weights.row_to_vec(i);
            if norm {
                math::normalize(&mut v);
            }
            let row = v.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
            writeln!(out, "{row}")?;
        }
        Ok(())
    }
}

impl BilingualModel {
    /// Save both models and the mapping, if one has been learned.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.config.verbose {
            println!("Saving bilingual model as {}", path.display());
        }
        let data = BilingualData {
            src: self.src_model.to_data(),
            trg: self.trg_model.to_data(),
            mapping: self.mapping().cloned(),
        };
        let out = BufWriter::new(File::create(path)?);
        bincode::serialize_into(out, &data).map_err(format_err)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let data: BilingualData = bincode::deserialize_from(reader).map_err(format_err)?;
        let mut model = BilingualModel::from_models(
            MonolingualModel::from_data(data.src)?,
            MonolingualModel::from_data(data.trg)?,
        );
        if let Some(mapping) = data.mapping {
            if mapping.rows() != model.trg_model.dimension()
                || mapping.cols() != model.src_model.dimension()
            {
                return Err(ModelError::InvariantViolation(
                    "mapping shape does not match the model dimensions".into(),
                ));
            }
            model.mapping = Some(mapping);
        }
        Ok(model)
    }
}

/// A read-only set of exported word vectors, as written by
/// [`MonolingualModel::save_vectors`] or
/// [`MonolingualModel::save_vectors_bin`].
pub struct Vectors {
    size: usize,
    vocab: Vec<String>,
    embeddings: Vec<real>,
}

impl Index<usize> for Vectors {
    type Output = [real];

    fn index(&self, i: usize) -> &[real] {
        &self.embeddings[i * self.size..][..self.size]
    }
}

fn read_header(line: &str) -> Result<(usize, usize)> {
    let mut fields = line.split_ascii_whitespace();
    let bad = || ModelError::InvalidInput("malformed vector file header".into());
    let words = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let size = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    Ok((words, size))
}

impl Vectors {
    /// Read a binary-format vector file.
    pub fn load_bin(path: &Path) -> Result<Self> {
        let mut f = BufReader::new(File::open(path)?);
        let mut line = String::new();
        f.read_line(&mut line)?;
        let (num_words, size) = read_header(&line)?;

        let mut vocab = Vec::with_capacity(num_words);
        let mut embeddings = vec![0.0; num_words * size];
        for i in 0..num_words {
            let mut word = Vec::<u8>::new();
            if f.read_until(b' ', &mut word)? == 0 {
                return Err(ModelError::InvalidInput(
                    "vector file ends before the promised word count".into(),
                ));
            }
            if word.last() == Some(&b' ') {
                word.pop();
            }
            word.retain(|&c| c != b'\n');
            vocab.push(String::from_utf8(word).map_err(|_| {
                ModelError::InvalidInput("vector file contains an invalid word".into())
            })?);

            let row = &mut embeddings[i * size..][..size];
            f.read_exact(bytemuck::cast_slice_mut::<real, u8>(row))?;
        }

        Ok(Vectors {
            size,
            vocab,
            embeddings,
        })
    }

    /// Read a text-format vector file.
    pub fn load_text(path: &Path) -> Result<Self> {
        let mut f = BufReader::new(File::open(path)?);
        let mut line = String::new();
        f.read_line(&mut line)?;
        let (num_words, size) = read_header(&line)?;

        let mut vocab = Vec::with_capacity(num_words);
        let mut embeddings = Vec::with_capacity(num_words * size);
        for _ in 0..num_words {
            line.clear();
            if f.read_line(&mut line)? == 0 {
                return Err(ModelError::InvalidInput(
                    "vector file ends before the promised word count".into(),
                ));
            }
            let mut fields = line.split_ascii_whitespace();
            let word = fields.next().ok_or_else(|| {
                ModelError::InvalidInput("vector file contains an empty row".into())
            })?;
            vocab.push(word.to_string());
            let mut n = 0;
            for field in fields {
                let x: real = field.parse().map_err(|_| {
                    ModelError::InvalidInput(format!("bad float {field:?} in vector file"))
                })?;
                embeddings.push(x);
                n += 1;
            }
            if n != size {
                return Err(ModelError::InvalidInput(format!(
                    "vector row for {word:?} has {n} values, expected {size}"
                )));
            }
        }

        Ok(Vectors {
            size,
            vocab,
            embeddings,
        })
    }

    pub fn num_words(&self) -> usize {
        self.vocab.len()
    }

    /// Returns the vector size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the index for a word. Exact match only, case-sensitive.
    pub fn lookup_word(&self, word: &str) -> Option<usize> {
        self.vocab.iter().position(|v| v == word)
    }

    /// Get the word for a word-index. Panics if out of range.
    pub fn word(&self, i: usize) -> &str {
        &self.vocab[i]
    }
}
