use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use crate::chunk::{chunkify, FileChunks};
use crate::config::Config;
use crate::error::{ModelError, Result};
use crate::math::{sigmoid, Rng, MAX_EXP};
use crate::real;
use crate::vocab::{sample_unigram, Vocabulary};
use crate::weights::{Real, WeightMatrix};

/// Training objective, selected once per sentence from the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kernel {
    Cbow,
    SkipGram,
    Dbow,
}

/// A word-embedding model over a single corpus: vocabulary, coding tree,
/// sampling table, and the weight matrices updated by training.
///
/// Queries treat the weights as read-only; only [`train`] and the load path
/// mutate them.
///
/// [`train`]: MonolingualModel::train
pub struct MonolingualModel {
    pub(crate) config: Config,
    pub(crate) vocab: Vocabulary,
    pub(crate) unigram_table: Vec<u32>,
    pub(crate) input_weights: WeightMatrix,
    /// Output weights for negative sampling.
    pub(crate) output_weights: WeightMatrix,
    /// Output weights for hierarchical softmax, one row per internal node.
    pub(crate) output_weights_hs: WeightMatrix,
    /// One row per training line when `sent_vector` is set.
    pub(crate) sent_weights: WeightMatrix,
    pub(crate) vocab_word_count: u64,
    pub(crate) training_words: u64,
    pub(crate) training_lines: u64,
    words_processed: AtomicU64,
    progress: Mutex<()>,
}

impl MonolingualModel {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let dim = config.dimension;
        Ok(MonolingualModel {
            config,
            vocab: Vocabulary::new(),
            unigram_table: Vec::new(),
            input_weights: WeightMatrix::zeros(0, dim),
            output_weights: WeightMatrix::zeros(0, dim),
            output_weights_hs: WeightMatrix::zeros(0, dim),
            sent_weights: WeightMatrix::zeros(0, dim),
            vocab_word_count: 0,
            training_words: 0,
            training_lines: 0,
            words_processed: AtomicU64::new(0),
            progress: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn training_lines(&self) -> u64 {
        self.training_lines
    }

    pub fn training_words(&self) -> u64 {
        self.training_words
    }

    /// Read the training file and build the vocabulary, the coding tree,
    /// and the sampling table.
    fn read_vocab(&mut self, training_file: &Path) -> Result<()> {
        let file = File::open(training_file).map_err(|e| {
            ModelError::InvalidInput(format!(
                "cannot open training file {}: {e}",
                training_file.display()
            ))
        })?;
        let mut reader = BufReader::new(file);

        self.vocab = Vocabulary::new();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            for word in line.split_ascii_whitespace() {
                self.vocab.add_word(word);
            }
        }

        if self.config.verbose {
            println!("Vocabulary size: {}", self.vocab.len());
        }

        self.vocab.reduce(self.config.min_count);

        if self.config.verbose {
            println!("Reduced vocabulary size: {}", self.vocab.len());
        }

        self.vocab.build_huffman_tree();
        self.rebuild_unigram_table()?;
        Ok(())
    }

    pub(crate) fn rebuild_unigram_table(&mut self) -> Result<()> {
        self.vocab_word_count = self.vocab.word_count();
        self.unigram_table = self.vocab.build_unigram_table();
        if self.config.negative > 0 && self.unigram_table.is_empty() {
            return Err(ModelError::InvariantViolation(
                "unigram table is empty; negative sampling needs a non-empty vocabulary".into(),
            ));
        }
        Ok(())
    }

    fn init_net(&mut self) {
        let v = self.vocab.len();
        let d = self.config.dimension;
        let mut rng = Rng(self.config.seed);
        self.input_weights = WeightMatrix::uniform(v, d, &mut rng);
        self.output_weights = WeightMatrix::zeros(v, d);
        self.output_weights_hs = WeightMatrix::zeros(v.saturating_sub(1), d);
    }

    fn init_sent_weights(&mut self) {
        let d = self.config.dimension;
        let mut rng = Rng(self.config.seed.wrapping_add(1));
        self.sent_weights = WeightMatrix::uniform(self.training_lines as usize, d, &mut rng);
    }

    /// Train on the given text file, one sentence per line. Workers read
    /// disjoint chunks in parallel and update the weights in place.
    ///
    /// Pass `initialize = false` to continue training a model whose
    /// vocabulary and weights already exist (e.g. loaded from disk).
    pub fn train(&mut self, training_file: &Path, initialize: bool) -> Result<()> {
        if self.config.verbose {
            println!("Training file: {}", training_file.display());
        }

        if initialize {
            self.read_vocab(training_file)?;
            self.init_net();
        } else if self.vocab_word_count == 0 {
            return Err(ModelError::InvalidInput(
                "the model needs to be initialized before training".into(),
            ));
        }

        self.words_processed.store(0, Ordering::Relaxed);

        let chunks = chunkify(training_file, self.config.threads)?;
        self.training_lines = chunks.lines;
        self.training_words = chunks.words;

        if self.config.verbose {
            println!(
                "Number of lines: {}, words: {}",
                self.training_lines, self.training_words
            );
        }

        if self.config.sent_vector {
            // no incremental training for per-sentence vectors
            self.init_sent_weights();
        }

        let start = Instant::now();
        let n_workers = chunks.offsets.len();
        if n_workers == 1 {
            self.train_chunk(training_file, &chunks, 0)?;
        } else {
            let this = &*self;
            thread::scope(|s| {
                let workers: Vec<_> = (0..n_workers)
                    .map(|i| {
                        let chunks = &chunks;
                        s.spawn(move || this.train_chunk(training_file, chunks, i))
                    })
                    .collect();
                let mut first_err = None;
                for worker in workers {
                    if let Err(err) = worker.join().expect("training worker panicked") {
                        first_err.get_or_insert(err);
                    }
                }
                match first_err {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            })?;
        }

        if self.config.verbose {
            println!();
            println!("Training time: {:.2}s", start.elapsed().as_secs_f32());
        }
        Ok(())
    }

    fn train_chunk(&self, training_file: &Path, chunks: &FileChunks, chunk_id: usize) -> Result<()> {
        let mut reader = BufReader::new(File::open(training_file)?);
        let starting_alpha = self.config.learning_rate;
        let max_iterations = self.config.iterations;
        let mut alpha = starting_alpha;
        let mut rng = Rng(self.config.seed.wrapping_add(chunk_id as u64));
        let n_chunks = chunks.offsets.len();
        let chunk_lines = chunks.lines / n_chunks as u64;
        let total_words = max_iterations as u64 * self.training_words;

        for _epoch in 0..max_iterations {
            reader.seek(SeekFrom::Start(chunks.offsets[chunk_id]))?;
            let mut pos = chunks.offsets[chunk_id];
            let mut word_count = 0u64;
            let mut sent_id = chunk_id as u64 * chunk_lines;
            let mut line = String::new();

            loop {
                line.clear();
                let n = reader.read_line(&mut line)?;
                if n == 0 {
                    break;
                }
                pos += n as u64;

                let sent_vec = self
                    .config
                    .sent_vector
                    .then(|| self.sent_weights.row(sent_id as usize));
                word_count += self.train_sentence(&line, sent_vec, alpha, &mut rng) as u64;
                sent_id += 1;

                if word_count >= 10000 {
                    let _guard = self.progress.lock().unwrap();
                    let words_processed =
                        self.words_processed.fetch_add(word_count, Ordering::Relaxed) + word_count;
                    word_count = 0;

                    alpha = starting_alpha * (1.0 - words_processed as real / total_words as real);
                    alpha = alpha.max(starting_alpha * 0.0001);

                    if self.config.verbose {
                        print!(
                            "\rAlpha: {:.6}  Progress: {:.2}%",
                            alpha,
                            100.0 * words_processed as f64 / total_words as f64
                        );
                        let _ = io::stdout().flush();
                    }
                }

                // stop when reaching the end of this chunk
                if chunk_id < n_chunks - 1 && pos >= chunks.offsets[chunk_id + 1] {
                    break;
                }
            }

            self.words_processed.fetch_add(word_count, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Train on one line. Returns the number of in-vocabulary tokens, for
    /// progress estimation.
    pub(crate) fn train_sentence(
        &self,
        sentence: &str,
        sent_vec: Option<&[Real]>,
        alpha: real,
        rng: &mut Rng,
    ) -> usize {
        let mut nodes = self.vocab.tokenize(sentence);
        let words = nodes.iter().filter(|n| n.is_some()).count();

        if self.config.subsampling > 0.0 {
            self.subsample(&mut nodes, rng);
        }

        let sen: Vec<usize> = nodes.into_iter().flatten().collect();

        let kernel = self.kernel(sent_vec.is_some());
        for pos in 0..sen.len() {
            self.train_word(kernel, &sen, pos, sent_vec, alpha, true, rng);
        }

        words
    }

    fn kernel(&self, sent_vec: bool) -> Kernel {
        if self.config.skip_gram && sent_vec {
            Kernel::Dbow
        } else if self.config.skip_gram {
            Kernel::SkipGram
        } else {
            Kernel::Cbow
        }
    }

    /// Randomly discard frequent tokens; the more frequent a word, the more
    /// likely it is to be dropped.
    fn subsample(&self, nodes: &mut [Option<usize>], rng: &mut Rng) {
        let s = self.config.subsampling;
        for slot in nodes.iter_mut() {
            if let Some(i) = *slot {
                let f = self.vocab.word(i).count as real / self.vocab_word_count as real;
                let p = 1.0 - (1.0 + (f / s).sqrt()) * s / f;
                if p >= rng.rand_real() {
                    *slot = None;
                }
            }
        }
    }

    fn train_word(
        &self,
        kernel: Kernel,
        sen: &[usize],
        pos: usize,
        sent_vec: Option<&[Real]>,
        alpha: real,
        update: bool,
        rng: &mut Rng,
    ) {
        match kernel {
            Kernel::Cbow => self.train_word_cbow(sen, pos, sent_vec, alpha, update, rng),
            Kernel::SkipGram => self.train_word_skip_gram(sen, pos, alpha, update, rng),
            Kernel::Dbow => {
                if let Some(sv) = sent_vec {
                    self.train_word_dbow(sen, pos, sv, alpha, update, rng);
                }
            }
        }
    }

    /// Predict the center word from the combined context (and sentence)
    /// vectors.
    fn train_word_cbow(
        &self,
        sen: &[usize],
        pos: usize,
        sent_vec: Option<&[Real]>,
        alpha: real,
        update: bool,
        rng: &mut Rng,
    ) {
        let d = self.config.dimension;
        let center = sen[pos];
        let window = 1 + rng.rand_range(self.config.window_size);
        let start = pos.saturating_sub(window);
        let stop = (pos + window + 1).min(sen.len());

        let mut hidden = vec![0.0; d];
        let mut count = 0usize;
        {
            let _guard = self.input_weights.guard(self.config.sync_sgd);
            for q in start..stop {
                if q == pos {
                    continue;
                }
                self.input_weights.accumulate_row(sen[q], &mut hidden, 1.0);
                count += 1;
            }
        }
        if let Some(sv) = sent_vec {
            for (h, cell) in hidden.iter_mut().zip(sv) {
                *h += cell.get();
            }
            count += 1;
        }
        if count == 0 {
            return;
        }

        if !self.config.no_average {
            for h in hidden.iter_mut() {
                *h /= count as real;
            }
        }

        let mut error = vec![0.0; d];
        if self.config.hierarchical_softmax {
            self.hierarchical_update(center, &hidden, alpha, update, &mut error);
        }
        if self.config.negative > 0 {
            self.neg_sampling_update(center, &hidden, alpha, update, rng, &mut error);
        }

        let scale = 1.0 / count as real;
        if update {
            let _guard = self.input_weights.guard(self.config.sync_sgd);
            for q in start..stop {
                if q == pos {
                    continue;
                }
                self.input_weights.add_to_row(sen[q], &error, scale);
            }
        }
        if let Some(sv) = sent_vec {
            for (cell, &e) in sv.iter().zip(&error) {
                cell.add(e * scale);
            }
        }
    }

    /// Predict each context word independently from the center word.
    fn train_word_skip_gram(
        &self,
        sen: &[usize],
        pos: usize,
        alpha: real,
        update: bool,
        rng: &mut Rng,
    ) {
        let d = self.config.dimension;
        let center = sen[pos];
        let window = 1 + rng.rand_range(self.config.window_size);
        let start = pos.saturating_sub(window);
        let stop = (pos + window + 1).min(sen.len());

        for q in start..stop {
            if q == pos {
                continue;
            }
            let target = sen[q];

            let hidden = {
                let _guard = self.input_weights.guard(self.config.sync_sgd);
                self.input_weights.row_to_vec(center)
            };

            let mut error = vec![0.0; d];
            if self.config.hierarchical_softmax {
                self.hierarchical_update(target, &hidden, alpha, update, &mut error);
            }
            if self.config.negative > 0 {
                self.neg_sampling_update(target, &hidden, alpha, update, rng, &mut error);
            }

            if update {
                let _guard = self.input_weights.guard(self.config.sync_sgd);
                self.input_weights.add_to_row(center, &error, 1.0);
            }
        }
    }

    /// Predict each word of the sentence from the sentence vector alone.
    /// Word weights are never touched through the context here; the
    /// sentence vector is the sole input.
    fn train_word_dbow(
        &self,
        sen: &[usize],
        pos: usize,
        sent_vec: &[Real],
        alpha: real,
        update: bool,
        rng: &mut Rng,
    ) {
        let d = self.config.dimension;
        let target = sen[pos];
        let hidden: Vec<real> = sent_vec.iter().map(Real::get).collect();

        let mut error = vec![0.0; d];
        if self.config.hierarchical_softmax {
            self.hierarchical_update(target, &hidden, alpha, update, &mut error);
        }
        if self.config.negative > 0 {
            self.neg_sampling_update(target, &hidden, alpha, update, rng, &mut error);
        }

        for (cell, &e) in sent_vec.iter().zip(&error) {
            cell.add(e);
        }
    }

    /// Walk the target's path through the coding tree, nudging each internal
    /// node's weights and accumulating the propagated error. Saturated dot
    /// products are skipped entirely.
    fn hierarchical_update(
        &self,
        target: usize,
        hidden: &[real],
        alpha: real,
        update: bool,
        error: &mut [real],
    ) {
        let node = self.vocab.word(target);
        let _guard = self.output_weights_hs.guard(self.config.sync_sgd);
        for (j, &parent) in node.parents.iter().enumerate() {
            let p = parent as usize;
            let x = self.output_weights_hs.dot_row(p, hidden);
            if x <= -MAX_EXP || x >= MAX_EXP {
                continue;
            }
            let pred = sigmoid(x);
            let err = -alpha * (pred - node.code[j] as real);

            self.output_weights_hs.accumulate_row(p, error, err);
            if update {
                self.output_weights_hs.add_to_row(p, hidden, err);
            }
        }
    }

    /// One positive example against `negative` draws from the unigram
    /// table.
    fn neg_sampling_update(
        &self,
        target: usize,
        hidden: &[real],
        alpha: real,
        update: bool,
        rng: &mut Rng,
        error: &mut [real],
    ) {
        let _guard = self.output_weights.guard(self.config.sync_sgd);
        for k in 0..self.config.negative + 1 {
            let (sample, label) = if k == 0 {
                (target, 1.0)
            } else {
                let sample = sample_unigram(&self.unigram_table, rng);
                if sample == target {
                    continue;
                }
                (sample, 0.0)
            };

            let x = self.output_weights.dot_row(sample, hidden);
            let pred = if x >= MAX_EXP {
                1.0
            } else if x <= -MAX_EXP {
                0.0
            } else {
                sigmoid(x)
            };
            let err = alpha * (label - pred);

            self.output_weights.accumulate_row(sample, error, err);
            if update {
                self.output_weights.add_to_row(sample, hidden, err);
            }
        }
    }

    /// Infer a vector for one sentence by gradient descent against frozen
    /// model weights. For batch training of sentence vectors, train with
    /// `sent_vector` set instead.
    pub fn sent_vec(&self, sentence: &str) -> Result<Vec<real>> {
        let sen: Vec<usize> = self.vocab.tokenize(sentence).into_iter().flatten().collect();
        if sen.is_empty() {
            return Err(ModelError::InvalidInput(
                "sentence is too short, or all words are OOV".into(),
            ));
        }

        let inferred = WeightMatrix::zeros(1, self.config.dimension);
        let sent_vec = inferred.row(0);
        let mut rng = Rng(self.config.seed);
        let kernel = self.kernel(true);

        for k in 0..self.config.iterations {
            let alpha =
                self.config.learning_rate * (1.0 - k as real / self.config.iterations as real);
            for pos in 0..sen.len() {
                self.train_word(kernel, &sen, pos, Some(sent_vec), alpha, false, &mut rng);
            }
        }

        Ok(inferred.row_to_vec(0))
    }

    /// Infer one vector per line of `input_file` into the sentence-weight
    /// table. Lines that cannot be inferred (empty, or all OOV) get a zero
    /// vector.
    pub fn sent_vectors(&mut self, input_file: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(input_file)?);
        let d = self.config.dimension;

        let mut rows: Vec<real> = Vec::new();
        let mut n_rows = 0;
        for line in reader.lines() {
            let line = line?;
            match self.sent_vec(&line) {
                Ok(v) => rows.extend(v),
                Err(_) => rows.extend(std::iter::repeat(0.0).take(d)),
            }
            n_rows += 1;
        }
        self.sent_weights = WeightMatrix::from_vec(n_rows, d, &rows);
        Ok(())
    }
}
