use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use bivec::{Config, MonolingualModel, Policy};

#[derive(Parser)]
#[command(about = "word and sentence vector estimation toolkit", long_about = None)]
struct Options {
    /// Use text data from FILE to train the model
    #[arg(long = "train", value_name = "FILE")]
    train_file: PathBuf,

    /// Use FILE to save the resulting word vectors
    #[arg(long = "output", value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Save the complete model to FILE
    #[arg(long = "save-model", value_name = "FILE")]
    model_file: Option<PathBuf>,

    /// Save the per-line sentence vectors to FILE (needs --sent-vector)
    #[arg(long = "sent-output", value_name = "FILE")]
    sent_output_file: Option<PathBuf>,

    /// Set size of word vectors
    #[arg(long = "size", default_value_t = 100)]
    dimension: usize,

    /// Set max skip length between words
    #[arg(long, default_value_t = 5)]
    window: usize,

    /// Set threshold for occurrence of words. Those that appear with higher
    /// frequency in the training data will be randomly down-sampled
    #[arg(long, default_value_t = 1e-3)]
    sample: f32,

    /// Use Hierarchical Softmax
    #[arg(long)]
    hs: bool,

    /// Number of negative examples; common values are 3 - 10 (0 = not used)
    #[arg(long, default_value_t = 5)]
    negative: usize,

    /// Use N threads
    #[arg(long = "threads", value_name = "N", default_value_t = 4)]
    num_threads: usize,

    /// Run more training iterations
    #[arg(long, default_value_t = 5)]
    iter: usize,

    /// Discard words that appear less than N times
    #[arg(long = "min-count", value_name = "N", default_value_t = 5)]
    min_count: u64,

    /// Set the starting learning rate
    #[arg(long, default_value_t = 0.05)]
    alpha: f32,

    /// Use the skip-gram model (otherwise, continuous bag of words)
    #[arg(long = "skip-gram")]
    skip_gram: bool,

    /// Jointly train one vector per input line
    #[arg(long = "sent-vector")]
    sent_vector: bool,

    /// CBOW combines context vectors by sum instead of mean
    #[arg(long = "no-average")]
    no_average: bool,

    /// Serialize weight updates for reproducible training
    #[arg(long)]
    sync: bool,

    /// Seed for the random generators
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Which weights to export: 0 input, 1 concat, 2 sum, 3 output
    #[arg(long, default_value_t = 0)]
    policy: i64,

    /// Normalize vectors before exporting
    #[arg(long)]
    norm: bool,

    /// Save the word vectors in binary mode
    #[arg(long)]
    binary: bool,

    /// Print progress during training
    #[arg(long, short)]
    verbose: bool,
}

fn run(options: Options) -> Result<()> {
    let config = Config {
        dimension: options.dimension,
        min_count: options.min_count,
        window_size: options.window,
        negative: options.negative,
        hierarchical_softmax: options.hs,
        skip_gram: options.skip_gram,
        sent_vector: options.sent_vector,
        subsampling: options.sample,
        learning_rate: options.alpha,
        iterations: options.iter,
        threads: options.num_threads,
        no_average: options.no_average,
        verbose: options.verbose,
        seed: options.seed,
        sync_sgd: options.sync,
    };
    let policy = Policy::from_int(options.policy)?;

    let mut model = MonolingualModel::new(config).context("invalid configuration")?;
    model
        .train(&options.train_file, true)
        .context("training failed")?;

    if let Some(file) = &options.output_file {
        if options.binary {
            model.save_vectors_bin(file, policy, options.norm)
        } else {
            model.save_vectors(file, policy, options.norm)
        }
        .context("error writing word vectors")?;
    }
    if let Some(file) = &options.sent_output_file {
        model
            .save_sent_vectors(file, options.norm)
            .context("error writing sentence vectors")?;
    }
    if let Some(file) = &options.model_file {
        model.save(file).context("error saving model")?;
    }
    Ok(())
}

fn main() {
    let options = Options::parse();
    if let Err(err) = run(options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
