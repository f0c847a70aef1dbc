use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use bivec::{BilingualModel, MonolingualModel, Policy};

#[derive(Parser)]
#[command(about = "align two trained models: induce a lexicon and fit a linear mapping", long_about = None)]
struct Options {
    /// Source model saved by the training tool
    #[arg(long = "src", value_name = "FILE")]
    src_model: PathBuf,

    /// Target model saved by the training tool
    #[arg(long = "trg", value_name = "FILE")]
    trg_model: PathBuf,

    /// Induce over the N most frequent source terms (0 = all)
    #[arg(long = "src-count", default_value_t = 0)]
    src_count: usize,

    /// Induce over the N most frequent target terms (0 = all)
    #[arg(long = "trg-count", default_value_t = 0)]
    trg_count: usize,

    /// Which weights to compare: 0 input, 1 concat, 2 sum, 3 output
    #[arg(long, default_value_t = 0)]
    policy: i64,

    /// Print the induced dictionary
    #[arg(long = "print-dict")]
    print_dict: bool,

    /// Skip the mapping fit and only induce the dictionary
    #[arg(long = "dict-only")]
    dict_only: bool,

    /// Save the aligned bilingual model to FILE
    #[arg(long = "output", value_name = "FILE")]
    output_file: Option<PathBuf>,
}

fn run(options: Options) -> Result<()> {
    let policy = Policy::from_int(options.policy)?;
    let src = MonolingualModel::load(&options.src_model).context("error loading source model")?;
    let trg = MonolingualModel::load(&options.trg_model).context("error loading target model")?;
    let mut model = BilingualModel::from_models(src, trg);

    let dict = model
        .dictionary_induction_top(options.src_count, options.trg_count, policy)
        .context("dictionary induction failed")?;
    if options.print_dict {
        for (src_word, trg_word) in &dict {
            println!("{src_word}\t{trg_word}");
        }
    }

    if !options.dict_only {
        model.learn_mapping(&dict).context("mapping fit failed")?;
    }

    if let Some(file) = &options.output_file {
        model.save(file).context("error saving bilingual model")?;
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
