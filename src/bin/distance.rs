use std::cmp::Reverse;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use ordered_float::OrderedFloat;

use bivec::{cosine_similarity, normalize, real, Vectors};

/// number of closest words that will be shown
const N: usize = 40;

#[derive(Parser)]
#[command(about = "interactive nearest-neighbor queries over exported word vectors", long_about = None)]
struct Options {
    /// Contains word projections in the BINARY FORMAT
    #[arg(value_name = "FILE")]
    file_name: PathBuf,

    /// Read the text format instead
    #[arg(long)]
    text: bool,
}

fn run(options: Options) -> Result<()> {
    let vectors = if options.text {
        Vectors::load_text(&options.file_name)
    } else {
        Vectors::load_bin(&options.file_name)
    }
    .context("error loading vector file")?;

    let mut line = String::new();
    'outer: loop {
        print!("Enter word or sentence (EXIT to break): ");
        let _ = std::io::stdout().flush();

        line.clear();
        match std::io::stdin().read_line(&mut line) {
            Err(err) => {
                eprintln!("error reading stdin: {err}");
                break;
            }
            Ok(0) => break,
            Ok(_) => {}
        }
        if line.trim() == "EXIT" {
            break;
        }

        let mut indices: Vec<usize> = vec![];
        for word in line.split_ascii_whitespace() {
            match vectors.lookup_word(word) {
                None => {
                    println!("Out of dictionary word: {word}");
                    continue 'outer;
                }
                Some(i) => {
                    println!("Word: {word}  Position in vocabulary: {i}");
                    indices.push(i);
                }
            }
        }
        if indices.is_empty() {
            continue;
        }

        let mut query = vec![0.0 as real; vectors.size()];
        for &i in &indices {
            for (q, x) in query.iter_mut().zip(&vectors[i]) {
                *q += x;
            }
        }
        normalize(&mut query);

        let mut best: Vec<(&str, real)> = (0..vectors.num_words())
            .filter(|i| !indices.contains(i))
            .map(|i| (vectors.word(i), cosine_similarity(&query, &vectors[i])))
            .collect();
        best.sort_unstable_by_key(|&(_, sim)| Reverse(OrderedFloat(sim)));

        println!();
        println!("                                              Word       Cosine similarity");
        println!("------------------------------------------------------------------------");
        for (word, sim) in best.iter().take(N) {
            println!("{word:>50}\t\t{sim:8.6}");
        }
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
