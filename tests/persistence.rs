//! Vector export round trips and whole-model save/load.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use bivec::{norm, Config, MonolingualModel, Policy, Vectors};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("bivec-persist-{}-{name}", std::process::id()))
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = temp_path(name);
    let mut f = File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

fn save_config() -> Config {
    Config {
        dimension: 5,
        min_count: 1,
        window_size: 2,
        negative: 5,
        hierarchical_softmax: true,
        skip_gram: false,
        sent_vector: false,
        subsampling: 0.0,
        learning_rate: 0.05,
        iterations: 4,
        threads: 1,
        no_average: false,
        verbose: false,
        seed: 11,
        sync_sgd: true,
    }
}

fn trained_model() -> MonolingualModel {
    let corpus = "a b c d e\n".repeat(30);
    let path = temp_file("corpus", &corpus);
    let mut model = MonolingualModel::new(save_config()).unwrap();
    model.train(&path, true).unwrap();
    model
}

fn bits(v: &[f32]) -> Vec<u32> {
    v.iter().map(|x| x.to_bits()).collect()
}

#[test]
fn binary_export_round_trips_exactly() {
    let model = trained_model();
    let path = temp_path("vectors.bin");
    model.save_vectors_bin(&path, Policy::Input, false).unwrap();

    let vectors = Vectors::load_bin(&path).unwrap();
    assert_eq!(vectors.num_words(), 5);
    assert_eq!(vectors.size(), 5);

    for word in ["a", "b", "c", "d", "e"] {
        let i = vectors.lookup_word(word).unwrap();
        let original = model.word_vec(word, Policy::Input).unwrap();
        assert_eq!(bits(&vectors[i]), bits(&original), "word {word}");
    }
}

#[test]
fn text_export_round_trips_exactly() {
    let model = trained_model();
    let path = temp_path("vectors.txt");
    model.save_vectors(&path, Policy::Input, false).unwrap();

    let vectors = Vectors::load_text(&path).unwrap();
    assert_eq!(vectors.num_words(), 5);

    // the shortest-round-trip float formatting parses back bit-for-bit
    for word in ["a", "b", "c", "d", "e"] {
        let i = vectors.lookup_word(word).unwrap();
        let original = model.word_vec(word, Policy::Input).unwrap();
        assert_eq!(bits(&vectors[i]), bits(&original), "word {word}");
    }
}

#[test]
fn text_export_is_in_frequency_order() {
    let corpus = format!("{}{}", "often often rare\n".repeat(10), "often\n");
    let path = temp_file("freq-corpus", &corpus);
    let mut model = MonolingualModel::new(save_config()).unwrap();
    model.train(&path, true).unwrap();

    let out = temp_path("freq-vectors.txt");
    model.save_vectors(&out, Policy::Input, false).unwrap();
    let contents = std::fs::read_to_string(&out).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next().unwrap(), "2 5");
    assert!(lines.next().unwrap().starts_with("often "));
    assert!(lines.next().unwrap().starts_with("rare "));
}

#[test]
fn normalized_export_has_unit_rows() {
    let model = trained_model();
    let path = temp_path("vectors-norm.bin");
    model.save_vectors_bin(&path, Policy::Input, true).unwrap();

    let vectors = Vectors::load_bin(&path).unwrap();
    for i in 0..vectors.num_words() {
        assert!((norm(&vectors[i]) - 1.0).abs() < 1e-5);
    }
}

#[test]
fn concat_export_doubles_the_header_width() {
    let model = trained_model();
    let path = temp_path("vectors-concat.txt");
    model.save_vectors(&path, Policy::Concat, false).unwrap();

    let vectors = Vectors::load_text(&path).unwrap();
    assert_eq!(vectors.size(), 10);
}

#[test]
fn model_round_trip_preserves_everything() {
    let model = trained_model();
    let path = temp_path("model.bin");
    model.save(&path).unwrap();

    let loaded = MonolingualModel::load(&path).unwrap();
    assert_eq!(loaded.vocab().len(), model.vocab().len());
    assert_eq!(loaded.training_words(), model.training_words());
    assert_eq!(loaded.training_lines(), model.training_lines());

    for word in ["a", "b", "c", "d", "e"] {
        assert_eq!(
            loaded.vocab().lookup(word),
            model.vocab().lookup(word),
            "index of {word}"
        );
        for policy in [Policy::Input, Policy::Concat, Policy::Sum, Policy::Output] {
            assert_eq!(
                bits(&loaded.word_vec(word, policy).unwrap()),
                bits(&model.word_vec(word, policy).unwrap()),
                "word {word}, policy {policy:?}"
            );
        }
    }

    assert_eq!(
        loaded.similarity("a", "b", Policy::Input).unwrap(),
        model.similarity("a", "b", Policy::Input).unwrap()
    );
}

#[test]
fn loaded_model_can_keep_training() {
    let corpus = "a b c d e\n".repeat(30);
    let corpus_path = temp_file("more-corpus", &corpus);
    let model = trained_model();
    let path = temp_path("model-continue.bin");
    model.save(&path).unwrap();

    let mut loaded = MonolingualModel::load(&path).unwrap();
    loaded.train(&corpus_path, false).unwrap();
    let v = loaded.word_vec("a", Policy::Input).unwrap();
    assert!(v.iter().all(|x| x.is_finite()));
}

#[test]
fn sentence_vectors_survive_the_round_trip() {
    let corpus = "a b c\nb c a\nc a b\n".repeat(4);
    let path = temp_file("sent-corpus", &corpus);
    let config = Config {
        sent_vector: true,
        skip_gram: true,
        ..save_config()
    };
    let mut model = MonolingualModel::new(config).unwrap();
    model.train(&path, true).unwrap();

    let model_path = temp_path("sent-model.bin");
    model.save(&model_path).unwrap();
    let loaded = MonolingualModel::load(&model_path).unwrap();

    let original_out = temp_path("sent-original.txt");
    let loaded_out = temp_path("sent-loaded.txt");
    model.save_sent_vectors(&original_out, false).unwrap();
    loaded.save_sent_vectors(&loaded_out, false).unwrap();
    assert_eq!(
        std::fs::read_to_string(&original_out).unwrap(),
        std::fs::read_to_string(&loaded_out).unwrap()
    );
}

#[test]
fn loading_garbage_fails_cleanly() {
    let path = temp_file("garbage.bin", "this is not a model");
    assert!(MonolingualModel::load(&path).is_err());
    assert!(MonolingualModel::load(&temp_path("no-such-model.bin")).is_err());
}
