//! Dictionary induction and linear-mapping alignment between two models.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use bivec::{
    cosine_similarity, BilingualModel, Config, ModelError, MonolingualModel, Policy,
};

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("bivec-bi-{}-{name}", std::process::id()));
    let mut f = File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

fn align_config(threads: usize) -> Config {
    Config {
        dimension: 6,
        min_count: 1,
        window_size: 2,
        negative: 5,
        hierarchical_softmax: false,
        skip_gram: true,
        sent_vector: false,
        subsampling: 0.0,
        learning_rate: 0.1,
        iterations: 25,
        threads,
        no_average: false,
        verbose: false,
        seed: 3,
        sync_sgd: true,
    }
}

/// Source and target corpora with the same token structure under renamed
/// vocabularies. A single line keeps training single-chunked (and therefore
/// deterministic) at any thread count, so both models end up with identical
/// weights for corresponding words: a=x, b=y, c=z.
fn aligned_pair(threads: usize) -> BilingualModel {
    let src_path = temp_file("src", &format!("{}\n", "a b c ".repeat(30).trim_end()));
    let trg_path = temp_file("trg", &format!("{}\n", "x y z ".repeat(30).trim_end()));

    let mut src = MonolingualModel::new(align_config(threads)).unwrap();
    src.train(&src_path, true).unwrap();
    let mut trg = MonolingualModel::new(align_config(threads)).unwrap();
    trg.train(&trg_path, true).unwrap();
    BilingualModel::from_models(src, trg)
}

#[test]
fn induction_finds_the_renamed_words() {
    let model = aligned_pair(1);
    let dict = model.dictionary_induction_top(0, 0, Policy::Input).unwrap();

    let mut pairs: Vec<(String, String)> = dict;
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("a".to_string(), "x".to_string()),
            ("b".to_string(), "y".to_string()),
            ("c".to_string(), "z".to_string()),
        ]
    );
}

#[test]
fn induction_is_independent_of_thread_count() {
    let serial = aligned_pair(1);
    let parallel = aligned_pair(2);

    let dict1 = serial.dictionary_induction_top(0, 0, Policy::Input).unwrap();
    let dict2 = parallel
        .dictionary_induction_top(0, 0, Policy::Input)
        .unwrap();
    assert_eq!(dict1, dict2);
}

#[test]
fn induction_respects_count_limits() {
    let model = aligned_pair(1);
    let dict = model.dictionary_induction_top(2, 0, Policy::Input).unwrap();
    assert_eq!(dict.len(), 2);

    let explicit = model
        .dictionary_induction(
            &["a".to_string(), "missing".to_string()],
            &["x".to_string(), "y".to_string(), "z".to_string()],
            Policy::Input,
        )
        .unwrap();
    assert_eq!(explicit, vec![("a".to_string(), "x".to_string())]);
}

#[test]
fn bilingual_distance_is_not_halved() {
    let model = aligned_pair(1);
    let sim = model.similarity("a", "y", Policy::Input).unwrap();
    let dist = model.distance("a", "y", Policy::Input).unwrap();
    assert_eq!(dist, 1.0 - sim);

    // unknown on either side means zero similarity, not an error
    assert_eq!(model.similarity("a", "nope", Policy::Input).unwrap(), 0.0);
    assert_eq!(model.distance("nope", "y", Policy::Input).unwrap(), 1.0);
}

#[test]
fn cross_lingual_neighbors() {
    let model = aligned_pair(1);

    let closest = model.trg_closest("a", 1, Policy::Input).unwrap();
    assert_eq!(closest[0].0, "x");
    assert!((closest[0].1 - 1.0).abs() < 1e-5);

    let closest = model.src_closest("z", 1, Policy::Input).unwrap();
    assert_eq!(closest[0].0, "c");

    assert!(matches!(
        model.trg_closest("nope", 1, Policy::Input),
        Err(ModelError::Oov(_))
    ));
}

#[test]
fn cross_lingual_sequence_similarities() {
    let model = aligned_pair(1);

    let ngrams = model
        .similarity_ngrams("a nope", "x qqqq", Policy::Input)
        .unwrap();
    assert!((ngrams - 1.0).abs() < 1e-5);

    assert!(matches!(
        model.similarity_ngrams("nope nope", "qqqq qqqq", Policy::Input),
        Err(ModelError::AllOov)
    ));
    assert!(matches!(
        model.similarity_ngrams("a b", "x", Policy::Input),
        Err(ModelError::ShapeMismatch { .. })
    ));

    let sentence = model
        .similarity_sentence("a b c", "x y z", Policy::Input)
        .unwrap();
    assert!((sentence - 1.0).abs() < 1e-5);
    assert_eq!(
        model
            .similarity_sentence("nope", "qqqq", Policy::Input)
            .unwrap(),
        0.0
    );
}

#[test]
fn mapping_learns_the_identity_between_twin_spaces() {
    let mut model = aligned_pair(1);

    assert!(matches!(
        model.map_vec(&[0.0; 6]),
        Err(ModelError::InvalidInput(_))
    ));

    let dict = model.dictionary_induction_top(0, 0, Policy::Input).unwrap();
    model.learn_mapping(&dict).unwrap();
    assert!(model.mapping().is_some());

    for (src_word, trg_word) in [("a", "x"), ("b", "y"), ("c", "z")] {
        let v = model.src_model.word_vec(src_word, Policy::Input).unwrap();
        let mapped = model.map_vec(&v).unwrap();
        let target = model.trg_model.word_vec(trg_word, Policy::Input).unwrap();
        let sim = cosine_similarity(&mapped, &target);
        assert!(
            sim > 0.8,
            "mapped {src_word} should land near {trg_word}, cosine {sim}"
        );
    }

    assert!(matches!(
        model.map_vec(&[0.0; 3]),
        Err(ModelError::ShapeMismatch { .. })
    ));

    let closest = model.mapped_closest("a", 1).unwrap();
    assert_eq!(closest[0].0, "x");
}

#[test]
fn mapping_rejects_a_dictionary_of_strangers() {
    let mut model = aligned_pair(1);
    let dict = vec![("nope".to_string(), "qqqq".to_string())];
    assert!(matches!(
        model.learn_mapping(&dict),
        Err(ModelError::InvalidInput(_))
    ));
}
