//! End-to-end behavior of the tiny V=5, D=8, L=4 model.

use proptest::prelude::*;
use quill_core::{QuillError, Tensor};
use quill_transformer::{SharedTransformer, Transformer, TransformerConfig, Vocabulary};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn tiny(seed: u64) -> Transformer {
    Transformer::with_seed(TransformerConfig::tiny(), seed).unwrap()
}

#[test]
fn forward_returns_logits_and_hidden() {
    let model = tiny(0);
    let out = model.forward(&[0, 1, 2], true).unwrap();
    assert_eq!(out.logits.dims(), &[5]);
    assert_eq!(out.hidden.dims(), &[3, 8]);
    assert!(out.logits.all_finite());
    assert!(out.hidden.all_finite());
}

#[test]
fn generate_extends_prompt() {
    let model = tiny(0);
    let mut rng = StdRng::seed_from_u64(7);
    let tokens = model.generate(&[0], 3, 1.0, &mut rng).unwrap();
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[0], 0);
    assert!(tokens.iter().all(|&t| t < 5));
}

#[test]
fn generate_past_context_window() {
    let model = tiny(0);
    let mut rng = StdRng::seed_from_u64(1);
    let tokens = model.generate(&[0, 1, 2], 10, 0.8, &mut rng).unwrap();
    assert_eq!(tokens.len(), 13);
    assert_eq!(&tokens[..3], &[0, 1, 2]);
}

#[test]
fn forward_rejects_long_and_out_of_vocab_input() {
    let model = tiny(0);
    assert!(matches!(
        model.forward(&[0, 1, 2, 3, 4], true),
        Err(QuillError::InvalidArgument(_))
    ));
    assert!(matches!(
        model.forward(&[0, 5], true),
        Err(QuillError::IndexOutOfRange { index: 5, bound: 5 })
    ));
}

#[test]
fn load_embeddings_rejects_wrong_shape() {
    let mut model = tiny(0);
    let before = model.embedding().weight().clone();
    let err = model.load_embeddings(Tensor::zeros(&[5, 9])).unwrap_err();
    assert!(matches!(err, QuillError::ShapeMismatch { .. }));
    assert_eq!(model.embedding().weight(), &before);
    assert_eq!(model.embedding().d_model(), 8);

    model.load_embeddings(Tensor::ones(&[5, 8])).unwrap();
    assert_eq!(model.embedding().weight(), &Tensor::ones(&[5, 8]));
}

#[test]
fn train_step_is_deterministic_and_leaves_weights() {
    let mut model = tiny(3);
    let logits_before = model.forward(&[0, 1], true).unwrap().logits;

    let a = model.train_step(&[0, 1], 2).unwrap();
    let b = model.train_step(&[0, 1], 2).unwrap();
    assert_eq!(a, b);
    assert!(a > 0.0);
    assert_eq!(model.training_history(), &[a, b]);
    assert_eq!(model.forward(&[0, 1], true).unwrap().logits, logits_before);
}

#[test]
fn save_load_roundtrip() {
    let mut model = tiny(11);
    model.train_step(&[1, 2, 3], 0).unwrap();

    let dir = std::env::temp_dir().join(format!("quill_scenario_{}", std::process::id()));
    model.save(&dir).unwrap();
    let loaded = Transformer::load(&dir).unwrap();

    assert_eq!(loaded.config(), model.config());
    assert_eq!(loaded.training_history(), model.training_history());
    assert_eq!(
        loaded.forward(&[1, 2, 3], true).unwrap().logits,
        model.forward(&[1, 2, 3], true).unwrap().logits
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn vocabulary_drives_generation() {
    let vocab = Vocabulary::new(["<s>", "a", "b", "c", "</s>"]).unwrap();
    let model = tiny(0);
    let prompt = vocab.encode(&["<s>", "a"]).unwrap();
    let mut rng = StdRng::seed_from_u64(2);
    let ids = model.generate(&prompt, 2, 1.0, &mut rng).unwrap();
    let words = vocab.decode(&ids).unwrap();
    assert_eq!(words.len(), 4);
    assert_eq!(&words[..2], &["<s>", "a"]);
}

#[test]
fn near_zero_temperature_is_greedy() {
    let model = tiny(6);
    let ids = [0, 1, 2];
    let logits = model.forward(&ids, true).unwrap().logits;
    let best = quill_transformer::sampler::argmax(logits.as_f32_slice());
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..10 {
        assert_eq!(model.predict_next_token(&ids, 1e-40, &mut rng).unwrap(), best);
    }
}

#[test]
fn shared_handle_generates() {
    let shared = SharedTransformer::new(tiny(0));
    let mut rng = StdRng::seed_from_u64(4);
    let out = shared.generate(&[2], 2, 1.0, &mut rng).unwrap();
    assert_eq!(out.len(), 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn generate_length_and_range(
        prompt in prop::collection::vec(0usize..5, 1..4),
        n in 1usize..8,
        seed in any::<u64>(),
    ) {
        let model = tiny(0);
        let mut rng = StdRng::seed_from_u64(seed);
        let out = model.generate(&prompt, n, 1.0, &mut rng).unwrap();
        prop_assert_eq!(out.len(), prompt.len() + n);
        prop_assert_eq!(&out[..prompt.len()], &prompt[..]);
        prop_assert!(out.iter().all(|&t| t < 5));
    }

    #[test]
    fn predictions_stay_in_vocab(
        ids in prop::collection::vec(0usize..5, 1..=4),
        temperature in 0.05f32..5.0,
        seed in any::<u64>(),
    ) {
        let model = tiny(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let t = model.predict_next_token(&ids, temperature, &mut rng).unwrap();
        prop_assert!(t < 5);
    }
}
