//! Temperature sampling over vocabulary logits.

use quill_core::{QuillError, Result, Tensor};
use rand::Rng;

/// Scale `logits` by 1/temperature and return the softmax distribution.
///
/// The maximum logit is subtracted before dividing, so the top entry stays at
/// 0 and the others go to -inf as the temperature approaches zero.
pub fn probabilities(logits: &Tensor, temperature: f32) -> Result<Tensor> {
    check_temperature(temperature)?;
    let max = logits.as_f32_slice().iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let scaled: Vec<f32> = logits
        .as_f32_slice()
        .iter()
        .map(|&l| (l - max) / temperature)
        .collect();
    Tensor::from_vec(scaled, logits.dims())?.softmax(-1)
}

/// Draw one token id from `logits` at the given temperature.
///
/// This is a true categorical draw, not argmax; low temperatures merely
/// concentrate the distribution on the highest logit.
pub fn sample<R: Rng + ?Sized>(logits: &Tensor, temperature: f32, rng: &mut R) -> Result<usize> {
    let probs = probabilities(logits, temperature)?;
    Ok(categorical_sample(probs.as_f32_slice(), rng))
}

/// Index of the largest logit. Ties resolve to the lowest index.
pub fn argmax(data: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in data.iter().enumerate() {
        if v > data[best] {
            best = i;
        }
    }
    best
}

/// Sample from a categorical distribution.
pub fn categorical_sample<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> usize {
    let r: f32 = rng.gen();
    let mut cumsum = 0.0f32;
    for (i, &p) in probs.iter().enumerate() {
        cumsum += p;
        if r < cumsum {
            return i;
        }
    }
    // Rounding left the total just under r: fall back to the last non-zero entry.
    probs.iter().rposition(|&p| p > 0.0).unwrap_or(0)
}

fn check_temperature(temperature: f32) -> Result<()> {
    if temperature.is_nan() || temperature <= 0.0 || temperature.is_infinite() {
        return Err(QuillError::InvalidArgument(format!(
            "temperature must be positive and finite, got {}",
            temperature
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn logits(v: &[f32]) -> Tensor {
        Tensor::from_f32(v, &[v.len()])
    }

    #[test]
    fn test_rejects_non_positive_temperature() {
        let mut rng = StdRng::seed_from_u64(0);
        let l = logits(&[1.0, 2.0]);
        for t in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(sample(&l, t, &mut rng), Err(QuillError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_low_temperature_concentrates_on_argmax() {
        let l = logits(&[0.1, 0.5, 0.3, 0.9, 0.2]);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            assert_eq!(sample(&l, 1e-3, &mut rng).unwrap(), 3);
        }
        assert_eq!(argmax(l.as_f32_slice()), 3);
    }

    #[test]
    fn test_tiny_temperature_picks_argmax() {
        let l = logits(&[0.1, 0.5, 0.3, 0.9, 0.2]);
        let probs = probabilities(&l, 1e-40).unwrap();
        assert_eq!(probs.as_f32_slice(), &[0.0, 0.0, 0.0, 1.0, 0.0]);

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            assert_eq!(sample(&l, 1e-40, &mut rng).unwrap(), 3);
        }
        assert_eq!(sample(&l, f32::MIN_POSITIVE / 4.0, &mut rng).unwrap(), 3);
    }

    #[test]
    fn test_high_temperature_approaches_uniform() {
        let l = logits(&[0.0, 1.0, 2.0, 3.0]);
        let probs = probabilities(&l, 1e4).unwrap();
        for &p in probs.as_f32_slice() {
            assert!((p - 0.25).abs() < 1e-3);
        }

        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            counts[sample(&l, 1e4, &mut rng).unwrap()] += 1;
        }
        for &c in &counts {
            assert!(c > 800 && c < 1200, "count {} out of expected range", c);
        }
    }

    #[test]
    fn test_sampling_is_seed_deterministic() {
        let l = logits(&[1.0, 1.0, 1.0, 1.0, 1.0]);
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20).map(|_| sample(&l, 1.0, &mut rng).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(draw(9), draw(9));
    }

    #[test]
    fn test_categorical_fallback() {
        let mut rng = StdRng::seed_from_u64(0);
        // Mass sums to less than any plausible draw
        assert_eq!(categorical_sample(&[0.0, 1e-30, 0.0], &mut rng), 1);
    }
}
