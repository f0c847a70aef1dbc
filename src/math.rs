use std::sync::OnceLock;

use crate::real;

pub const MAX_EXP: real = 6.0;
pub const EXP_TABLE_SIZE: usize = 1000;

pub fn dot(a: &[real], b: &[real]) -> real {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(&a, &b)| a * b).sum()
}

pub fn norm(v: &[real]) -> real {
    v.iter().copied().map(|e| e * e).sum::<real>().sqrt()
}

/// Scale `v` to unit length. A zero vector is left untouched.
pub fn normalize(v: &mut [real]) {
    let len = norm(v);
    if len > 0.0 {
        for e in v {
            *e /= len;
        }
    }
}

/// Cosine similarity; 0.0 when either vector has no mass.
pub fn cosine_similarity(a: &[real], b: &[real]) -> real {
    let len = norm(a) * norm(b);
    if len == 0.0 {
        0.0
    } else {
        dot(a, b) / len
    }
}

fn exp_table() -> &'static [real] {
    static TABLE: OnceLock<Vec<real>> = OnceLock::new();
    TABLE.get_or_init(|| {
        (0..EXP_TABLE_SIZE)
            .map(|i| {
                let x = (i as real / EXP_TABLE_SIZE as real * 2.0 - 1.0) * MAX_EXP;
                let e = (x as f64).exp() as real;
                e / (e + 1.0)
            })
            .collect()
    })
}

/// Tabulated logistic function over [-MAX_EXP, MAX_EXP], clamped to 0 and 1
/// beyond that range.
pub fn sigmoid(x: real) -> real {
    if x >= MAX_EXP {
        1.0
    } else if x <= -MAX_EXP {
        0.0
    } else {
        exp_table()[((x + MAX_EXP) / (2.0 * MAX_EXP) * EXP_TABLE_SIZE as real) as usize]
    }
}

/// The word2vec linear-congruential generator. Cheap, seedable, and good
/// enough for sampling decisions; every worker thread owns one.
pub struct Rng(pub u64);

impl Rng {
    pub fn rand_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(25214903917).wrapping_add(11);
        self.0
    }

    /// Get a uniformly distributed random number in `0.0 .. 1.0`.
    pub fn rand_real(&mut self) -> real {
        (self.rand_u64() & 0xFFFF) as real / 65536.0
    }

    /// Uniform draw from `0 .. n`. The low bits of the generator are weak,
    /// so the high half is used.
    pub fn rand_range(&mut self, n: usize) -> usize {
        (self.rand_u64() >> 16) as usize % n
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rand_range(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_clamps_and_is_monotone() {
        assert_eq!(sigmoid(MAX_EXP + 1.0), 1.0);
        assert_eq!(sigmoid(-MAX_EXP - 1.0), 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 0.01);
        assert!(sigmoid(2.0) > sigmoid(1.0));
        assert!(sigmoid(-2.0) < sigmoid(-1.0));
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = Rng(7);
        let mut items: Vec<usize> = (0..100).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<usize>>());
    }
}
