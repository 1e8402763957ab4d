//! Fixed-length bit-vector encoding of a station selection, with the
//! randomized variation operators used by the driver.
//!
//! All operators draw from a caller-supplied `Rng`, so a seeded generator
//! reproduces every chromosome exactly.

use rand::Rng;
use std::fmt;

/// Bit `i` set means candidate station `i` is built.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Chromosome {
    bits: Vec<bool>,
}

impl Chromosome {
    /// The empty selection over `len` candidates.
    pub fn zeros(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// Each bit is set independently with probability `density`.
    pub fn random<R: Rng>(len: usize, density: f64, rng: &mut R) -> Self {
        let bits = (0..len).map(|_| rng.gen_bool(density)).collect();
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, i: usize) -> bool {
        self.bits[i]
    }

    /// Indices of the selected stations, ascending.
    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
    }

    pub fn count_selected(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Uniform crossover: every position is swapped between the two children
    /// with probability 0.5. Station order carries no meaning, so there is no
    /// positional bias to preserve.
    pub fn uniform_crossover<R: Rng>(a: &Self, b: &Self, rng: &mut R) -> (Self, Self) {
        debug_assert_eq!(a.len(), b.len());
        let mut c1 = a.clone();
        let mut c2 = b.clone();
        for i in 0..c1.len() {
            if rng.gen_bool(0.5) {
                std::mem::swap(&mut c1.bits[i], &mut c2.bits[i]);
            }
        }
        (c1, c2)
    }

    /// Flip each bit independently with probability `rate`.
    pub fn mutate<R: Rng>(&mut self, rate: f64, rng: &mut R) {
        for bit in self.bits.iter_mut() {
            if rng.gen_bool(rate) {
                *bit = !*bit;
            }
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.bits {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}
