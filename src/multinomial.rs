//! Discrete distribution sampling in O(1) via an inverted lookup table,
//! built once from a weight vector.

use crate::rng::Xoroshiro128Plus;

/// Number of buckets in the inverted table. Sampling resolution is
/// quantized to `1/SIZE` of total probability mass.
pub const TABLE_SIZE: usize = 65_536;

pub struct MultinomialTable {
    table: Vec<u32>,
    scan: Vec<f64>,
}

impl MultinomialTable {
    /// Build the table from non-negative weights. `scan[i]` holds the
    /// normalized cumulative weight up to and including item `i`.
    pub fn from_weights(weights: impl Iterator<Item = f64>, size: usize) -> Self {
        let mut scan: Vec<f64> = Vec::new();
        let mut total = 0.0;
        for w in weights {
            total += w;
            scan.push(total);
        }

        let mut table = vec![0u32; size + 1];
        let mut lower = 0usize;
        let n = scan.len() as u32;
        for (i, cdf) in scan.iter_mut().enumerate() {
            *cdf /= total;
            let higher = (*cdf * size as f64) as usize;
            while lower <= higher {
                table[lower] = i as u32;
                lower += 1;
            }
        }
        table[size] = n;

        Self { table, scan }
    }

    /// Normalized cumulative probability up to and including item `i`.
    pub fn prob(&self, i: u32) -> f64 {
        self.scan[i as usize]
    }

    pub fn choices(&self) -> u32 {
        self.scan.len() as u32
    }

    pub fn sample(&self, rng: &mut Xoroshiro128Plus) -> u32 {
        let size = self.table.len() - 1;
        let i = rng.next_bounded(size as u64) as usize;
        let a = self.table[i];
        let b = self.table[i + 1];
        if b > a + 1 {
            a + rng.next_bounded((b - a) as u64) as u32
        } else {
            a
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_positive_weight_reachable() {
        let weights = vec![1.0, 0.0, 3.0, 0.0, 2.0];
        let table = MultinomialTable::from_weights(weights.into_iter(), 1024);
        let mut rng = Xoroshiro128Plus::seeded(1);
        let mut seen = [false; 5];
        for _ in 0..20_000 {
            seen[table.sample(&mut rng) as usize] = true;
        }
        assert!(seen[0]);
        assert!(!seen[1], "zero-weight item should never be sampled");
        assert!(seen[2]);
        assert!(!seen[3]);
        assert!(seen[4]);
    }

    #[test]
    fn empirical_frequency_converges_to_weight_fraction() {
        let weights = vec![1.0, 2.0, 7.0];
        let total: f64 = weights.iter().sum();
        let table = MultinomialTable::from_weights(weights.iter().copied(), TABLE_SIZE);
        let mut rng = Xoroshiro128Plus::seeded(2);
        let n = 200_000u64;
        let mut counts = [0u64; 3];
        for _ in 0..n {
            counts[table.sample(&mut rng) as usize] += 1;
        }
        for (i, &w) in weights.iter().enumerate() {
            let expected = w / total;
            let observed = counts[i] as f64 / n as f64;
            assert!(
                (expected - observed).abs() < 0.01,
                "item {i}: expected {expected}, observed {observed}"
            );
        }
    }
}
