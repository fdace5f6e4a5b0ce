//! Relation matrices (forward + inverse), stored as 2R flattened D×D
//! column-major blocks in one buffer.

use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{ArrayView2, ArrayViewMut2, ShapeBuilder};

use crate::model::shared::SharedBuffer;
use crate::rng::Xoroshiro128Plus;

pub struct Relations {
    data: SharedBuffer,
    dim: usize,
    num_relations: usize,
    m_steps: Vec<AtomicU64>,
}

impl Relations {
    /// Near-identity init: Gaussian(0, 0.5/sqrt(dim)) noise with 0.5
    /// added to the diagonal, so relations start close to a damped
    /// identity map (spec.md §3 "Relations").
    pub fn init(dim: usize, num_relations: usize, rng: &mut Xoroshiro128Plus) -> Self {
        let std_dev = 0.5 / (dim as f64).sqrt();
        let total = num_relations * 2;
        let mut data = vec![0.0f32; dim * dim * total];
        for r in 0..total {
            let base = r * dim * dim;
            for j in 0..dim {
                for i in 0..dim {
                    let mut v = rng.next_gaussian(0.0, std_dev) as f32;
                    if i == j {
                        v += 0.5;
                    }
                    data[base + j * dim + i] = v;
                }
            }
        }
        let m_steps = (0..total).map(|_| AtomicU64::new(0)).collect();
        Self {
            data: SharedBuffer::from_vec(data),
            dim,
            num_relations,
            m_steps,
        }
    }

    pub fn from_parts(dim: usize, num_relations: usize, data: Vec<f32>, m_steps: Vec<u64>) -> Self {
        let total = num_relations * 2;
        assert_eq!(data.len(), dim * dim * total);
        assert_eq!(m_steps.len(), total);
        Self {
            data: SharedBuffer::from_vec(data),
            dim,
            num_relations,
            m_steps: m_steps.into_iter().map(AtomicU64::new).collect(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_relations(&self) -> usize {
        self.num_relations
    }

    pub fn matrix(&self, r: usize) -> ArrayView2<'_, f32> {
        let base = r * self.dim * self.dim;
        let slice = self.data.slice(base, self.dim * self.dim);
        ArrayView2::from_shape((self.dim, self.dim).f(), slice).expect("fixed relation shape")
    }

    #[allow(clippy::mut_from_ref)]
    pub fn matrix_mut(&self, r: usize) -> ArrayViewMut2<'_, f32> {
        let base = r * self.dim * self.dim;
        let slice = self.data.slice_mut(base, self.dim * self.dim);
        ArrayViewMut2::from_shape((self.dim, self.dim).f(), slice).expect("fixed relation shape")
    }

    pub fn step(&self, r: usize) -> u64 {
        self.m_steps[r].load(Ordering::Relaxed)
    }

    /// Atomically increments and returns the value *after* increment,
    /// so a caller sees exactly its own call's step count even under
    /// concurrent increments from other workers.
    pub fn incr_step(&self, r: usize) -> u64 {
        self.m_steps[r].fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn steps_snapshot(&self) -> Vec<u64> {
        self.m_steps.iter().map(|s| s.load(Ordering::Relaxed)).collect()
    }

    pub fn data_snapshot(&self) -> &[f32] {
        self.data.as_slice_exclusive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_is_biased_toward_identity() {
        let mut rng = Xoroshiro128Plus::seeded(5);
        let rel = Relations::init(4, 2, &mut rng);
        let m = rel.matrix(0);
        let diag_mean: f32 = (0..4).map(|i| m[[i, i]]).sum::<f32>() / 4.0;
        assert!(diag_mean > 0.2);
    }

    #[test]
    fn matrix_count_covers_forward_and_inverse() {
        let mut rng = Xoroshiro128Plus::seeded(5);
        let rel = Relations::init(3, 2, &mut rng);
        assert_eq!(rel.steps_snapshot().len(), 4);
    }
}
