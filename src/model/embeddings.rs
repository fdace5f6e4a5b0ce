//! Context (C) and target (T) entity vectors, stored as one D×2W
//! column-major matrix: columns `0..W` are C, columns `W..2W` are T.

use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{ArrayView1, ArrayViewMut1};

use crate::model::shared::SharedBuffer;
use crate::rng::Xoroshiro128Plus;

pub struct Embeddings {
    data: SharedBuffer,
    dim: usize,
    num_entities: usize,
    v_steps: Vec<AtomicU64>,
}

impl Embeddings {
    /// i.i.d. Gaussian(0, 1/sqrt(dim)) init; C and T columns start
    /// identical (spec.md §3 "Entities").
    pub fn init(dim: usize, num_entities: usize, rng: &mut Xoroshiro128Plus) -> Self {
        let std_dev = 1.0 / (dim as f64).sqrt();
        let mut half = vec![0.0f32; dim * num_entities];
        for v in half.iter_mut() {
            *v = rng.next_gaussian(0.0, std_dev) as f32;
        }
        let mut full = Vec::with_capacity(dim * num_entities * 2);
        full.extend_from_slice(&half);
        full.append(&mut half);

        let v_steps = (0..num_entities * 2).map(|_| AtomicU64::new(0)).collect();
        Self {
            data: SharedBuffer::from_vec(full),
            dim,
            num_entities,
            v_steps,
        }
    }

    pub fn from_parts(dim: usize, num_entities: usize, data: Vec<f32>, v_steps: Vec<u64>) -> Self {
        assert_eq!(data.len(), dim * num_entities * 2);
        assert_eq!(v_steps.len(), num_entities * 2);
        Self {
            data: SharedBuffer::from_vec(data),
            dim,
            num_entities,
            v_steps: v_steps.into_iter().map(AtomicU64::new).collect(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_entities(&self) -> usize {
        self.num_entities
    }

    /// Column index of the context vector for entity `i`.
    #[inline]
    pub fn context_col(&self, i: u32) -> usize {
        i as usize
    }

    /// Column index of the target vector for entity `i`.
    #[inline]
    pub fn target_col(&self, i: u32) -> usize {
        self.num_entities + i as usize
    }

    pub fn column(&self, col: usize) -> ArrayView1<'_, f32> {
        ArrayView1::from(self.data.slice(col * self.dim, self.dim))
    }

    #[allow(clippy::mut_from_ref)]
    pub fn column_mut(&self, col: usize) -> ArrayViewMut1<'_, f32> {
        ArrayViewMut1::from(self.data.slice_mut(col * self.dim, self.dim))
    }

    pub fn step(&self, col: usize) -> u64 {
        self.v_steps[col].load(Ordering::Relaxed)
    }

    pub fn add_steps(&self, col: usize, by: u64) {
        self.v_steps[col].fetch_add(by, Ordering::Relaxed);
    }

    pub fn steps_snapshot(&self) -> Vec<u64> {
        self.v_steps.iter().map(|s| s.load(Ordering::Relaxed)).collect()
    }

    pub fn data_snapshot(&self) -> &[f32] {
        self.data.as_slice_exclusive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_and_target_start_identical() {
        let mut rng = Xoroshiro128Plus::seeded(1);
        let emb = Embeddings::init(8, 4, &mut rng);
        for i in 0..4u32 {
            let c = emb.column(emb.context_col(i));
            let t = emb.column(emb.target_col(i));
            assert_eq!(c.to_vec(), t.to_vec());
        }
    }

    #[test]
    fn steps_start_at_zero() {
        let mut rng = Xoroshiro128Plus::seeded(1);
        let emb = Embeddings::init(8, 4, &mut rng);
        assert!(emb.steps_snapshot().iter().all(|&s| s == 0));
    }
}
