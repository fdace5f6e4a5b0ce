//! Auxiliary matrix autoencoder: K encoder/decoder bases, each a
//! flattened D×D column-major matrix, used to co-regularize the
//! relation matrices (spec.md §3 "Autoencoder", §4.5).

use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{ArrayView2, ArrayViewMut2, ShapeBuilder};

use crate::model::shared::SharedBuffer;
use crate::rng::Xoroshiro128Plus;

pub struct Autoencoder {
    encoder: SharedBuffer,
    decoder: SharedBuffer,
    dim: usize,
    num_bases: usize,
    denc_step: AtomicU64,
}

impl Autoencoder {
    /// Encoder and decoder bases start out identical: one Gaussian(0,
    /// 1/sqrt(dim)) sample is drawn per basis and copied into both.
    pub fn init(dim: usize, num_bases: usize, rng: &mut Xoroshiro128Plus) -> Self {
        let std_dev = 1.0 / (dim as f64).sqrt();
        let mut shared = vec![0.0f32; dim * dim * num_bases];
        for v in shared.iter_mut() {
            *v = rng.next_gaussian(0.0, std_dev) as f32;
        }
        Self {
            encoder: SharedBuffer::from_vec(shared.clone()),
            decoder: SharedBuffer::from_vec(shared),
            dim,
            num_bases,
            denc_step: AtomicU64::new(0),
        }
    }

    pub fn from_parts(dim: usize, num_bases: usize, encoder: Vec<f32>, decoder: Vec<f32>, denc_step: u64) -> Self {
        assert_eq!(encoder.len(), dim * dim * num_bases);
        assert_eq!(decoder.len(), dim * dim * num_bases);
        Self {
            encoder: SharedBuffer::from_vec(encoder),
            decoder: SharedBuffer::from_vec(decoder),
            dim,
            num_bases,
            denc_step: AtomicU64::new(denc_step),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_bases(&self) -> usize {
        self.num_bases
    }

    pub fn encoder_basis(&self, k: usize) -> ArrayView2<'_, f32> {
        let base = k * self.dim * self.dim;
        let slice = self.encoder.slice(base, self.dim * self.dim);
        ArrayView2::from_shape((self.dim, self.dim).f(), slice).expect("fixed basis shape")
    }

    #[allow(clippy::mut_from_ref)]
    pub fn encoder_basis_mut(&self, k: usize) -> ArrayViewMut2<'_, f32> {
        let base = k * self.dim * self.dim;
        let slice = self.encoder.slice_mut(base, self.dim * self.dim);
        ArrayViewMut2::from_shape((self.dim, self.dim).f(), slice).expect("fixed basis shape")
    }

    pub fn decoder_basis(&self, k: usize) -> ArrayView2<'_, f32> {
        let base = k * self.dim * self.dim;
        let slice = self.decoder.slice(base, self.dim * self.dim);
        ArrayView2::from_shape((self.dim, self.dim).f(), slice).expect("fixed basis shape")
    }

    #[allow(clippy::mut_from_ref)]
    pub fn decoder_basis_mut(&self, k: usize) -> ArrayViewMut2<'_, f32> {
        let base = k * self.dim * self.dim;
        let slice = self.decoder.slice_mut(base, self.dim * self.dim);
        ArrayViewMut2::from_shape((self.dim, self.dim).f(), slice).expect("fixed basis shape")
    }

    pub fn step(&self) -> u64 {
        self.denc_step.load(Ordering::Relaxed)
    }

    /// Atomically increments and returns the value *before* increment,
    /// matching `denc_step.fetch_add(1, ...)` in the original kernel.
    pub fn incr_step(&self) -> u64 {
        self.denc_step.fetch_add(1, Ordering::Relaxed)
    }

    pub fn encoder_snapshot(&self) -> &[f32] {
        self.encoder.as_slice_exclusive()
    }

    pub fn decoder_snapshot(&self) -> &[f32] {
        self.decoder.as_slice_exclusive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_and_decoder_start_identical() {
        let mut rng = Xoroshiro128Plus::seeded(9);
        let ae = Autoencoder::init(4, 3, &mut rng);
        for k in 0..3 {
            assert_eq!(ae.encoder_basis(k).to_owned(), ae.decoder_basis(k).to_owned());
        }
    }
}
