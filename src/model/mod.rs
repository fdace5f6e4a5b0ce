//! Trainable model state: entity embeddings, relation matrices, and
//! the auxiliary autoencoder, plus `.npy`-backed init/load/save.

pub mod autoencoder;
pub mod embeddings;
pub mod relations;
mod shared;

use std::path::Path;

use autoencoder::Autoencoder;
use embeddings::Embeddings;
use relations::Relations;

use crate::errors::KbResult;
use crate::hyperparams::Hyperparameters;
use crate::npy;
use crate::rng::Xoroshiro128Plus;

pub struct ModelState {
    pub embeddings: Embeddings,
    pub relations: Relations,
    pub autoencoder: Autoencoder,
    dim: usize,
    code_len: usize,
}

impl ModelState {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }

    pub fn num_entities(&self) -> usize {
        self.embeddings.num_entities()
    }

    pub fn num_relations(&self) -> usize {
        self.relations.num_relations()
    }

    pub fn init(dim: usize, code_len: usize, num_entities: usize, num_relations: usize, rng: &mut Xoroshiro128Plus) -> Self {
        Self {
            embeddings: Embeddings::init(dim, num_entities, rng),
            relations: Relations::init(dim, num_relations, rng),
            autoencoder: Autoencoder::init(dim, code_len, rng),
            dim,
            code_len,
        }
    }

    /// Loads a previously saved model directory; `prefix` is either
    /// empty (normal resume) or `"init_"` (exact-resume snapshot).
    pub fn load(dir: &Path, prefix: &str, num_entities: usize, num_relations: usize, dim: usize, code_len: usize) -> KbResult<Self> {
        let cvecs = npy::read_f32_array(&dir.join(format!("{prefix}cvecs.npy")), &[num_entities, dim])?;
        let tvecs = npy::read_f32_array(&dir.join(format!("{prefix}tvecs.npy")), &[num_entities, dim])?;
        let vsteps = npy::read_u64_array(&dir.join(format!("{prefix}vsteps.npy")), &[num_entities * 2])?;

        // cvecs/tvecs are already one contiguous dim-length chunk per
        // entity on both sides (npy row-major and our internal storage
        // agree), so no row/col permutation is needed here — unlike the
        // genuinely 2-D relation/basis matrices below.
        let mut emb_data = vec![0.0f32; dim * num_entities * 2];
        emb_data[..dim * num_entities].copy_from_slice(&cvecs);
        emb_data[dim * num_entities..].copy_from_slice(&tvecs);
        let embeddings = Embeddings::from_parts(dim, num_entities, emb_data, vsteps);

        let total_mats = num_relations * 2;
        let mats = npy::read_f32_array(&dir.join(format!("{prefix}mats.npy")), &[total_mats, dim, dim])?;
        let msteps = npy::read_u64_array(&dir.join(format!("{prefix}msteps.npy")), &[total_mats])?;
        let mut mat_data = vec![0.0f32; dim * dim * total_mats];
        for r in 0..total_mats {
            let row_major = &mats[r * dim * dim..(r + 1) * dim * dim];
            transpose_rows_to_cols(row_major, dim, dim, &mut mat_data[r * dim * dim..(r + 1) * dim * dim]);
        }
        let relations = Relations::from_parts(dim, num_relations, mat_data, msteps);

        let encoder_rm = npy::read_f32_array(&dir.join(format!("{prefix}encoder.npy")), &[code_len, dim, dim])?;
        let decoder_rm = npy::read_f32_array(&dir.join(format!("{prefix}decoder.npy")), &[code_len, dim, dim])?;
        let dstep = npy::read_u64_array(&dir.join(format!("{prefix}dstep.npy")), &[])?;
        let mut encoder = vec![0.0f32; dim * dim * code_len];
        let mut decoder = vec![0.0f32; dim * dim * code_len];
        for k in 0..code_len {
            transpose_rows_to_cols(&encoder_rm[k * dim * dim..(k + 1) * dim * dim], dim, dim, &mut encoder[k * dim * dim..(k + 1) * dim * dim]);
            transpose_rows_to_cols(&decoder_rm[k * dim * dim..(k + 1) * dim * dim], dim, dim, &mut decoder[k * dim * dim..(k + 1) * dim * dim]);
        }
        let autoencoder = Autoencoder::from_parts(dim, code_len, encoder, decoder, dstep[0]);

        Ok(Self {
            embeddings,
            relations,
            autoencoder,
            dim,
            code_len,
        })
    }

    /// Writes the eight tensor files plus `params.json` into `dir`,
    /// using `prefix` (`""` for normal saves, `"init_"` right after
    /// initialization so a run can be bit-for-bit resumed from zero).
    pub fn save(&self, dir: &Path, prefix: &str, hp: &Hyperparameters) -> KbResult<()> {
        std::fs::create_dir_all(dir)?;
        let w = self.num_entities();
        let d = self.dim;

        let full = self.embeddings.data_snapshot();
        npy::write_f32_array(&dir.join(format!("{prefix}cvecs.npy")), &[w, d], &full[..d * w])?;
        npy::write_f32_array(&dir.join(format!("{prefix}tvecs.npy")), &[w, d], &full[d * w..])?;
        npy::write_u64_array(&dir.join(format!("{prefix}vsteps.npy")), &[w * 2], &self.embeddings.steps_snapshot())?;

        let total_mats = self.num_relations() * 2;
        let mat_data = self.relations.data_snapshot();
        let mut mats_rm = vec![0.0f32; total_mats * d * d];
        for r in 0..total_mats {
            transpose_cols_to_rows(&mat_data[r * d * d..(r + 1) * d * d], d, d, &mut mats_rm[r * d * d..(r + 1) * d * d]);
        }
        npy::write_f32_array(&dir.join(format!("{prefix}mats.npy")), &[total_mats, d, d], &mats_rm)?;
        npy::write_u64_array(&dir.join(format!("{prefix}msteps.npy")), &[total_mats], &self.relations.steps_snapshot())?;

        let mut encoder_rm = vec![0.0f32; self.code_len * d * d];
        let mut decoder_rm = vec![0.0f32; self.code_len * d * d];
        for k in 0..self.code_len {
            transpose_cols_to_rows(&self.autoencoder.encoder_snapshot()[k * d * d..(k + 1) * d * d], d, d, &mut encoder_rm[k * d * d..(k + 1) * d * d]);
            transpose_cols_to_rows(&self.autoencoder.decoder_snapshot()[k * d * d..(k + 1) * d * d], d, d, &mut decoder_rm[k * d * d..(k + 1) * d * d]);
        }
        npy::write_f32_array(&dir.join(format!("{prefix}encoder.npy")), &[self.code_len, d, d], &encoder_rm)?;
        npy::write_f32_array(&dir.join(format!("{prefix}decoder.npy")), &[self.code_len, d, d], &decoder_rm)?;
        npy::write_u64_array(&dir.join(format!("{prefix}dstep.npy")), &[], &[self.autoencoder.step()])?;

        let params = serde_json::to_string_pretty(hp)?;
        std::fs::write(dir.join("params.json"), params)?;
        Ok(())
    }
}

/// `dst[i*cols + j] = src[j*rows + i]` — row-major from column-major.
fn transpose_cols_to_rows(src: &[f32], rows: usize, cols: usize, dst: &mut [f32]) {
    for j in 0..cols {
        for i in 0..rows {
            dst[i * cols + j] = src[j * rows + i];
        }
    }
}

/// `dst[j*rows + i] = src[i*cols + j]` — column-major from row-major.
fn transpose_rows_to_cols(src: &[f32], rows: usize, cols: usize, dst: &mut [f32]) {
    for i in 0..rows {
        for j in 0..cols {
            dst[j * rows + i] = src[i * cols + j];
        }
    }
}
