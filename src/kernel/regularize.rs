//! `mincr_regularize`: the per-matrix co-regularizer called once after
//! every `M` update — a low-probability autoencoder reconstruction step
//! and a low-probability orthogonality step, each an independent
//! Bernoulli trial.

use ndarray::Array2;

use crate::hyperparams;
use crate::kernel::sigmoid::{hinge_sigmoid_from_biased, SigmoidTable};
use crate::model::ModelState;
use crate::rng::Xoroshiro128Plus;

/// Flatten relation matrix `r` the way Eigen's `Map<VectorXf>` would:
/// column-major, i.e. `flat[j*dim + i] == m[[i, j]]`.
fn flatten_matrix(m: ndarray::ArrayView2<'_, f32>, dim: usize) -> Vec<f32> {
    let mut flat = vec![0.0f32; dim * dim];
    for j in 0..dim {
        for i in 0..dim {
            flat[j * dim + i] = m[[i, j]];
        }
    }
    flat
}

fn col_norm(flat: &[f32]) -> f32 {
    flat.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Runs after every `M_r` gradient update; `r` is the relation-matrix
/// index just touched.
pub fn mincr_regularize(model: &ModelState, table: &SigmoidTable, rng: &mut Xoroshiro128Plus, r: usize) {
    let m_el = hyperparams::M_ETA * hyperparams::M_LAMBDA;
    let mstep = model.relations.incr_step(r);
    let mscal = 1.0 / (m_el * mstep as f32 + 1.0);

    if !hyperparams::DISABLE_AUTOENCODER && rng.next_double() * hyperparams::AUTOENC_SKIP < 1.0 {
        autoencoder_branch(model, table, rng, r, mstep, mscal);
    }

    if rng.next_double() * hyperparams::ORTH_SKIP < 1.0 {
        orthogonality_branch(model, r, mstep, mscal);
    }
}

fn autoencoder_branch(
    model: &ModelState,
    table: &SigmoidTable,
    rng: &mut Xoroshiro128Plus,
    r: usize,
    mstep: u64,
    mscal: f32,
) {
    let dim = model.dim();
    let sqrt_dim = (dim as f32).sqrt();
    let code_len = model.autoencoder.num_bases();
    let num_mats = model.relations.num_relations() * 2;
    let flat_len = dim * dim;
    let clamp_hi = 4.0 * sqrt_dim;

    let dstep = model.autoencoder.incr_step();
    let denc_scal = 1.0 / (hyperparams::AUTOENC_LAMBDA * hyperparams::AUTOENC_ETA * dstep as f32 + 1.0);

    // Column 0 is the matrix just updated; columns 1..=3 are uniformly
    // random distractors (mirrors TrainerKB::mincr_regularize).
    let sample_idx = [
        r,
        rng.next_bounded(num_mats as u64) as usize,
        rng.next_bounded(num_mats as u64) as usize,
        rng.next_bounded(num_mats as u64) as usize,
    ];
    let mni: Vec<Vec<f32>> = sample_idx
        .iter()
        .map(|&idx| flatten_matrix(model.relations.matrix(idx), dim))
        .collect();
    let reci_norms: [f32; 4] = std::array::from_fn(|c| sqrt_dim / col_norm(&mni[c]));

    let mut codes = Array2::<f32>::zeros((code_len, 4));
    for c in 0..4 {
        let scale = denc_scal * reci_norms[c];
        for k in 0..code_len {
            let basis = flatten_matrix(model.autoencoder.encoder_basis(k), dim);
            let dot: f32 = basis.iter().zip(mni[c].iter()).map(|(a, b)| a * b).sum();
            codes[[k, c]] = (dot * scale).min(clamp_hi);
        }
    }

    let mut codes_grad = Array2::<f32>::zeros((code_len, 4));
    let mut crelus = Array2::<f32>::zeros((code_len, 4));
    for c in 0..4 {
        for k in 0..code_len {
            let h = (0.5 + 0.25 * codes[[k, c]]).max(0.0);
            let g = h.min(1.0);
            codes_grad[[k, c]] = g;
            crelus[[k, c]] = g * (2.0 * h).max(codes[[k, c]]);
        }
    }

    // outs[:, c] = decoder applied to the code column c.
    let mut outs = vec![vec![0.0f32; flat_len]; 4];
    for c in 0..4 {
        for k in 0..code_len {
            let w = crelus[[k, c]];
            if w == 0.0 {
                continue;
            }
            let basis = flatten_matrix(model.autoencoder.decoder_basis(k), dim);
            for (o, b) in outs[c].iter_mut().zip(basis.iter()) {
                *o += w * b;
            }
        }
    }

    let scale0 = (256.0 / hyperparams::AUTOENC_FACTOR) * denc_scal * reci_norms[0];
    let mut sigs = [0.0f32; 4];
    for c in 0..4 {
        let dot: f32 = outs[c].iter().zip(mni[0].iter()).map(|(a, b)| a * b).sum();
        let d = scale0 * dot - 281.24475;
        sigs[c] = hinge_sigmoid_from_biased(table, d, c == 0);
    }

    let rate = (hyperparams::JOINT_M_ETA / hyperparams::AUTOENC_FACTOR)
        * (mscal / reci_norms[0]).min(4.0)
        / ((hyperparams::JOINT_M_ETA * hyperparams::JOINT_M_LAMBDA * mstep as f32 / hyperparams::AUTOENC_SKIP as f32 + 1.0) * mscal);

    {
        let mut mr = model.relations.matrix_mut(r);
        for c in 0..4 {
            let out_sq = outs[c].iter().map(|x| x * x).sum::<f32>().max(1e-12);
            let factor = rate * sigs[c] * ((16.0 * dim as f32 * code_len as f32) / out_sq).sqrt().min(denc_scal);
            for j in 0..dim {
                for i in 0..dim {
                    mr[[i, j]] += factor * outs[c][j * dim + i];
                }
            }
        }
    }

    let sig_scale = hyperparams::AUTOENC_ETA / hyperparams::AUTOENC_FACTOR;
    let dec0 = denc_scal * reci_norms[0];
    for k in 0..code_len {
        let decoder_basis_k = flatten_matrix(model.autoencoder.decoder_basis(k), dim);
        let dot: f32 = decoder_basis_k.iter().zip(mni[0].iter()).map(|(a, b)| a * b).sum();
        let clamped = (dec0 * dot).clamp(-clamp_hi, clamp_hi);
        let mut eb = model.autoencoder.encoder_basis_mut(k);
        for c in 0..4 {
            let grad_scale = clamped * sigs[c] * sig_scale * reci_norms[c] * codes_grad[[k, c]];
            for j in 0..dim {
                for i in 0..dim {
                    eb[[i, j]] += mni[c][j * dim + i] * grad_scale;
                }
            }
        }
    }

    for k in 0..code_len {
        let mut db = model.autoencoder.decoder_basis_mut(k);
        let w: f32 = (0..4).map(|c| crelus[[k, c]] * reci_norms[0] * sigs[c] * sig_scale).sum();
        for j in 0..dim {
            for i in 0..dim {
                db[[i, j]] += mni[0][j * dim + i] * w;
            }
        }
    }
}

fn orthogonality_branch(model: &ModelState, r: usize, mstep: u64, mscal: f32) {
    let dim = model.dim();
    let orth_el = (hyperparams::ORTH_RATE / hyperparams::ORTH_SKIP as f32)
        * (hyperparams::M_LAMBDA * hyperparams::SQRT_DIM / hyperparams::ORTH_COEF);

    let ma = model.relations.matrix(r).to_owned();
    let a = ma.dot(&ma.t());
    let trace: f32 = (0..dim).map(|i| a[[i, i]]).sum();
    let a_nrm = trace / dim as f32;
    if a_nrm <= 0.0 {
        return;
    }
    let rate = -hyperparams::ORTH_RATE / a_nrm * mscal.min(4.0 / a_nrm.sqrt())
        / ((orth_el * mstep as f32 / hyperparams::ORTH_SKIP as f32 + 1.0) * mscal);

    let mut a_minus_ai = a;
    for i in 0..dim {
        a_minus_ai[[i, i]] -= a_nrm;
    }
    let delta = a_minus_ai.dot(&ma);

    let mut mr = model.relations.matrix_mut(r);
    for j in 0..dim {
        for i in 0..dim {
            mr[[i, j]] += rate * delta[[i, j]];
        }
    }
}
