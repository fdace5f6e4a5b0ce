//! The noise-contrastive update kernel (spec §4.5): one SGD step from a
//! batch of random-walk paths rooted at one head entity, folding in a
//! low-probability autoencoder/orthogonality co-regularizer on the
//! relation matrix touched along the way.

pub mod regularize;
pub mod sigmoid;

use ndarray::{Array1, Array2};

use crate::hyperparams;
use crate::model::ModelState;
use crate::rng::Xoroshiro128Plus;
use crate::sampler::Walk;
use regularize::mincr_regularize;
use sigmoid::{hinge_sigmoid_derivative, SigmoidTable};

fn adagrad_col(model: &ModelState, col: usize, v_el: f32) -> Array1<f32> {
    let scale = 1.0 / (v_el * model.embeddings.step(col) as f32 + 1.0);
    scale * model.embeddings.column(col).to_owned()
}

/// `sqrt(dim / ||m||_F^2) * (m * v)`.
fn apply_forward(m: ndarray::ArrayView2<'_, f32>, v: &Array1<f32>, dim: usize) -> Array1<f32> {
    let sq_norm: f32 = m.iter().map(|x| x * x).sum();
    (dim as f32 / sq_norm).sqrt() * m.dot(v)
}

/// `sqrt(dim / ||m||_F^2) * (m^T * v)`.
fn apply_backward(m: ndarray::ArrayView2<'_, f32>, v: &Array1<f32>, dim: usize) -> Array1<f32> {
    let sq_norm: f32 = m.iter().map(|x| x * x).sum();
    (dim as f32 / sq_norm).sqrt() * m.t().dot(v)
}

fn col_norm(v: &Array1<f32>) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// One noise-contrastive SGD step from the walks rooted at entity `h`.
pub fn update(
    model: &ModelState,
    table: &SigmoidTable,
    rng: &mut Xoroshiro128Plus,
    h: u32,
    paths: &[Walk],
) {
    let dim = model.dim();
    let v_el = hyperparams::V_ETA * hyperparams::V_LAMBDA;
    let m_el = hyperparams::M_ETA * hyperparams::M_LAMBDA;
    let num_entities = model.embeddings.num_entities();
    let num_mats = model.relations.num_relations() * 2;

    let hi = model.embeddings.target_col(h);

    let mut twv = Array2::<f32>::zeros((dim, 128));
    let mut unwv = Array2::<f32>::zeros((dim, 256));
    twv.column_mut(0).assign(&adagrad_col(model, hi, v_el));
    let mut csz = 1usize;

    let mut tdest = [0usize; 128];
    let mut unis = [0u32; 128];
    let mut inter_tvi = [0usize; 32];
    let mut inter_mi = [0usize; 32];
    let mut inter_mnrm = [0f32; 32];
    let mut samp_sz = 0usize;

    for path in paths {
        let mut calcs: Vec<usize> = Vec::with_capacity(path.len() + 1);
        calcs.push(0);

        for (pth_index, &(rel, tail)) in path.iter().enumerate() {
            let samp_sz4 = samp_sz * 4;
            let un_index = samp_sz4 + 128;

            let mut positive = adagrad_col(model, model.embeddings.context_col(tail), v_el);
            unis[samp_sz] = tail;

            let choice = rng.next_bounded(calcs.len() as u64) as usize;
            inter_tvi[samp_sz] = calcs[choice];

            for j in (choice + 1..=pth_index).rev() {
                let (r, _) = path[j];
                positive = apply_forward(model.relations.matrix(r), &positive, dim);
            }
            unwv.column_mut(un_index).assign(&positive);

            let back = apply_backward(model.relations.matrix(rel), &twv.column(*calcs.last().unwrap()).to_owned(), dim);
            twv.column_mut(csz).assign(&back);
            calcs.push(csz);
            tdest[samp_sz] = csz;
            csz += 1;

            let calcs_choice1 = calcs[choice + 1];
            for k in 1..4usize {
                let samp_sz_k32 = samp_sz + k * 32;
                let n_extra = pth_index - choice;
                let neg_entity = rng.next_bounded(num_entities as u64) as u32;
                let mut neg = adagrad_col(model, model.embeddings.context_col(neg_entity), v_el);
                unis[samp_sz_k32] = neg_entity;

                let mut rel_chain = Vec::with_capacity(n_extra);
                for _ in 0..n_extra {
                    let rm = rng.next_bounded(num_mats as u64) as usize;
                    rel_chain.push(rm);
                    neg = apply_forward(model.relations.matrix(rm), &neg, dim);
                }
                unwv.column_mut(un_index + k).assign(&neg);

                if rel_chain.is_empty() {
                    tdest[samp_sz_k32] = calcs_choice1;
                } else {
                    let mut rev = rel_chain.iter().rev();
                    let first_m = *rev.next().unwrap();
                    let mut t = apply_backward(model.relations.matrix(first_m), &twv.column(calcs_choice1).to_owned(), dim);
                    for &m in rev {
                        t = apply_backward(model.relations.matrix(m), &t, dim);
                    }
                    twv.column_mut(samp_sz_k32).assign(&t);
                    tdest[samp_sz_k32] = samp_sz_k32;
                }
            }

            let mi = path[choice].0;
            inter_mi[samp_sz] = mi;
            let mat = model.relations.matrix(mi);
            let nrm = (mat.iter().map(|x| x * x).sum::<f32>() / dim as f32).sqrt();
            inter_mnrm[samp_sz] = (nrm / (m_el * model.relations.step(mi) as f32 + 1.0)).min(4.0);

            let mut quad = Array2::<f32>::zeros((dim, 4));
            for c in 0..4 {
                let applied = mat.dot(&unwv.column(un_index + c).to_owned()) * (1.0 / nrm);
                quad.column_mut(c).assign(&applied);
            }

            let mut c = choice;
            while c != 0 {
                c -= 1;
                let (r, _) = path[c];
                let m = model.relations.matrix(r);
                let sq_norm: f32 = m.iter().map(|x| x * x).sum();
                let scale = (dim as f32 / sq_norm).sqrt();
                for col in 0..4 {
                    let applied = scale * m.dot(&quad.column(col).to_owned());
                    quad.column_mut(col).assign(&applied);
                }
            }
            for col in 0..4 {
                unwv.column_mut(samp_sz4 + col).assign(&quad.column(col).to_owned());
            }

            samp_sz += 1;
        }
    }

    let samp_sz4 = samp_sz * 4;
    let mut sigs = vec![0.0f32; samp_sz4];
    let twv0 = twv.column(0).to_owned();
    for (i, sig) in sigs.iter_mut().enumerate() {
        let raw_dot: f32 = unwv.column(i).iter().zip(twv0.iter()).map(|(a, b)| a * b).sum();
        *sig = hinge_sigmoid_derivative(table, raw_dot, i % 4 == 0);
    }

    for k in 0..samp_sz {
        for l in 0..4 {
            let idx = k + l * 32;
            let des = tdest[idx];
            let uni = unis[idx] as usize;
            let col = model.embeddings.context_col(uni as u32);
            let twv_col = twv.column(des).to_owned();
            let nrm = col_norm(&twv_col).max(8.0);
            let coef = hyperparams::V_ETA * 8.0 / nrm * sigs[k * 4 + l];
            let mut dst = model.embeddings.column_mut(col);
            for d in 0..dim {
                dst[d] += coef * twv_col[d];
            }
            model.embeddings.add_steps(col, 1);
        }
    }

    {
        let mut dst = model.embeddings.column_mut(hi);
        for i in 0..samp_sz4 {
            let col_nrm = col_norm(&unwv.column(i).to_owned()).max(8.0);
            let coef = hyperparams::V_ETA * 8.0 / col_nrm * sigs[i];
            for d in 0..dim {
                dst[d] += coef * unwv[[d, i]];
            }
        }
        model.embeddings.add_steps(hi, samp_sz4 as u64);
    }

    for k in 0..samp_sz {
        let mi = inter_mi[k];
        let tvi = inter_tvi[k];
        let twv_col = twv.column(tvi).to_owned();
        let t_nrm = col_norm(&twv_col).max(8.0);
        {
            let mut mr = model.relations.matrix_mut(mi);
            for l in 0..4 {
                let unwv_col = unwv.column(128 + k * 4 + l).to_owned();
                let u_nrm = col_norm(&unwv_col).max(8.0);
                let coef = hyperparams::M_ETA * 64.0 * inter_mnrm[k] * sigs[k * 4 + l] / (t_nrm * u_nrm);
                for j in 0..dim {
                    for i in 0..dim {
                        mr[[i, j]] += twv_col[i] * coef * unwv_col[j];
                    }
                }
            }
        }
        mincr_regularize(model, table, rng, mi);
    }
}
