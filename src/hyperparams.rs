//! Concrete training constants and their derived learning rates,
//! serialized alongside a saved model as `params.json`.

use serde::{Deserialize, Serialize};

pub const DIM: usize = 256;
pub const SQRT_DIM: f32 = 16.0;
pub const CODE_LEN: usize = 16;
pub const SQRT_CLEN: f32 = 4.0;

pub const V_ETA: f32 = 1.0 / 64.0;
pub const V_LAMBDA: f32 = 1.0 / 1024.0;
pub const M_ETA: f32 = V_ETA;
pub const M_LAMBDA: f32 = V_LAMBDA / SQRT_DIM;

pub const ORTH_SKIP: f64 = 256.0;
pub const ORTH_RATE: f32 = 1.0 / 16.0;
pub const ORTH_COEF: f32 = 1.0 / 4.0;

pub const AUTOENC_FACTOR: f32 = SQRT_DIM * SQRT_CLEN;
pub const AUTOENC_ETA: f32 = M_ETA * 4.0 * SQRT_CLEN;
pub const AUTOENC_SKIP: f64 = 1024.0;
pub const AUTOENC_LAMBDA: f32 = M_LAMBDA;
pub const JOINT_M_ETA: f32 = M_ETA;
pub const JOINT_M_LAMBDA: f32 = M_LAMBDA / 4.0;

pub const DISABLE_AUTOENCODER: bool = false;

/// Derived learning rates, computed once and reused on every update
/// (mirrors the `static constexpr` block at the top of the original
/// trainer's translation unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub trainer: String,
    pub dim: usize,
    pub code_len: usize,
    #[serde(rename = "vEta")]
    pub v_eta: f32,
    #[serde(rename = "mEta")]
    pub m_eta: f32,
    #[serde(rename = "orthSkip")]
    pub orth_skip: f64,
    #[serde(rename = "orthRate")]
    pub orth_rate: f32,
    #[serde(rename = "orthEL")]
    pub orth_el: f32,
    #[serde(rename = "autoFactor")]
    pub auto_factor: f32,
    #[serde(rename = "autoEta")]
    pub auto_eta: f32,
    #[serde(rename = "autoSkip")]
    pub auto_skip: f64,
    #[serde(rename = "jointMEta")]
    pub joint_m_eta: f32,
    #[serde(rename = "jointM_EL")]
    pub joint_m_el: f32,
    #[serde(rename = "vEL")]
    pub v_el: f32,
    #[serde(rename = "mEL")]
    pub m_el: f32,
    #[serde(rename = "autoEL")]
    pub auto_el: f32,
    pub disable_autoencoder: bool,

    /// Carried through from the CLI rather than the original's
    /// hard-coded constants: exponent for the entity-frequency
    /// sampling power, and the path-length Poisson mean.
    #[serde(rename = "sampPow")]
    pub samp_pow: f64,
    #[serde(rename = "sampPathLen")]
    pub samp_path_len: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self::new(0.75, 0.5)
    }
}

impl Hyperparameters {
    pub fn new(samp_pow: f64, samp_path_len: f64) -> Self {
        let orth_el = (ORTH_RATE / ORTH_SKIP as f32) * (M_LAMBDA * SQRT_DIM / ORTH_COEF);
        let joint_m_el = JOINT_M_ETA * JOINT_M_LAMBDA;
        let v_el = V_ETA * V_LAMBDA;
        let m_el = M_ETA * M_LAMBDA;
        let auto_el = AUTOENC_ETA * AUTOENC_LAMBDA;
        Self {
            trainer: "TrainerKB".to_string(),
            dim: DIM,
            code_len: CODE_LEN,
            v_eta: V_ETA,
            m_eta: M_ETA,
            orth_skip: ORTH_SKIP,
            orth_rate: ORTH_RATE,
            orth_el,
            auto_factor: AUTOENC_FACTOR,
            auto_eta: AUTOENC_ETA,
            auto_skip: AUTOENC_SKIP,
            joint_m_eta: JOINT_M_ETA,
            joint_m_el,
            v_el,
            m_el,
            auto_el,
            disable_autoencoder: DISABLE_AUTOENCODER,
            samp_pow,
            samp_path_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let hp = Hyperparameters::default();
        let s = serde_json::to_string(&hp).unwrap();
        let back: Hyperparameters = serde_json::from_str(&s).unwrap();
        assert_eq!(back.dim, hp.dim);
        assert!((back.v_el - hp.v_el).abs() < 1e-9);
    }
}
