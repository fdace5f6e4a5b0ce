//! Poisson sampling by the multiplicative inverse-CDF trick, plus an
//! incremental stopping-rule mode used by the path sampler to decide
//! whether to extend a random walk.

use crate::rng::Xoroshiro128Plus;

/// `exp(512.0)`, used to rescale the running product back into range
/// every 512 units of remaining lambda so it never underflows.
const EXP_512: f64 = 2.2844135865397565e222;

pub struct Poisson {
    lambda: f64,
    exp_lambda_frac: f64,
    lambda_left: f64,
    cur: f64,
}

/// Multiply `cur` by `rd` and keep folding in chunks of `exp_lambda_frac`
/// (or `EXP_512` for each full 512 of remaining lambda) until the
/// product drops to or below 1, or lambda is exhausted. Returns
/// whether the final product is `<= 1.0`.
fn check_stop(exp_lambda_frac: f64, rd: f64, lambda: &mut f64, cur: &mut f64) -> bool {
    let mut ncur = *cur * rd;
    while ncur <= 1.0 && *lambda > 0.0 {
        if *lambda >= 512.0 {
            ncur *= EXP_512;
            *lambda -= 512.0;
        } else {
            ncur *= exp_lambda_frac;
            *lambda = 0.0;
        }
    }
    *cur = ncur;
    *cur <= 1.0
}

impl Poisson {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda,
            exp_lambda_frac: (lambda % 512.0).exp(),
            lambda_left: lambda,
            cur: 1.0,
        }
    }

    /// Draw a single Poisson(lambda)-distributed count.
    pub fn sample(&self, rng: &mut Xoroshiro128Plus) -> u32 {
        let mut count = 0u32;
        let mut l = self.lambda;
        let mut c = 1.0;
        while !check_stop(self.exp_lambda_frac, rng.next_double(), &mut l, &mut c) {
            count += 1;
        }
        count
    }

    /// Consume one uniform draw and report whether the incremental
    /// stopping rule has fired (i.e. whether to stop extending a walk).
    pub fn stop(&mut self, rng: &mut Xoroshiro128Plus) -> bool {
        check_stop(
            self.exp_lambda_frac,
            rng.next_double(),
            &mut self.lambda_left,
            &mut self.cur,
        )
    }

    /// Reset the incremental stopping-rule state to a fresh run.
    pub fn reset(&mut self) {
        self.lambda_left = self.lambda;
        self.cur = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empirical_mean_converges() {
        let mut rng = Xoroshiro128Plus::seeded(99);
        let poisson = Poisson::new(4.0);
        let n = 200_000u64;
        let total: u64 = (0..n).map(|_| poisson.sample(&mut rng) as u64).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 4.0).abs() < 0.05, "mean was {mean}");
    }

    #[test]
    fn zero_lambda_always_zero() {
        let mut rng = Xoroshiro128Plus::seeded(1);
        let poisson = Poisson::new(0.0);
        for _ in 0..100 {
            assert_eq!(poisson.sample(&mut rng), 0);
        }
    }

    #[test]
    fn stop_expectation_matches_bulk_sample() {
        let mut rng = Xoroshiro128Plus::seeded(5);
        let mut poisson = Poisson::new(2.0);
        let trials = 50_000u64;
        let mut total_extensions = 0u64;
        for _ in 0..trials {
            poisson.reset();
            let mut extensions = 0u64;
            while !poisson.stop(&mut rng) {
                extensions += 1;
            }
            total_extensions += extensions;
        }
        let mean = total_extensions as f64 / trials as f64;
        assert!((mean - 2.0).abs() < 0.1, "mean extensions was {mean}");
    }

    #[test]
    fn large_lambda_does_not_overflow() {
        let mut rng = Xoroshiro128Plus::seeded(3);
        let poisson = Poisson::new(2000.0);
        let k = poisson.sample(&mut rng);
        assert!(k < 10_000);
    }
}
