//! Parallel driver (L8): `para` OS threads pulling batches until a
//! shared counter runs dry, coordinating only through atomics.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

use tracing::{info, warn};

use crate::errors::HostCallableError;
use crate::graph::Graph;
use crate::hyperparams::Hyperparameters;
use crate::kernel;
use crate::kernel::sigmoid::SigmoidTable;
use crate::model::ModelState;
use crate::multinomial::MultinomialTable;
use crate::poisson::Poisson;
use crate::rng::Xoroshiro128Plus;
use crate::sampler::{sample_paths, Walk};

/// A source of `(seed, paths)` batches. The stand-alone CLI draws a
/// seed and samples paths directly; an embedding host would instead
/// bridge to a user-supplied batch-producing callable, surfacing any
/// parse failure as a [`HostCallableError`].
pub trait BatchSource: Send + Sync {
    fn next_batch(&self, worker_id: usize, rng: &mut Xoroshiro128Plus) -> Result<(u32, Vec<Walk>), HostCallableError>;
}

/// Stand-alone mode: each worker draws its own seed via the
/// entity-frequency multinomial table and samples paths directly (L3 +
/// L5), with no host-runtime round trip.
pub struct GraphBatchSource<'a> {
    pub graph: &'a Graph,
    pub table: &'a MultinomialTable,
    pub lambda: f64,
}

impl<'a> BatchSource for GraphBatchSource<'a> {
    fn next_batch(&self, _worker_id: usize, rng: &mut Xoroshiro128Plus) -> Result<(u32, Vec<Walk>), HostCallableError> {
        let seed = self.table.sample(rng);
        let mut poisson = Poisson::new(self.lambda);
        let paths = sample_paths(seed, self.graph, &mut poisson, rng);
        Ok((seed, paths))
    }
}

pub struct Driver {
    remained_batches: AtomicI64,
    error: AtomicU8,
}

impl Driver {
    pub fn new(num_batches: i64) -> Self {
        Self {
            remained_batches: AtomicI64::new(num_batches),
            error: AtomicU8::new(0),
        }
    }

    pub fn error(&self) -> Option<HostCallableError> {
        HostCallableError::from_code(self.error.load(Ordering::Acquire))
    }

    /// Spawns `num_workers` threads via `std::thread::scope`, each with
    /// a disjoint RNG substream (clone + jump per worker) and a private
    /// `Poisson`, looping until `remained_batches` is exhausted or the
    /// error word is set.
    pub fn run(&self, model: &ModelState, source: &dyn BatchSource, _hyperparams: &Hyperparameters, num_workers: usize, base_rng: Xoroshiro128Plus) {
        let table = SigmoidTable::new();

        std::thread::scope(|scope| {
            for worker_id in 0..num_workers {
                let mut rng = base_rng.clone();
                for _ in 0..worker_id {
                    rng.jump();
                }
                let table = &table;
                scope.spawn(move || {
                    self.worker_loop(worker_id, model, source, table, rng);
                });
            }
        });

        if let Some(err) = self.error() {
            warn!(?err, "driver halted on host-callable error");
        }
    }

    fn worker_loop(&self, worker_id: usize, model: &ModelState, source: &dyn BatchSource, table: &SigmoidTable, mut rng: Xoroshiro128Plus) {
        loop {
            if self.error.load(Ordering::Acquire) != 0 {
                return;
            }
            let remaining = self.remained_batches.fetch_sub(1, Ordering::Relaxed);
            if remaining <= 0 {
                return;
            }

            match source.next_batch(worker_id, &mut rng) {
                Ok((seed, paths)) => {
                    if !paths.is_empty() {
                        kernel::update(model, table, &mut rng, seed, &paths);
                    }
                }
                Err(e) => {
                    self.error.store(e.code(), Ordering::Release);
                    info!(worker_id, error = ?e, "batch source failed, halting");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Xoroshiro128Plus;

    fn tiny_graph() -> Graph {
        let mut g = Graph::with_capacity(4);
        g.insert_triple(0, 0, 1, 1);
        g.insert_triple(1, 0, 2, 1);
        g.insert_triple(2, 0, 3, 1);
        g.insert_triple(3, 0, 0, 1);
        g
    }

    #[test]
    fn driver_consumes_exactly_num_batches() {
        let graph = tiny_graph();
        let weights = vec![1.0, 1.0, 1.0, 1.0];
        let table = MultinomialTable::from_weights(weights.into_iter(), 4);
        let source = GraphBatchSource {
            graph: &graph,
            table: &table,
            lambda: 0.5,
        };
        let mut rng = Xoroshiro128Plus::seeded(1);
        let model = ModelState::init(8, 2, 4, 1, &mut rng);
        let hp = Hyperparameters::default();
        let driver = Driver::new(20);
        driver.run(&model, &source, &hp, 2, rng);
        assert!(driver.remained_batches.load(Ordering::Relaxed) <= 0);
        assert!(driver.error().is_none());
    }
}
