//! Random-walk path sampler: from a seed entity, emit a batch of walks
//! with 1+Poisson-distributed lengths, capped collectively at 31 edges.

use crate::graph::{Edge, Graph};
use crate::poisson::Poisson;
use crate::rng::Xoroshiro128Plus;

pub type Walk = Vec<Edge>;

/// Maximum number of edges across all walks of one sampled batch. This
/// is also the fixed width the update kernel's working buffers are
/// sized for.
pub const MAX_EDGES: usize = 31;

/// Sample a batch of walks starting from `seed`. Attempts up to
/// `2 * deg` walks where `deg = |nbr[seed]|`, stopping early once the
/// global edge cap is hit. Returns an empty list if `seed` has no
/// outgoing edges.
pub fn sample_paths(
    seed: u32,
    graph: &Graph,
    poisson: &mut Poisson,
    rng: &mut Xoroshiro128Plus,
) -> Vec<Walk> {
    let neighbors = graph.neighbors(seed);
    if neighbors.is_empty() {
        return Vec::new();
    }

    let attempts = neighbors.len() * 2;
    let mut paths = Vec::new();
    let mut total_edges = 0usize;

    for _ in 0..attempts {
        let mut walk: Walk = Vec::new();
        let mut edge = neighbors[rng.next_bounded(neighbors.len() as u64) as usize];
        poisson.reset();
        loop {
            walk.push(edge);
            total_edges += 1;
            if total_edges == MAX_EDGES {
                break;
            }
            let next_neighbors = graph.neighbors(edge.1);
            edge = next_neighbors[rng.next_bounded(next_neighbors.len() as u64) as usize];
            if poisson.stop(rng) {
                break;
            }
        }
        paths.push(walk);
        if total_edges == MAX_EDGES {
            break;
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clique(n: u32) -> Graph {
        let mut g = Graph::with_capacity(n as usize);
        for h in 0..n {
            for t in 0..n {
                if h != t {
                    g.insert_triple(h, 0, t, 1);
                }
            }
        }
        g
    }

    #[test]
    fn walks_are_nonempty_and_adjacent() {
        let g = clique(5);
        let mut rng = Xoroshiro128Plus::seeded(11);
        let mut poisson = Poisson::new(1.0);
        let paths = sample_paths(0, &g, &mut poisson, &mut rng);
        let mut total = 0usize;
        for walk in &paths {
            assert!(!walk.is_empty());
            let mut cur = 0u32;
            for (i, &(_, tail)) in walk.iter().enumerate() {
                if i == 0 {
                    assert!(g.neighbors(cur).contains(&walk[0]));
                } else {
                    assert!(g.neighbors(cur).contains(&(walk[i].0, walk[i].1)));
                }
                cur = tail;
            }
            total += walk.len();
        }
        assert!(total <= MAX_EDGES);
    }

    #[test]
    fn cap_is_exactly_31_under_high_lambda() {
        let g = clique(4);
        let mut rng = Xoroshiro128Plus::seeded(7);
        let mut poisson = Poisson::new(1000.0);
        let paths = sample_paths(0, &g, &mut poisson, &mut rng);
        let total: usize = paths.iter().map(|w| w.len()).sum();
        assert_eq!(total, MAX_EDGES);
    }

    #[test]
    fn empty_neighbors_yields_empty_paths() {
        let g = Graph::with_capacity(2);
        let mut rng = Xoroshiro128Plus::seeded(3);
        let mut poisson = Poisson::new(1.0);
        let paths = sample_paths(0, &g, &mut poisson, &mut rng);
        assert!(paths.is_empty());
    }
}
