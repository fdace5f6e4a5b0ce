use kbembed::driver::{Driver, GraphBatchSource};
use kbembed::graph::Graph;
use kbembed::hyperparams::Hyperparameters;
use kbembed::model::ModelState;
use kbembed::multinomial::MultinomialTable;
use kbembed::rng::Xoroshiro128Plus;

fn ring_graph(n: u32) -> Graph {
    let mut g = Graph::with_capacity(n as usize);
    for h in 0..n {
        g.insert_triple(h, 0, (h + 1) % n, 1);
    }
    g
}

#[test]
fn driver_runs_to_completion_without_panicking() {
    let graph = ring_graph(6);
    let weights = vec![1.0; 6];
    let table = MultinomialTable::from_weights(weights.into_iter(), 6);
    let source = GraphBatchSource {
        graph: &graph,
        table: &table,
        lambda: 0.5,
    };

    let mut rng = Xoroshiro128Plus::seeded(123);
    let model = ModelState::init(16, 2, 6, 1, &mut rng);
    let hp = Hyperparameters::default();

    let driver = Driver::new(50);
    driver.run(&model, &source, &hp, 3, rng);

    assert!(driver.error().is_none());
}

#[test]
fn model_save_and_load_round_trips() {
    let mut rng = Xoroshiro128Plus::seeded(7);
    let model = ModelState::init(8, 2, 5, 2, &mut rng);
    let hp = Hyperparameters::default();

    let dir = tempfile::tempdir().unwrap();
    model.save(dir.path(), "", &hp).unwrap();

    let loaded = ModelState::load(dir.path(), "", 5, 2, 8, 2).unwrap();
    assert_eq!(loaded.num_entities(), model.num_entities());
    assert_eq!(loaded.num_relations(), model.num_relations());

    for col in [0, model.embeddings.context_col(3), model.embeddings.target_col(4)] {
        let a = model.embeddings.column(col).to_owned();
        let b = loaded.embeddings.column(col).to_owned();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    let ra = model.relations.matrix(1).to_owned();
    let rb = loaded.relations.matrix(1).to_owned();
    for (x, y) in ra.iter().zip(rb.iter()) {
        assert!((x - y).abs() < 1e-5);
    }
}
