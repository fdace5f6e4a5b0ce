//! Stand-alone training binary: reads vocabularies and a triple file,
//! initializes or resumes a model, runs the parallel driver for
//! `--numBatches` batches, and saves the result.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use tracing::info;

use kbembed::driver::{Driver, GraphBatchSource};
use kbembed::graph::Graph;
use kbembed::hyperparams::{Hyperparameters, CODE_LEN, DIM};
use kbembed::io::{load_relations, load_triples, load_vocab};
use kbembed::model::ModelState;
use kbembed::multinomial::MultinomialTable;
use kbembed::rng::Xoroshiro128Plus;

/// Train entity/relation embeddings over a knowledge graph.
#[derive(Parser, Debug)]
#[command(name = "train", about = "Train model for KB")]
struct Cli {
    /// Counts of entities (name<TAB>count per line)
    vocab_entity: PathBuf,
    /// Counts of relations (name<TAB>count per line)
    vocab_relation: PathBuf,
    /// Training triples (head<TAB>relation<TAB>tail per line)
    train_file: PathBuf,

    /// Sample node probability is power of frequency
    #[arg(long = "sampPow", default_value_t = 0.75)]
    samp_pow: f64,

    /// Path length is 1+Poisson(sampPathLen)
    #[arg(long = "sampPathLen", default_value_t = 0.5)]
    samp_path_len: f64,

    /// Batches to train
    #[arg(long = "numBatches", default_value_t = 1_000_000)]
    num_batches: i64,

    /// If set, load model from this path for init
    #[arg(long = "inPath")]
    in_path: Option<PathBuf>,

    /// Save model to this path
    #[arg(long = "outPath", default_value = ".")]
    out_path: PathBuf,

    /// Number of parallel threads
    #[arg(long, default_value_t = 2)]
    para: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let (entities, counts) = load_vocab(&cli.vocab_entity).with_context(|| format!("reading {}", cli.vocab_entity.display()))?;
    let relations = load_relations(&cli.vocab_relation).with_context(|| format!("reading {}", cli.vocab_relation.display()))?;
    let num_entities = entities.len();
    let num_relations = relations.len();
    info!(num_entities, num_relations, "loaded vocabularies");

    let weights = counts.into_iter().map(|c| c.powf(cli.samp_pow));
    let sampler = MultinomialTable::from_weights(weights, kbembed::multinomial::TABLE_SIZE);

    let mut graph = Graph::with_capacity(num_entities);
    load_triples(&cli.train_file, &entities, &relations, num_relations as u32, &mut graph)
        .with_context(|| format!("reading {}", cli.train_file.display()))?;

    let hp = Hyperparameters::new(cli.samp_pow, cli.samp_path_len);
    std::fs::create_dir_all(&cli.out_path)?;

    let seed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as u64;
    let mut rng = Xoroshiro128Plus::seeded(seed);

    let model = match &cli.in_path {
        Some(in_path) => ModelState::load(in_path, "", num_entities, num_relations, DIM, CODE_LEN)?,
        None => {
            let model = ModelState::init(DIM, CODE_LEN, num_entities, num_relations, &mut rng);
            model.save(&cli.out_path, "init_", &hp)?;
            model
        }
    };

    let source = GraphBatchSource {
        graph: &graph,
        table: &sampler,
        lambda: cli.samp_path_len,
    };

    let driver = Driver::new(cli.num_batches);
    driver.run(&model, &source, &hp, cli.para, rng);
    if let Some(err) = driver.error() {
        anyhow::bail!("training aborted: {err}");
    }

    model.save(&cli.out_path, "", &hp)?;
    info!(out_path = %cli.out_path.display(), "training complete");
    Ok(())
}
