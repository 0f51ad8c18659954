//! CLI for building an LSH index over a descriptor file and evaluating it

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lsh_retrieval::io::{load_descriptors, load_ground_truth};
use lsh_retrieval::{
    AppConfig, EvaluationSummary, HyperplaneFamily, LshIndex, QueryResult, QueryRunner, Vector,
    VectorStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lsh-retrieval")]
#[command(about = "Approximate nearest-neighbor retrieval with bucketed random projection", long_about = None)]
struct Cli {
    /// JSON configuration file. Flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Descriptor file (`<id> <d_1> ... <d_D>` per line)
    #[arg(long, global = true)]
    descriptors: Option<PathBuf>,

    /// Directory of `<query>.txt` ground-truth files
    #[arg(long, global = true)]
    ground_truth_dir: Option<PathBuf>,

    /// Bucket length along each hyperplane
    #[arg(long, global = true)]
    bucket_length: Option<f32>,

    /// Hyperplanes per hash table
    #[arg(long, global = true)]
    num_hyperplanes: Option<usize>,

    /// Number of hash tables
    #[arg(long, global = true)]
    num_tables: Option<usize>,

    /// Seed for drawing hyperplanes
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Remove each query's own id from its result
    #[arg(long, global = true)]
    exclude_self: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured queries and report precision/recall
    Evaluate {
        /// Query names overriding the configured list (e.g. 181081)
        queries: Vec<String>,
        /// Number of neighbors per query
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print the ranked neighbors of one stored id
    Query {
        /// Query name or record id
        id: String,
        /// Number of neighbors to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print the ranked neighbors of an arbitrary vector
    Search {
        /// Components separated by commas or whitespace
        #[arg(allow_hyphen_values = true)]
        vector: String,
        /// Number of neighbors to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Print bucket statistics of the built index as JSON
    Stats,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AppConfig::default(),
    };

    if let Some(path) = &cli.descriptors {
        config.descriptors = path.clone();
    }
    if let Some(dir) = &cli.ground_truth_dir {
        config.ground_truth_dir = dir.clone();
    }
    if let Some(l) = cli.bucket_length {
        config.lsh.bucket_length = l;
    }
    if let Some(h) = cli.num_hyperplanes {
        config.lsh.num_hyperplanes = h;
    }
    if let Some(t) = cli.num_tables {
        config.lsh.num_tables = t;
    }
    if let Some(seed) = cli.seed {
        config.lsh.seed = seed;
    }
    if cli.exclude_self {
        config.runner.exclude_self = true;
    }
    match &cli.command {
        Commands::Evaluate { queries, k } => {
            if !queries.is_empty() {
                config.queries = queries.clone();
            }
            if let Some(k) = k {
                config.runner.k = *k;
            }
        }
        Commands::Query { k: Some(k), .. } | Commands::Search { k: Some(k), .. } => {
            config.runner.k = *k
        }
        _ => {}
    }
    Ok(config)
}

fn build(config: &AppConfig) -> Result<(VectorStore, LshIndex)> {
    let records = load_descriptors(&config.descriptors).with_context(|| {
        format!("failed to load descriptors from {}", config.descriptors.display())
    })?;
    let store = VectorStore::from_records(records)?;
    let dimension = store
        .dimension()
        .context("descriptor file contains no records")?;
    info!(records = store.len(), dimension, "loaded corpus");

    let family = HyperplaneFamily::fit(dimension, &config.lsh)?;
    let index = LshIndex::build(&store, family)?;
    Ok((store, index))
}

fn evaluate(config: &AppConfig, store: &VectorStore, index: &LshIndex) -> Result<()> {
    let runner = QueryRunner::new(store, index, config.runner.clone())?;
    let ids: Vec<String> = config.queries.iter().map(|q| config.record_id(q)).collect();

    let outcomes = runner.run_batch(ids.as_slice(), |id| {
        load_ground_truth(config.ground_truth_file(id))
    });

    let mut scores = Vec::new();
    for outcome in &outcomes {
        println!("Output for {}:", outcome.query);
        match &outcome.outcome {
            Ok(evaluated) => {
                let rows = evaluated.result.hits.iter().take(config.display_rows);
                for (i, hit) in rows.enumerate() {
                    println!("{:>4}. {} (distance: {:.4})", i + 1, hit.id, hit.distance);
                }
                println!(
                    "P/R values for {}: {:.4} {:.4}",
                    outcome.query, evaluated.score.precision, evaluated.score.recall
                );
                scores.push(evaluated.score);
            }
            Err(e) => println!("  failed: {}", e),
        }
    }

    let summary = EvaluationSummary::from_scores(&scores);
    println!(
        "\nScored {}/{} queries: mean precision {:.4}, mean recall {:.4}",
        summary.n_queries,
        outcomes.len(),
        summary.mean_precision,
        summary.mean_recall
    );
    runner.with_metrics(|m| {
        println!(
            "Latency: avg {:.1}us, p50 {:.1}us, p99 {:.1}us; avg candidates {:.1}; failures {}/{}",
            m.avg_query_latency_us(),
            m.percentile_query_latency_us(50.0),
            m.percentile_query_latency_us(99.0),
            m.avg_candidates(),
            m.failed_queries(),
            m.total_queries()
        );
    });
    Ok(())
}

fn query(config: &AppConfig, store: &VectorStore, index: &LshIndex, id: &str) -> Result<()> {
    let runner = QueryRunner::new(store, index, config.runner.clone())?;
    let id = if store.contains(id) {
        id.to_string()
    } else {
        config.record_id(id)
    };
    let result = runner.run_query(&id)?;
    print_result(&id, &result);
    Ok(())
}

fn search(config: &AppConfig, store: &VectorStore, index: &LshIndex, raw: &str) -> Result<()> {
    let vector = Vector::parse(raw)?;
    vector.validate()?;
    let result = index.query(store, vector.as_slice(), config.runner.k)?;
    print_result("the query vector", &result);
    Ok(())
}

fn print_result(label: &str, result: &QueryResult) {
    if result.is_empty() {
        println!("No results found (no stored vector shares a bucket with {})", label);
    } else {
        println!("Top {} of {} candidates:", result.len(), result.candidates);
        for (i, hit) in result.hits.iter().enumerate() {
            println!("{}. {} (distance: {:.4})", i + 1, hit.id, hit.distance);
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let (store, index) = build(&config)?;

    match &cli.command {
        Commands::Evaluate { .. } => evaluate(&config, &store, &index),
        Commands::Query { id, .. } => query(&config, &store, &index, id),
        Commands::Search { vector, .. } => search(&config, &store, &index, vector),
        Commands::Stats => {
            let stats = index.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}
