use anyhow::{anyhow, ensure, Context as _};
use regtree::{
    BloomFilter, Dataset, DecisionTreeRegressor, KMeansOptions, Node, PairedRegression,
    TreeOptions, Window,
};
use serde_json::{json, Value};
use std::num::NonZeroUsize;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing::{info, warn};

#[derive(Debug, StructOpt)]
#[structopt(name = "regtree", about = "Regression trees and small statistics over CSV data")]
struct Opt {
    /// Enable debug-level logging
    #[structopt(long, global = true)]
    verbose: bool,

    /// Only log errors
    #[structopt(long, global = true)]
    quiet: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Fit a regression tree and print it with optional predictions
    Tree {
        #[structopt(long, parse(from_os_str))]
        data: PathBuf,

        /// Target column
        #[structopt(long)]
        target: String,

        /// Candidate split columns, in tie-break order
        #[structopt(long, use_delimiter = true, required = true)]
        features: Vec<String>,

        #[structopt(long, default_value = "1")]
        min_samples: NonZeroUsize,

        #[structopt(long, default_value = "5")]
        max_depth: NonZeroUsize,

        /// Input to predict, e.g. `age=31,gender=1` (repeatable)
        #[structopt(long, parse(try_from_str = parse_assignments))]
        predict: Vec<Assignments>,
    },

    /// Count empty and filled cells per column
    Describe {
        #[structopt(long, parse(from_os_str))]
        data: PathBuf,

        /// 1-based inclusive row range, e.g. `1-20`
        #[structopt(long, parse(try_from_str = parse_range))]
        rows: Option<RangeInclusive<usize>>,

        /// 1-based inclusive column range, e.g. `2-3`
        #[structopt(long, parse(try_from_str = parse_range))]
        cols: Option<RangeInclusive<usize>>,
    },

    /// Fit a paired linear regression `y = b0 + b1 * x`
    Regress {
        #[structopt(long, parse(from_os_str))]
        data: PathBuf,

        #[structopt(long)]
        x: String,

        #[structopt(long)]
        y: String,

        #[structopt(long)]
        predict: Vec<f64>,
    },

    /// Cluster rows with k-means
    Kmeans {
        #[structopt(long, parse(from_os_str))]
        data: PathBuf,

        #[structopt(long, use_delimiter = true, required = true)]
        columns: Vec<String>,

        #[structopt(long)]
        clusters: NonZeroUsize,

        #[structopt(long, default_value = "100")]
        max_iter: NonZeroUsize,

        #[structopt(long)]
        seed: Option<u64>,
    },

    /// Check words against a Bloom filter
    Bloom {
        /// Words to insert
        #[structopt(long, use_delimiter = true)]
        words: Vec<String>,

        /// Number of bits
        #[structopt(long)]
        size: NonZeroUsize,

        /// Number of hash functions
        #[structopt(long, default_value = "3")]
        hashes: NonZeroUsize,

        queries: Vec<String>,
    },
}

/// `name=value` pairs given on the command line.
#[derive(Debug, Clone)]
struct Assignments(Vec<(String, String)>);

fn parse_assignments(s: &str) -> anyhow::Result<Assignments> {
    s.split(',')
        .map(|kv| -> anyhow::Result<(String, String)> {
            let (k, v) = kv
                .split_once('=')
                .ok_or_else(|| anyhow!("expected `name=value`, got {:?}", kv))?;
            Ok((k.trim().to_owned(), v.trim().to_owned()))
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .map(Assignments)
}

fn parse_range(s: &str) -> anyhow::Result<RangeInclusive<usize>> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| anyhow!("expected `start-end`, got {:?}", s))?;
    Ok(start.trim().parse()?..=end.trim().parse()?)
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let filter = match (opt.verbose, opt.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = match opt.command {
        Command::Tree {
            data,
            target,
            features,
            min_samples,
            max_depth,
            predict,
        } => {
            let dataset = Dataset::open(&data)?;
            let table = dataset
                .table(&features[..], &target)
                .with_context(|| format!("failed to build a table from {}", data.display()))?;
            let tree = TreeOptions::new()
                .features(features)
                .min_samples(min_samples)
                .max_depth(max_depth)
                .fit(&table)?;

            let predictions = predict
                .iter()
                .map(|Assignments(input)| -> anyhow::Result<Value> {
                    let record = encode_input(&dataset, input)?;
                    let value = tree.predict(&record)?;
                    Ok(json!({ "input": input_json(input), "prediction": value }))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            json!({
                "target": target,
                "features": tree.features(),
                "min_samples": tree.stop_rule().min_samples(),
                "max_depth": tree.stop_rule().max_depth(),
                "depth": tree.depth(),
                "root": node_json(&tree, tree.root()),
                "predictions": predictions,
            })
        }
        Command::Describe { data, rows, cols } => {
            let dataset = Dataset::open(&data)?;
            let window = match (rows, cols) {
                (None, None) => None,
                (rows, cols) => Some(Window::new(
                    rows.unwrap_or(1..=dataset.rows_len()),
                    cols.unwrap_or(1..=dataset.columns_len()),
                )),
            };
            serde_json::to_value(dataset.describe(window.as_ref())?)?
        }
        Command::Regress {
            data,
            x,
            y,
            predict,
        } => {
            let dataset = Dataset::open(&data)?;
            let fit = PairedRegression::fit(
                dataset.column(&x)?.values(),
                dataset.column(&y)?.values(),
            )?;
            info!(
                intercept = fit.intercept(),
                slope = fit.slope(),
                "regression fitted"
            );
            json!({
                "intercept": fit.intercept(),
                "slope": fit.slope(),
                "samples": fit.samples(),
                "predictions": fit.predict_many(&predict),
            })
        }
        Command::Kmeans {
            data,
            columns,
            clusters,
            max_iter,
            seed,
        } => {
            let dataset = Dataset::open(&data)?;
            let columns = columns
                .iter()
                .map(|name| dataset.column(name).map(|c| c.values()))
                .collect::<Result<Vec<_>, _>>()?;
            let points = (0..dataset.rows_len())
                .map(|row| columns.iter().map(|c| c[row]).collect::<Vec<_>>())
                .filter(|p| !p.iter().any(|x| x.is_nan()))
                .collect::<Vec<_>>();
            if points.len() < dataset.rows_len() {
                warn!(
                    skipped = dataset.rows_len() - points.len(),
                    "rows with missing cells were skipped"
                );
            }

            let mut options = KMeansOptions::new(clusters).max_iter(max_iter);
            if let Some(seed) = seed {
                options = options.seed(seed);
            }
            let result = options.fit(&points)?;
            json!({
                "labels": result.labels(),
                "centroids": result.centroids(),
                "iterations": result.iterations(),
                "converged": result.converged(),
                "inertia": result.inertia(&points),
            })
        }
        Command::Bloom {
            words,
            size,
            hashes,
            queries,
        } => {
            ensure!(!queries.is_empty(), "nothing to check");
            let filter = BloomFilter::new(&words, size, hashes);
            let results = queries
                .iter()
                .map(|q| (q.clone(), Value::Bool(filter.check(q))))
                .collect::<serde_json::Map<_, _>>();
            Value::Object(results)
        }
    };

    serde_json::to_writer_pretty(std::io::stdout().lock(), &output)?;
    println!();
    Ok(())
}

/// Resolves `name=value` pairs against the dataset columns, encoding
/// categorical values with the column's category codes.
fn encode_input(
    dataset: &Dataset,
    input: &[(String, String)],
) -> anyhow::Result<Vec<(String, f64)>> {
    input
        .iter()
        .map(|(name, value)| -> anyhow::Result<(String, f64)> {
            let encoded = match value.parse::<f64>() {
                Ok(v) => v,
                Err(_) => dataset.column(name)?.code_of(value).ok_or_else(|| {
                    anyhow!("column {:?} has no category {:?}", name, value)
                })?,
            };
            Ok((name.clone(), encoded))
        })
        .collect()
}

fn input_json(input: &[(String, String)]) -> Value {
    Value::Object(
        input
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn node_json(tree: &DecisionTreeRegressor, node: &Node) -> Value {
    let stats = node.stats();
    match node {
        Node::Leaf { reason, .. } => json!({
            "kind": "leaf",
            "reason": format!("{:?}", reason),
            "prediction": stats.prediction,
            "variance": stats.variance,
            "samples": stats.sample_count,
        }),
        Node::Internal {
            feature,
            threshold,
            mse_reduction,
            left,
            right,
            ..
        } => json!({
            "kind": "internal",
            "feature": tree.features()[*feature],
            "threshold": threshold,
            "mse_reduction": mse_reduction,
            "prediction": stats.prediction,
            "variance": stats.variance,
            "samples": stats.sample_count,
            "left": node_json(tree, left),
            "right": node_json(tree, right),
        }),
    }
}
