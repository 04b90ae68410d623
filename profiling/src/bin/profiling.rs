use serde::Deserialize;
use serde_jsonlines::json_lines;
use std::ops::Range;
use std::path::Path;
use std::time::{Duration, Instant};
use tagvote::{repair, score, vote, DivByZeroStrat, Label, Prediction, SchemeType};
use tracing::info;

use clap::Parser;

/// One line of the dataset: the tokens of a sentence, its gold tags and the tags of every
/// tagger. The gold tags are written in BIO, the taggers' tags in any known notation.
#[derive(Deserialize)]
struct Example {
    tokens: Vec<String>,
    gold: Vec<String>,
    taggers: Vec<Vec<String>>,
}

struct Dataset {
    predictions: Vec<Vec<Prediction>>,
    gold: Vec<Vec<Label>>,
}

impl Dataset {
    fn read<P: AsRef<Path>>(path: P, scheme: Option<SchemeType>) -> Dataset {
        let examples = json_lines::<Example, P>(path)
            .unwrap()
            .map(|r| r.unwrap())
            .collect::<Vec<_>>();
        let mut predictions = Vec::with_capacity(examples.len());
        let mut gold = Vec::with_capacity(examples.len());
        for ex in examples {
            predictions.push(
                ex.taggers
                    .into_iter()
                    .map(|tags| {
                        Prediction::try_new(ex.tokens.clone(), tags)
                            .unwrap()
                            .with_scheme(scheme)
                    })
                    .collect(),
            );
            gold.push(Label::parse_all(&ex.gold).unwrap());
        }
        Dataset { predictions, gold }
    }
}

#[derive(Debug, Parser)]
struct Args {
    #[arg(short, long, default_value_t = 1)]
    n_samples: u32,
    #[arg(short, long, default_value_t=String::from("big"))]
    dataset: String,
    /// Notation of the taggers' tags. Every known notation is accepted when missing.
    #[arg(short, long)]
    scheme: Option<String>,
    #[arg(short, long, default_value_t = false)]
    parallel: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();
    let scheme = args.scheme.map(|s| s.parse::<SchemeType>().unwrap());
    let n_samples = args.n_samples;
    let iter = Range {
        start: 0,
        end: n_samples,
    };
    let mut total_duration = Duration::ZERO;
    let path = format!("./data/datasets/{}_dataset.jsonl", args.dataset);
    for _ in iter {
        let dataset = Dataset::read(&path, scheme);
        let now = Instant::now();
        {
            let predicted: Vec<Vec<Label>> = dataset
                .predictions
                .iter()
                .map(|p| repair(vote(p).unwrap()).labels())
                .collect();
            let report = score(
                &predicted,
                &dataset.gold,
                DivByZeroStrat::ReplaceBy0,
                args.parallel,
            )
            .unwrap();
            info!(f1 = report.f1, "scored dataset");
        }
        let elapsed = now.elapsed();
        total_duration += elapsed;
    }
    println!(
        "Total duration: {} with {n_samples} samples",
        total_duration.as_secs_f64()
    )
}
