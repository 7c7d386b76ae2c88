use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use riskflow::engines::standard_registry;
use riskflow::report::{write_incomplete_banner, write_json, write_json_file, write_results};
use riskflow::sample::sample_book;
use riskflow::{ParallelPricer, PricerConfig, ScalarResults, SerialPricer};

#[derive(Parser, Debug)]
#[command(name = "riskflow-price")]
#[command(about = "Price a synthetic trade book across a pool of workers")]
struct Args {
    /// Worker threads (0 = available parallelism)
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Queue capacity (default: twice the worker count)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Trades generated per trade type
    #[arg(long, default_value_t = 10)]
    per_type: usize,

    /// Multiplier applied to simulated engine latency (1.0 = seconds per trade)
    #[arg(long, default_value_t = 0.01)]
    latency_scale: f64,

    /// Price on the calling thread only
    #[arg(long)]
    serial: bool,

    /// Print results as JSON instead of `TradeID : Result : Error` lines
    #[arg(long)]
    json: bool,

    /// Also write JSON results to this path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let book = sample_book(args.per_type).context("failed to build sample book")?;
    let registry = standard_registry(args.latency_scale);
    let results = ScalarResults::new();

    let outcome = if args.serial {
        info!("pricing serially");
        SerialPricer::new().price(book, &results, &registry)
    } else {
        let config = PricerConfig {
            worker_count: args.workers,
            queue_capacity: args.queue_capacity,
        };
        ParallelPricer::with_config(config).price(book, &results, &registry)
    };

    let snapshot = results.snapshot();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        write_json(&mut out, &snapshot)?;
        writeln!(out)?;
    } else {
        write_results(&mut out, &snapshot)?;
    }
    out.flush()?;

    if let Some(path) = &args.output {
        write_json_file(path, &snapshot)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let stats = outcome.stats();
    info!(
        "priced={} enqueued={} failed={} queue_high_water={}/{} elapsed={:.3}s",
        stats.trades_priced(),
        stats.trades_enqueued,
        stats.trades_failed(),
        stats.queue_high_water,
        stats.queue_capacity,
        stats.duration.as_secs_f64()
    );

    if let Some(fatal) = outcome.fatal_error() {
        write_incomplete_banner(&mut io::stderr().lock(), fatal, snapshot.len())?;
        std::process::exit(2);
    }
    Ok(())
}
