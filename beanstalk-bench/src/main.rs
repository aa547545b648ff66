//! # Queue Benchmark Harness
//!
//! Purpose: Drive put → reserve → delete cycles against a live beanstalkd
//! and report throughput, so client changes can be compared over time.
//!
//! ## Usage
//!
//! ```text
//! bench_queue [jobs] [body_size] [tube]
//! ```
//!
//! The daemon address and pool settings come from `BEANSTALK_*` variables;
//! log verbosity from `RUST_LOG` (default `info`).

use std::env;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use beanstalk_client::{Beanstalk, ClientConfig, DEFAULT_PRIORITY};

const DEFAULT_JOB_COUNT: usize = 10_000;
const DEFAULT_BODY_SIZE: usize = 128;
const DEFAULT_TUBE: &str = "bench";
const RESERVE_TIMEOUT: Duration = Duration::from_secs(1);

struct BenchConfig {
    jobs: usize,
    body_size: usize,
    tube: String,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let jobs = parse_usize(args.next(), DEFAULT_JOB_COUNT);
        let body_size = parse_usize(args.next(), DEFAULT_BODY_SIZE);
        let tube = args.next().unwrap_or_else(|| DEFAULT_TUBE.to_string());
        BenchConfig {
            jobs,
            body_size,
            tube,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let micros_per_op = (secs * 1e6) / (ops as f64);
    info!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {micros_per_op:.1} us/op)");
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bench = BenchConfig::from_args();
    let config = ClientConfig {
        // One session keeps use/watch state on the connection doing the work.
        max_connections: 1,
        ..ClientConfig::from_env()
    };
    info!(
        host = %config.host,
        port = config.port,
        jobs = bench.jobs,
        body_size = bench.body_size,
        tube = %bench.tube,
        "starting queue benchmark"
    );

    let client = Beanstalk::with_config(config);
    client.use_tube(&bench.tube).context("use tube")?;
    client.watch(&bench.tube).context("watch tube")?;
    client.ignore("default").context("ignore default tube")?;

    let body = vec![b'x'; bench.body_size];
    let start = Instant::now();
    for _ in 0..bench.jobs {
        client
            .put(&body, DEFAULT_PRIORITY, Duration::ZERO, Duration::from_secs(60))
            .context("put")?;
    }
    report("PUT", bench.jobs, start.elapsed());

    let start = Instant::now();
    let mut drained = 0;
    while drained < bench.jobs {
        let Some(mut job) = client
            .reserve_with_timeout(RESERVE_TIMEOUT)
            .context("reserve")?
        else {
            warn!(drained, expected = bench.jobs, "queue drained early");
            break;
        };
        if job.body().len() != bench.body_size {
            bail!("job {} body has {} bytes", job.id(), job.body().len());
        }
        job.delete().context("delete")?;
        drained += 1;
    }
    report("RESERVE+DELETE", drained, start.elapsed());

    if let Some(stats) = client.stats_tube(&bench.tube).context("stats-tube")? {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}
