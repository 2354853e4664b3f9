use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use argh::FromArgs;
use msqueue::{ConcurrentQueue, QueueHandle};

type Queue = Arc<dyn QueueHandle<String>>;

#[derive(Debug, FromArgs)]
/// Producers and consumers sharing one lock-free queue
#[argh(help_triggers("--help"))]
struct Args {
    /// number of producer threads
    #[argh(option, default = "5")]
    producers: usize,
    /// number of consumer threads
    #[argh(option, default = "2")]
    consumers: usize,
    /// items enqueued by each producer
    #[argh(option, default = "10000")]
    count: usize,
    /// pause between spawning producers and consumers
    #[argh(option, arg_name = "ms", default = "2")]
    delay_ms: u64,
    /// do not print dequeued items
    #[argh(switch)]
    quiet: bool,
}

#[derive(Debug, Default)]
struct Tally {
    received: usize,
    failed: usize,
}

fn produce(queue: Queue, id: usize, count: usize) -> Result<()> {
    for n in 0..count {
        queue
            .enqueue(format!("{id} : {n}"))
            .with_context(|| format!("producer {id} at item {n}"))?;
    }
    Ok(())
}

fn consume(queue: Queue, attempts: usize, quiet: bool) -> Result<Tally> {
    let mut tally = Tally::default();
    let mut out = std::io::stdout();
    for _ in 0..attempts {
        match queue.dequeue() {
            Some(item) => {
                tally.received += 1;
                if !quiet {
                    writeln!(out, "{item}")?;
                }
            },
            None => {
                tally.failed += 1;
                if !quiet {
                    writeln!(out, "failed")?;
                }
            },
        }
    }
    Ok(tally)
}

pub fn main() -> Result<()> {
    let args = argh::from_env::<Args>();
    tracing_subscriber::fmt()
        .with_thread_names(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if args.consumers == 0 {
        return Err(anyhow!("at least one consumer is required"));
    }

    let queue: Queue = Arc::new(ConcurrentQueue::new());
    let start = Instant::now();

    let producers = (0..args.producers)
        .map(|id| {
            let queue = queue.clone();
            let count = args.count;
            thread::Builder::new()
                .name(format!("producer-{id}"))
                .spawn(move || produce(queue, id, count))
                .context("failed to spawn producer")
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(producers = args.producers, count = args.count, "spawned producers");

    thread::sleep(Duration::from_millis(args.delay_ms));

    let attempts = args.producers * args.count / args.consumers;
    let consumers = (0..args.consumers)
        .map(|id| {
            let queue = queue.clone();
            let quiet = args.quiet;
            thread::Builder::new()
                .name(format!("consumer-{id}"))
                .spawn(move || consume(queue, attempts, quiet))
                .context("failed to spawn consumer")
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(consumers = args.consumers, attempts, "spawned consumers");

    for (id, handle) in producers.into_iter().enumerate() {
        handle
            .join()
            .map_err(|_| anyhow!("producer {id} panicked"))??;
    }

    let mut total = Tally::default();
    for (id, handle) in consumers.into_iter().enumerate() {
        let tally = handle
            .join()
            .map_err(|_| anyhow!("consumer {id} panicked"))??;
        tracing::debug!(id, received = tally.received, failed = tally.failed, "consumer finished");
        total.received += tally.received;
        total.failed += tally.failed;
    }

    let mut left = 0;
    while queue.dequeue().is_some() {
        left += 1;
    }

    tracing::info!(
        received = total.received,
        failed = total.failed,
        left,
        elapsed = ?start.elapsed(),
        "done"
    );
    Ok(())
}
