use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crate::core::latch::panic_message;
use crate::core::{
    BoxError, EngineRegistry, FatalError, FatalLatch, QueuePublisher, QueueSubscriber,
    ScalarResults, Trade, WorkQueue,
};

use super::{price_trade, PricerConfig, RunOutcome, RunStats, WorkerStats, PROGRESS_INTERVAL};

/// Prices trades on a pool of worker threads fed by a bounded queue.
///
/// The calling thread is the producer: it enumerates the batches in order
/// and pushes each trade, blocking while the queue is full. `W` workers are
/// spawned on top of it, so a run uses `W + 1` threads. The input iterator
/// never leaves the calling thread and need not be `Send`.
#[derive(Clone, Debug, Default)]
pub struct ParallelPricer {
    config: PricerConfig,
}

impl ParallelPricer {
    /// `worker_count == 0` uses the available parallelism.
    pub fn new(worker_count: usize) -> Self {
        Self::with_config(PricerConfig::with_workers(worker_count))
    }

    pub fn with_config(config: PricerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricerConfig {
        &self.config
    }

    /// Price every trade of every batch. Blocks until all workers exit.
    pub fn price<I, B>(
        &self,
        batches: I,
        results: &ScalarResults,
        registry: &EngineRegistry,
    ) -> RunOutcome
    where
        I: IntoIterator<Item = B>,
        B: IntoIterator<Item = Trade>,
    {
        self.try_price(
            batches
                .into_iter()
                .map(|batch| batch.into_iter().map(Ok::<Trade, Infallible>)),
            results,
            registry,
        )
    }

    /// Like [`price`](Self::price) for sources that can fail mid-stream.
    ///
    /// The first `Err` stops enumeration and is latched as the run's fatal
    /// error; trades already queued are still priced.
    pub fn try_price<I, B, E>(
        &self,
        batches: I,
        results: &ScalarResults,
        registry: &EngineRegistry,
    ) -> RunOutcome
    where
        I: IntoIterator<Item = B>,
        B: IntoIterator<Item = Result<Trade, E>>,
        E: Into<BoxError>,
    {
        let workers = self.config.workers();
        let capacity = self.config.capacity(workers);
        let queue = WorkQueue::<Trade>::with_capacity(capacity);
        let latch = FatalLatch::new();
        let start = Instant::now();
        log::info!("pricing with {workers} workers, queue capacity {capacity}");

        let (trades_enqueued, worker_stats) = match queue.publisher() {
            Ok(publisher) => thread::scope(|scope| {
                let mut handles = Vec::with_capacity(workers);
                for worker_id in 0..workers {
                    let subscriber = queue.subscriber();
                    let worker_latch = &latch;
                    let spawned = thread::Builder::new()
                        .name(format!("pricing-worker-{worker_id}"))
                        .spawn_scoped(scope, move || {
                            run_worker(worker_id, subscriber, registry, results, worker_latch)
                        });
                    match spawned {
                        Ok(handle) => handles.push((worker_id, handle)),
                        Err(source) => {
                            latch.trip(FatalError::Spawn { worker_id, source });
                        }
                    }
                }

                let enqueued = produce(batches, publisher, &latch);

                let mut stats = Vec::with_capacity(handles.len());
                for (worker_id, handle) in handles {
                    match handle.join() {
                        Ok(worker) => stats.push(worker),
                        Err(payload) => {
                            latch.trip(FatalError::WorkerPanicked {
                                worker_id,
                                message: panic_message(payload.as_ref()),
                            });
                        }
                    }
                }
                (enqueued, stats)
            }),
            Err(source) => {
                latch.trip(FatalError::Producer {
                    enqueued: 0,
                    source,
                });
                (0, Vec::new())
            }
        };

        let close_error = queue.close_error();
        if let Some(reason) = &close_error {
            log::warn!("input closed after {trades_enqueued} trades: {reason}");
        }
        let stats = RunStats {
            trades_enqueued,
            worker_stats,
            queue_capacity: capacity,
            queue_high_water: queue.high_water_mark(),
            close_error,
            duration: start.elapsed(),
        };
        log::info!(
            "priced {} of {} trades in {:.3}s ({:.0} trades/sec)",
            stats.trades_priced(),
            stats.trades_enqueued,
            stats.duration.as_secs_f64(),
            stats.throughput()
        );
        RunOutcome::new(latch.into_inner(), stats)
    }
}

/// Enumerate `batches` in order onto the queue, then close it.
///
/// On an enumeration error or panic the fault is latched first and the queue
/// is closed with the error, so workers drain what was already queued.
fn produce<I, B, E>(batches: I, mut publisher: QueuePublisher<Trade>, latch: &FatalLatch) -> u64
where
    I: IntoIterator<Item = B>,
    B: IntoIterator<Item = Result<Trade, E>>,
    E: Into<BoxError>,
{
    let mut enqueued = 0u64;
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        for batch in batches {
            for item in batch {
                let trade = match item {
                    Ok(trade) => trade,
                    Err(err) => {
                        return Err(FatalError::Enumeration {
                            enqueued,
                            source: err.into(),
                        })
                    }
                };
                if let Err(source) = publisher.push(trade) {
                    return Err(FatalError::Producer { enqueued, source });
                }
                enqueued += 1;

                if enqueued % PROGRESS_INTERVAL == 0 {
                    let elapsed = start.elapsed().as_secs_f64();
                    log::info!(
                        "Enqueued {} trades ({:.0} trades/sec)",
                        enqueued,
                        enqueued as f64 / elapsed
                    );
                }
            }
        }
        Ok(())
    }));

    match outcome {
        Ok(Ok(())) => publisher.close(),
        Ok(Err(fatal)) => {
            let message = fatal.to_string();
            latch.trip(fatal);
            publisher.close_with_error(message);
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            latch.trip(FatalError::EnumerationPanicked {
                enqueued,
                message: message.clone(),
            });
            publisher.close_with_error(message);
        }
    }
    enqueued
}

fn run_worker(
    worker_id: usize,
    subscriber: QueueSubscriber<Trade>,
    registry: &EngineRegistry,
    results: &ScalarResults,
    latch: &FatalLatch,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        let trade = match subscriber.pop() {
            Ok(Some(trade)) => trade,
            Ok(None) => break,
            Err(source) => {
                latch.trip(FatalError::Worker { worker_id, source });
                break;
            }
        };
        match price_trade(&trade, registry, results) {
            Ok(status) => stats.record(status),
            Err(source) => {
                latch.trip(FatalError::Worker { worker_id, source });
                break;
            }
        }
    }
    log::debug!(
        "worker {worker_id} exiting after {} trades",
        stats.trades_processed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Error, Priced, PricingError, TradeType};
    use crate::PricerConfig;
    use std::sync::Arc;

    fn registry() -> EngineRegistry {
        let engine = |_: &Trade| -> Result<Priced, PricingError> { Ok(Priced::new(1.0)) };
        EngineRegistry::new().with_engine(TradeType::GovBond, Arc::new(engine))
    }

    fn book(count: usize) -> Vec<Vec<Trade>> {
        vec![(0..count)
            .map(|n| Trade::new(format!("G{n}"), TradeType::GovBond).unwrap())
            .collect()]
    }

    #[test]
    fn worker_latches_broken_queue() {
        let queue = WorkQueue::<Trade>::with_capacity(2);
        let subscriber = queue.subscriber();
        queue.poison();
        let latch = FatalLatch::new();
        let results = ScalarResults::new();

        let stats = run_worker(3, subscriber, &registry(), &results, &latch);

        assert_eq!(stats, WorkerStats::default());
        match latch.into_inner() {
            Some(FatalError::Worker {
                worker_id: 3,
                source: Error::Poisoned(_),
            }) => {}
            other => panic!("unexpected latch contents: {other:?}"),
        }
    }

    #[test]
    fn broken_store_stops_workers_without_deadlock() {
        let results = ScalarResults::new();
        results.poison();

        let outcome = ParallelPricer::new(2).price(book(100), &results, &registry());

        assert!(!outcome.completed_fully());
        assert!(matches!(
            outcome.fatal_error(),
            Some(FatalError::Worker {
                source: Error::Poisoned(_),
                ..
            })
        ));
        assert!(outcome.stats().trades_enqueued < 100);
    }

    #[test]
    fn faulting_worker_leaves_others_draining() {
        const TRADES: usize = 20;

        let queue = WorkQueue::<Trade>::with_capacity(4);
        let mut publisher = queue.publisher().unwrap();
        let broken_sub = queue.subscriber();
        let healthy_sub = queue.subscriber();
        let broken_store = ScalarResults::new();
        broken_store.poison();
        let good_store = ScalarResults::new();
        let registry = registry();
        let latch = FatalLatch::new();

        let mut trades = book(TRADES).into_iter().flatten();
        let (broken, healthy) = thread::scope(|scope| {
            // The broken worker is alone on the queue for the first trade.
            let broken =
                scope.spawn(|| run_worker(0, broken_sub, &registry, &broken_store, &latch));
            publisher.push(trades.next().unwrap()).unwrap();
            let broken = broken.join().unwrap();

            let healthy = scope.spawn(|| run_worker(1, healthy_sub, &registry, &good_store, &latch));
            for trade in trades {
                publisher.push(trade).unwrap();
            }
            publisher.close();
            (broken, healthy.join().unwrap())
        });

        assert_eq!(broken, WorkerStats::default());
        assert!(!good_store.contains("G0"));
        assert_eq!(healthy.trades_processed, (TRADES - 1) as u64);
        assert_eq!(good_store.len(), TRADES - 1);
        match latch.into_inner() {
            Some(FatalError::Worker {
                worker_id: 0,
                source: Error::Poisoned(_),
            }) => {}
            other => panic!("unexpected latch contents: {other:?}"),
        }
    }

    #[test]
    fn huge_queue_capacity_override() {
        let config = PricerConfig {
            worker_count: 2,
            queue_capacity: Some(usize::MAX / 2),
        };
        let results = ScalarResults::new();

        let empty = ParallelPricer::with_config(config.clone()).price(
            Vec::<Vec<Trade>>::new(),
            &results,
            &registry(),
        );
        assert!(empty.completed_fully());
        assert_eq!(empty.stats().queue_capacity, usize::MAX / 2);

        let outcome = ParallelPricer::with_config(config).price(book(50), &results, &registry());
        assert!(outcome.completed_fully());
        assert_eq!(results.len(), 50);
    }

    #[test]
    fn worker_threads_are_named() {
        let names = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = Arc::clone(&names);
        let engine = move |_: &Trade| -> Result<Priced, PricingError> {
            let name = thread::current().name().unwrap_or_default().to_string();
            seen.lock().unwrap().push(name);
            Ok(Priced::new(1.0))
        };
        let registry = EngineRegistry::new().with_engine(TradeType::GovBond, Arc::new(engine));
        let results = ScalarResults::new();

        let outcome = ParallelPricer::new(2).price(book(10), &results, &registry);

        assert!(outcome.completed_fully());
        let names = names.lock().unwrap();
        assert_eq!(names.len(), 10);
        assert!(names.iter().all(|name| name.starts_with("pricing-worker-")));
    }
}
