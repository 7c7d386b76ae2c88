use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::core::latch::panic_message;
use crate::core::{BoxError, EngineRegistry, FatalError, FatalLatch, ScalarResults, Trade};

use super::{price_trade, RunOutcome, RunStats, WorkerStats};

/// Prices every trade on the calling thread, in input order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialPricer;

impl SerialPricer {
    pub fn new() -> Self {
        Self
    }

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
        let latch = FatalLatch::new();
        let start = Instant::now();
        let mut enqueued = 0u64;
        let mut worker = WorkerStats::default();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            for batch in batches {
                for item in batch {
                    let trade = item.map_err(|err| FatalError::Enumeration {
                        enqueued,
                        source: err.into(),
                    })?;
                    enqueued += 1;
                    let status = price_trade(&trade, registry, results)
                        .map_err(|source| FatalError::Worker {
                            worker_id: 0,
                            source,
                        })?;
                    worker.record(status);
                }
            }
            Ok::<(), FatalError>(())
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(fatal)) => {
                latch.trip(fatal);
            }
            Err(payload) => {
                latch.trip(FatalError::EnumerationPanicked {
                    enqueued,
                    message: panic_message(payload.as_ref()),
                });
            }
        }

        let stats = RunStats {
            trades_enqueued: enqueued,
            worker_stats: vec![worker],
            queue_capacity: 0,
            queue_high_water: 0,
            close_error: None,
            duration: start.elapsed(),
        };
        RunOutcome::new(latch.into_inner(), stats)
    }
}
