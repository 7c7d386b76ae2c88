//! Pipeline primitives: the work queue, the result store, the fatal-error
//! latch, the trade model and the engine registry.

pub mod error;
pub mod latch;
pub mod queue;
pub mod registry;
pub mod results;
pub mod trade;

pub use error::{Error, Result};
pub use latch::{BoxError, FatalError, FatalLatch};
pub use queue::{QueuePublisher, QueueSubscriber, WorkQueue};
pub use registry::{EngineRegistry, Priced, PricingEngine, PricingError};
pub use results::{PriceOutcome, ScalarResult, ScalarResults};
pub use trade::{Trade, TradeType};
