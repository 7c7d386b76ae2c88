use std::sync::OnceLock;

use thiserror::Error;

use crate::core::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure of the pipeline machinery itself, as opposed to a single trade.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("trade enumeration failed after {enqueued} trades: {source}")]
    Enumeration {
        enqueued: u64,
        #[source]
        source: BoxError,
    },
    #[error("trade enumeration panicked after {enqueued} trades: {message}")]
    EnumerationPanicked { enqueued: u64, message: String },
    #[error("producer stopped after {enqueued} trades: {source}")]
    Producer {
        enqueued: u64,
        #[source]
        source: Error,
    },
    #[error("worker {worker_id} failed: {source}")]
    Worker {
        worker_id: usize,
        #[source]
        source: Error,
    },
    #[error("worker {worker_id} panicked: {message}")]
    WorkerPanicked { worker_id: usize, message: String },
    #[error("failed to spawn worker {worker_id}: {source}")]
    Spawn {
        worker_id: usize,
        #[source]
        source: std::io::Error,
    },
}

/// Set-once slot holding the first fatal error of a run.
#[derive(Debug, Default)]
pub struct FatalLatch {
    slot: OnceLock<FatalError>,
}

impl FatalLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` if nothing has been latched yet. Returns `true` when
    /// this call won; later errors are logged and dropped.
    pub fn trip(&self, error: FatalError) -> bool {
        match self.slot.set(error) {
            Ok(()) => {
                if let Some(latched) = self.slot.get() {
                    log::error!("pipeline fatal error: {latched}");
                }
                true
            }
            Err(discarded) => {
                log::warn!("discarding subsequent fatal error: {discarded}");
                false
            }
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn get(&self) -> Option<&FatalError> {
        self.slot.get()
    }

    pub fn into_inner(self) -> Option<FatalError> {
        self.slot.into_inner()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
