use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("queue closed")]
    QueueClosed,
    #[error("writer already active")]
    WriterAlreadyActive,
    #[error("all subscribers disconnected")]
    Disconnected,
    #[error("lock poisoned: {0}")]
    Poisoned(&'static str),
    #[error("result already recorded for trade {0}")]
    DuplicateResult(String),
    #[error("error already recorded for trade {0}")]
    DuplicateError(String),
    #[error("invalid trade: {0}")]
    InvalidTrade(String),
    #[error("pipeline incomplete: {0}")]
    Incomplete(String),
}

pub type Result<T> = std::result::Result<T, Error>;
