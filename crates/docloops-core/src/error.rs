use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum LoopError {
    #[error("Quality threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Max attempts must be at least 1")]
    ZeroMaxAttempts,

    #[error("Stage timeout for {0} must be greater than zero")]
    ZeroTimeout(&'static str),
}
