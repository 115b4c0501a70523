use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReplayError {
    #[error("already at the beginning")]
    AtBeginning,

    #[error("index {index} out of range for {len} events")]
    OutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, ReplayError>;
