//! Error types for `parley-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("thread not found: {0:?}")]
  ThreadNotFound(String),

  #[error("thread not found: id {0}")]
  ThreadIdNotFound(i64),

  #[error("comment not found: {0}")]
  CommentNotFound(i64),

  #[error("unknown comment mode: {0}")]
  UnknownMode(i64),

  #[error("voter filter has {actual} bytes, expected {expected}")]
  InvalidBloomFilter { expected: usize, actual: usize },

  #[error("invalid bloom filter parameters: {bytes} bytes, {hashes} hashes")]
  InvalidBloomParams { bytes: usize, hashes: u32 },

  #[error(
    "vote cap {cap} is too high for the voter filter: false-positive rate {rate:.3} exceeds {max}"
  )]
  VoteCapTooHigh { cap: u32, rate: f64, max: f64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
