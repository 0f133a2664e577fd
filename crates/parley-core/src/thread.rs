//! Threads: the comment-bearing unit identified by a page URI.

use serde::{Deserialize, Serialize};

/// A thread row. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
  pub id:    i64,
  pub uri:   String,
  pub title: Option<String>,
}
