//! [`SqliteStore`], the SQLite implementation of the Parley store traits.
//!
//! The trait impls live next to this file: [`crate::threads`],
//! [`crate::comments`] and [`crate::preferences`].

use std::path::PathBuf;

use parley_core::{BloomParams, Policy};
use serde::Deserialize;

use crate::{
  Result,
  connection::{Connector, Database, SqliteConnector},
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Store settings, deserialised by the embedding application.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Path of the SQLite database file.
  pub path:   PathBuf,
  #[serde(default)]
  pub policy: Policy,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parley comment store backed by a single SQLite connection.
///
/// Clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) db:     Database,
  pub(crate) policy: Policy,
}

impl SqliteStore {
  /// Open (or create) the database described by `config`.
  pub async fn open(config: &StoreConfig) -> Result<Self> {
    let connector = SqliteConnector::File(config.path.clone());
    Self::with_connector(connector, config.policy).await
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    Self::with_connector(SqliteConnector::Memory, Policy::default()).await
  }

  /// Open a store on connections from `connector`. Fails before connecting
  /// if the voter filter cannot support `policy.vote_cap`.
  pub async fn with_connector(connector: impl Connector, policy: Policy) -> Result<Self> {
    policy.validate(BloomParams::DEFAULT)?;
    let db = Database::open(connector).await?;
    Ok(Self { db, policy })
  }

  /// The underlying connection manager.
  pub fn db(&self) -> &Database { &self.db }

  pub fn policy(&self) -> &Policy { &self.policy }
}
