//! [`Database`]: the single logical connection shared by every store.
//!
//! The live [`tokio_rusqlite::Connection`] runs on its own thread and
//! serializes all statements. This module owns the handle, re-establishes it
//! when it goes stale and retries the failed statement exactly once.

use std::{future::Future, path::PathBuf, pin::Pin, sync::Arc};

use rusqlite::{ErrorCode, Row, params_from_iter, types::Value};
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;

use crate::{Error, Result, schema::SCHEMA};

/// Build a positional parameter list from heterogeneous values.
macro_rules! values {
  () => { Vec::<rusqlite::types::Value>::new() };
  ($($v:expr),+ $(,)?) => { vec![$(rusqlite::types::Value::from($v)),+] };
}
pub(crate) use values;

/// Maps one result row to a value.
pub type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;

// ─── Connectors ──────────────────────────────────────────────────────────────

/// Opens new connections on demand.
pub trait Connector: Send + Sync + 'static {
  fn connect(
    &self,
  ) -> Pin<Box<dyn Future<Output = tokio_rusqlite::Result<Connection>> + Send + '_>>;

  /// Whether a new connection sees the data written through earlier ones.
  fn persistent(&self) -> bool { true }
}

/// Where a SQLite database lives.
#[derive(Debug, Clone)]
pub enum SqliteConnector {
  File(PathBuf),
  /// Each connection gets a fresh, empty database. After [`Database::dispose`]
  /// or a reconnect, every earlier write is gone.
  Memory,
}

impl Connector for SqliteConnector {
  fn connect(
    &self,
  ) -> Pin<Box<dyn Future<Output = tokio_rusqlite::Result<Connection>> + Send + '_>> {
    Box::pin(async move {
      match self {
        Self::File(path) => Connection::open(path).await,
        Self::Memory => Connection::open_in_memory().await,
      }
    })
  }

  fn persistent(&self) -> bool { matches!(self, Self::File(_)) }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  /// No connection is open (before first use or after [`Database::dispose`]).
  Disconnected,
  Healthy,
  Reconnecting,
  /// The last reconnect attempt failed; the next call tries again.
  Failed,
}

struct Slot {
  conn:       Option<Connection>,
  /// Bumped on every successful (re)connect so concurrent callers that saw
  /// the same failure reconnect only once.
  generation: u64,
  state:      ConnectionState,
}

// ─── Database ────────────────────────────────────────────────────────────────

/// Connection manager. Cloning is cheap; clones share the same connection.
#[derive(Clone)]
pub struct Database {
  connector: Arc<dyn Connector>,
  slot:      Arc<Mutex<Slot>>,
}

impl Database {
  /// Connect eagerly and initialise the schema.
  pub async fn open(connector: impl Connector) -> Result<Self> {
    let db = Self {
      connector: Arc::new(connector),
      slot:      Arc::new(Mutex::new(Slot {
        conn:       None,
        generation: 0,
        state:      ConnectionState::Disconnected,
      })),
    };
    db.acquire().await.map_err(classify)?;
    Ok(db)
  }

  pub async fn state(&self) -> ConnectionState { self.slot.lock().await.state }

  /// Version string of the backing SQLite library.
  pub async fn version(&self) -> Result<String> {
    let version = self
      .fetchone("SELECT sqlite_version()", values![], |row| row.get(0))
      .await?;
    Ok(version.unwrap_or_default())
  }

  // ── Statements ──────────────────────────────────────────────────────────

  /// Run one statement and return the number of rows it changed.
  pub async fn execute(&self, sql: impl Into<String>, params: Vec<Value>) -> Result<usize> {
    let sql = sql.into();
    self
      .call(move |conn| conn.execute(&sql, params_from_iter(params.iter())))
      .await
  }

  /// Run one statement inside its own transaction and commit it.
  pub async fn commit(&self, sql: impl Into<String>, params: Vec<Value>) -> Result<usize> {
    let sql = sql.into();
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(&sql, params_from_iter(params.iter()))?;
        tx.commit()?;
        Ok(changed)
      })
      .await
  }

  /// First row of a query, if any. Remaining rows are drained before the
  /// statement is released.
  pub async fn fetchone<T: Send + 'static>(
    &self,
    sql: impl Into<String>,
    params: Vec<Value>,
    map: RowMapper<T>,
  ) -> Result<Option<T>> {
    let sql = sql.into();
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let first = match rows.next()? {
          Some(row) => Some(map(row)?),
          None => None,
        };
        while rows.next()?.is_some() {}
        Ok(first)
      })
      .await
  }

  pub async fn fetchall<T: Send + 'static>(
    &self,
    sql: impl Into<String>,
    params: Vec<Value>,
    map: RowMapper<T>,
  ) -> Result<Vec<T>> {
    let sql = sql.into();
    self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params.iter()), map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
  }

  /// Run `f` inside a single transaction. It commits only if `f` succeeds.
  pub async fn transaction<F, R>(&self, f: F) -> Result<R>
  where
    F: Fn(&rusqlite::Transaction<'_>) -> rusqlite::Result<R> + Send + Sync + 'static,
    R: Send + 'static,
  {
    self
      .call(move |conn| {
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
      })
      .await
  }

  /// Close the connection. Safe to call repeatedly; a later statement
  /// reconnects.
  pub async fn dispose(&self) {
    let mut slot = self.slot.lock().await;
    if let Some(conn) = slot.conn.take()
      && let Err(e) = conn.close().await
    {
      tracing::warn!(error = %e, "error while closing database connection");
    }
    slot.state = ConnectionState::Disconnected;
  }

  // ── Retry machinery ─────────────────────────────────────────────────────

  /// Run `f` on the connection, reconnecting and retrying once if the
  /// connection turns out to be gone.
  pub async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: Fn(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + Sync + 'static,
    R: Send + 'static,
  {
    let f = Arc::new(f);
    let (conn, generation) = self.acquire().await.map_err(Error::ConnectionLost)?;

    match run(&conn, f.clone()).await {
      Ok(out) => return Ok(out),
      Err(e) if is_transient(&e) => {
        tracing::warn!(error = %e, "database connection lost; reconnecting");
      }
      Err(e) => return Err(classify(e)),
    }

    let conn = self.reconnect(generation).await.map_err(|e| {
      tracing::error!(error = %e, "reconnect failed");
      Error::ConnectionLost(e)
    })?;

    match run(&conn, f).await {
      Ok(out) => Ok(out),
      Err(e) if is_transient(&e) => {
        tracing::error!(error = %e, "database connection lost again after reconnect");
        self.slot.lock().await.state = ConnectionState::Failed;
        Err(Error::ConnectionLost(e))
      }
      Err(e) => Err(classify(e)),
    }
  }

  /// The current connection, opening one if none exists.
  async fn acquire(&self) -> tokio_rusqlite::Result<(Connection, u64)> {
    let mut slot = self.slot.lock().await;
    if let Some(conn) = &slot.conn {
      return Ok((conn.clone(), slot.generation));
    }
    let conn = self.establish(&mut slot).await?;
    Ok((conn, slot.generation))
  }

  /// Replace the connection observed at `generation`, unless another caller
  /// already did.
  async fn reconnect(&self, generation: u64) -> tokio_rusqlite::Result<Connection> {
    let mut slot = self.slot.lock().await;
    if slot.generation != generation
      && let Some(conn) = &slot.conn
    {
      return Ok(conn.clone());
    }
    slot.conn = None;
    self.establish(&mut slot).await
  }

  /// Open a connection and apply the schema. This is the one statement run
  /// under the slot lock, so no caller can see a connection without tables.
  async fn establish(&self, slot: &mut Slot) -> tokio_rusqlite::Result<Connection> {
    slot.state = ConnectionState::Reconnecting;
    if slot.generation > 0 && !self.connector.persistent() {
      tracing::warn!("reconnecting a non-persistent database; previous data is lost");
    }

    let opened = async {
      let conn = self.connector.connect().await?;
      conn
        .call(|conn| {
          conn.execute_batch(SCHEMA)?;
          Ok(())
        })
        .await?;
      Ok::<_, tokio_rusqlite::Error>(conn)
    }
    .await;

    match opened {
      Ok(conn) => {
        slot.conn = Some(conn.clone());
        slot.generation += 1;
        slot.state = ConnectionState::Healthy;
        tracing::debug!(generation = slot.generation, "database connection established");
        Ok(conn)
      }
      Err(e) => {
        slot.state = ConnectionState::Failed;
        Err(e)
      }
    }
  }
}

async fn run<F, R>(conn: &Connection, f: Arc<F>) -> tokio_rusqlite::Result<R>
where
  F: Fn(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + Sync + 'static,
  R: Send + 'static,
{
  conn.call(move |conn| Ok(f(conn)?)).await
}

// ─── Error classification ────────────────────────────────────────────────────

/// Errors that mean the connection itself is unusable.
fn is_transient(e: &tokio_rusqlite::Error) -> bool {
  match e {
    tokio_rusqlite::Error::ConnectionClosed | tokio_rusqlite::Error::Close(_) => true,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, _)) => {
      matches!(err.code, ErrorCode::CannotOpen | ErrorCode::SystemIoFailure)
    }
    _ => false,
  }
}

/// Map a non-transient driver error onto the store's error type, logging it.
fn classify(e: tokio_rusqlite::Error) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, msg)) = &e
    && err.code == ErrorCode::ConstraintViolation
  {
    let msg = msg.clone().unwrap_or_else(|| err.to_string());
    tracing::warn!(error = %msg, "constraint violation");
    return Error::Conflict(msg);
  }
  tracing::error!(error = %e, "database error");
  Error::Database(e)
}
