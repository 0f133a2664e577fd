//! [`ThreadStore`] for [`SqliteStore`].

use parley_core::{store::ThreadStore, thread::Thread};

use crate::{
  Error, Result, SqliteStore,
  connection::values,
  decode::{self, THREAD_COLUMNS},
};

impl ThreadStore for SqliteStore {
  type Error = Error;

  async fn thread_exists(&self, uri: &str) -> Result<bool> {
    let found = self
      .db
      .fetchone(
        "SELECT 1 FROM threads WHERE uri = ?1",
        values![uri.to_owned()],
        |_| Ok(()),
      )
      .await?;
    Ok(found.is_some())
  }

  async fn thread_by_uri(&self, uri: &str) -> Result<Thread> {
    self
      .db
      .fetchone(
        format!("SELECT {THREAD_COLUMNS} FROM threads WHERE uri = ?1"),
        values![uri.to_owned()],
        decode::thread,
      )
      .await?
      .ok_or_else(|| parley_core::Error::ThreadNotFound(uri.to_owned()).into())
  }

  async fn thread_by_id(&self, id: i64) -> Result<Thread> {
    self
      .db
      .fetchone(
        format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
        values![id],
        decode::thread,
      )
      .await?
      .ok_or_else(|| parley_core::Error::ThreadIdNotFound(id).into())
  }

  async fn create_thread(&self, uri: &str, title: Option<&str>) -> Result<Thread> {
    self
      .db
      .commit(
        "INSERT INTO threads (uri, title) VALUES (?1, ?2)",
        values![uri.to_owned(), title.map(str::to_owned)],
      )
      .await?;
    tracing::debug!(uri, "created thread");
    self.thread_by_uri(uri).await
  }
}
