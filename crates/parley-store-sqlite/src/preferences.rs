//! [`PreferenceStore`] for [`SqliteStore`].

use parley_core::store::PreferenceStore;
use rand_core::{OsRng, RngCore as _};

use crate::{Error, Result, SqliteStore, connection::values};

/// Key of the randomly generated secret used to sign sessions.
pub const SESSION_KEY: &str = "session-key";

/// Preferences written on first start, with a generator for each value.
const DEFAULTS: &[(&str, fn() -> String)] = &[(SESSION_KEY, session_key)];

/// 24 random bytes from the OS, hex-encoded.
fn session_key() -> String {
  let mut bytes = [0u8; 24];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

impl PreferenceStore for SqliteStore {
  type Error = Error;

  async fn get_preference(&self, key: &str) -> Result<Option<String>> {
    self
      .db
      .fetchone(
        "SELECT value FROM preferences WHERE key = ?1",
        values![key.to_owned()],
        |row| row.get(0),
      )
      .await
  }

  async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
    self
      .db
      .commit(
        "INSERT INTO preferences (key, value) VALUES (?1, ?2)",
        values![key.to_owned(), value.to_owned()],
      )
      .await?;
    Ok(())
  }

  async fn seed_preferences(&self) -> Result<usize> {
    let mut seeded = 0;
    for (key, generate) in DEFAULTS {
      if self.get_preference(key).await?.is_some() {
        continue;
      }
      match self.set_preference(key, &generate()).await {
        Ok(()) => seeded += 1,
        // Another process seeded the same key in between.
        Err(Error::Conflict(_)) => {
          tracing::debug!(key, "preference already seeded");
        }
        Err(e) => return Err(e),
      }
    }
    if seeded > 0 {
      tracing::info!(seeded, "seeded default preferences");
    }
    Ok(seeded)
  }
}
