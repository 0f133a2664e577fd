//! SQLite backend for the Parley comment store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`Database`] owns that connection and
//! recovers it when it drops.

mod comments;
mod decode;
mod preferences;
mod schema;
mod store;
mod threads;

pub mod connection;
pub mod error;

pub use connection::{ConnectionState, Connector, Database, SqliteConnector};
pub use error::{Error, Result};
pub use preferences::SESSION_KEY;
pub use store::{SqliteStore, StoreConfig};
