//! Store traits implemented by storage backends (e.g. `parley-store-sqlite`).
//!
//! Higher layers depend on these abstractions, not on a concrete backend.

use std::{collections::BTreeMap, future::Future, time::Duration};

use crate::{
  comment::{Comment, CommentPatch, Mode, ModeMask, NewComment, ThreadedComment, Votes},
  query::{AdminQuery, FetchQuery},
  thread::Thread,
};

// ─── Threads ─────────────────────────────────────────────────────────────────

/// Maps page URIs to threads. Threads are created lazily, never updated.
pub trait ThreadStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn thread_exists<'a>(
    &'a self,
    uri: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Fails when no thread has this URI.
  fn thread_by_uri<'a>(
    &'a self,
    uri: &'a str,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + 'a;

  /// Fails when no thread has this id.
  fn thread_by_id(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + '_;

  /// Insert a thread and return it as stored. Fails with a conflict when the
  /// URI is taken.
  fn create_thread<'a>(
    &'a self,
    uri: &'a str,
    title: Option<&'a str>,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + 'a;
}

// ─── Comments ────────────────────────────────────────────────────────────────

/// The comment tree, its moderation state and vote counters.
pub trait CommentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Add a comment to the (existing) thread at `uri`. Replies to replies are
  /// attached to the top-level ancestor instead.
  fn add<'a>(
    &'a self,
    uri: &'a str,
    comment: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + 'a;

  fn get(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Apply `patch` and return the refreshed comment.
  fn update(
    &self,
    id: i64,
    patch: CommentPatch,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Move a pending comment to valid. No-op for any other mode.
  fn activate(&self, id: i64) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Turn off reply notifications for `id` and its replies, but only on rows
  /// that belong to `email`.
  fn unsubscribe<'a>(
    &'a self,
    email: &'a str,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Whether `email` has a valid comment inside the policy's approval window.
  fn is_previously_approved_author<'a>(
    &'a self,
    email: Option<&'a str>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Register a vote. Returns `None` for an unknown comment; repeated voters
  /// and votes past the cap leave the counters untouched.
  fn vote<'a>(
    &'a self,
    upvote: bool,
    id: i64,
    remote_addr: &'a str,
  ) -> impl Future<Output = Result<Option<Votes>, Self::Error>> + Send + 'a;

  /// Delete a comment. Comments with replies are scrubbed and tombstoned
  /// (the scrubbed row is returned); others are removed. Tombstones left
  /// without replies are swept afterwards.
  fn delete(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Remove pending comments older than `age`.
  fn purge(&self, age: Duration) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Valid comments per URI, in input order. Unknown URIs count zero.
  fn count<'a>(
    &'a self,
    uris: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<u64>, Self::Error>> + Send + 'a;

  fn count_modes(
    &self,
  ) -> impl Future<Output = Result<BTreeMap<Mode, u64>, Self::Error>> + Send + '_;

  fn fetch<'a>(
    &'a self,
    uri: &'a str,
    query: &'a FetchQuery,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + 'a;

  fn fetchall<'a>(
    &'a self,
    query: &'a AdminQuery,
  ) -> impl Future<Output = Result<Vec<ThreadedComment>, Self::Error>> + Send + 'a;

  /// Number of comments per parent on one thread; `None` counts top-level
  /// comments.
  fn reply_count<'a>(
    &'a self,
    uri: &'a str,
    mask: ModeMask,
    after: f64,
  ) -> impl Future<Output = Result<BTreeMap<Option<i64>, u64>, Self::Error>> + Send + 'a;
}

// ─── Preferences ─────────────────────────────────────────────────────────────

/// Process-wide key/value settings.
pub trait PreferenceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_preference<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn get_preference_or<'a>(
    &'a self,
    key: &'a str,
    default: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a {
    async move {
      Ok(
        self
          .get_preference(key)
          .await?
          .unwrap_or_else(|| default.to_owned()),
      )
    }
  }

  /// Insert a preference. Fails with a conflict if the key already exists;
  /// callers check first.
  fn set_preference<'a>(
    &'a self,
    key: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Write every default preference whose key is absent. Returns how many
  /// were written.
  fn seed_preferences(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
