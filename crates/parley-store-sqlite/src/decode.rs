//! Decoding helpers between SQLite rows and domain types.
//!
//! Row mappers run on the connection thread and only copy column values out;
//! validation (mode bits, voter filter size) happens afterwards so it can
//! report `parley_core` errors.

use parley_core::{
  BloomFilter,
  comment::{Comment, Mode, ThreadedComment},
  thread::Thread,
};
use rusqlite::Row;

use crate::Result;

/// Columns of `comments`, in the order [`raw_comment`] reads them.
pub const COMMENT_COLUMNS: &str = "comments.tid, comments.id, comments.parent, \
  comments.created, comments.modified, comments.mode, comments.remote_addr, \
  comments.text, comments.author, comments.email, comments.website, \
  comments.likes, comments.dislikes, comments.voters, comments.notification";

const COMMENT_COLUMN_COUNT: usize = 15;

pub const THREAD_COLUMNS: &str = "threads.id, threads.uri, threads.title";

// ─── Threads ─────────────────────────────────────────────────────────────────

pub fn thread(row: &Row<'_>) -> rusqlite::Result<Thread> {
  Ok(Thread {
    id:    row.get(0)?,
    uri:   row.get(1)?,
    title: row.get(2)?,
  })
}

// ─── Comments ────────────────────────────────────────────────────────────────

/// Column values read directly from a `comments` row.
pub struct RawComment {
  pub tid:          i64,
  pub id:           i64,
  pub parent:       Option<i64>,
  pub created:      f64,
  pub modified:     Option<f64>,
  pub mode:         i64,
  pub remote_addr:  Option<String>,
  pub text:         Option<String>,
  pub author:       Option<String>,
  pub email:        Option<String>,
  pub website:      Option<String>,
  pub likes:        u32,
  pub dislikes:     u32,
  pub voters:       Vec<u8>,
  pub notification: bool,
}

pub fn raw_comment(row: &Row<'_>) -> rusqlite::Result<RawComment> {
  Ok(RawComment {
    tid:          row.get(0)?,
    id:           row.get(1)?,
    parent:       row.get(2)?,
    created:      row.get(3)?,
    modified:     row.get(4)?,
    mode:         row.get(5)?,
    remote_addr:  row.get(6)?,
    text:         row.get(7)?,
    author:       row.get(8)?,
    email:        row.get(9)?,
    website:      row.get(10)?,
    likes:        row.get(11)?,
    dislikes:     row.get(12)?,
    voters:       row.get(13)?,
    notification: row.get(14)?,
  })
}

impl RawComment {
  pub fn into_comment(self) -> Result<Comment> {
    let elements = (self.likes + self.dislikes) as usize;
    Ok(Comment {
      tid:          self.tid,
      id:           self.id,
      parent:       self.parent,
      created:      self.created,
      modified:     self.modified,
      mode:         Mode::from_bits(self.mode)?,
      remote_addr:  self.remote_addr,
      text:         self.text,
      author:       self.author,
      email:        self.email,
      website:      self.website,
      likes:        self.likes,
      dislikes:     self.dislikes,
      voters:       BloomFilter::from_bytes(self.voters, elements)?,
      notification: self.notification,
    })
  }
}

/// A comment row joined with its thread's `uri` and `title`.
pub struct RawThreadedComment {
  pub comment: RawComment,
  pub uri:     String,
  pub title:   Option<String>,
}

/// Reads [`COMMENT_COLUMNS`] followed by `threads.uri, threads.title`.
pub fn raw_threaded_comment(row: &Row<'_>) -> rusqlite::Result<RawThreadedComment> {
  Ok(RawThreadedComment {
    comment: raw_comment(row)?,
    uri:     row.get(COMMENT_COLUMN_COUNT)?,
    title:   row.get(COMMENT_COLUMN_COUNT + 1)?,
  })
}

impl RawThreadedComment {
  pub fn into_threaded(self) -> Result<ThreadedComment> {
    Ok(ThreadedComment {
      comment: self.comment.into_comment()?,
      uri:     self.uri,
      title:   self.title,
    })
  }
}
