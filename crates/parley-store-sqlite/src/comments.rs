//! [`CommentStore`] for [`SqliteStore`].
//!
//! Every multi-statement mutation (add, vote, delete, purge) runs inside one
//! transaction, so a crash can never leave a comment half scrubbed.

use std::{
  collections::{BTreeMap, HashMap},
  time::Duration,
};

use chrono::Utc;
use parley_core::{
  BloomFilter,
  comment::{
    Comment, CommentPatch, FieldValue, Mode, ModeMask, NewComment, ThreadedComment, Votes, now,
  },
  query::{AdminQuery, FetchQuery, ParentFilter, SortColumn},
  store::CommentStore,
};
use rusqlite::{OptionalExtension as _, params, types::Value};

use crate::{
  Error, Result, SqliteStore,
  connection::values,
  decode::{COMMENT_COLUMNS, RawComment, raw_comment, raw_threaded_comment},
};

/// Removes tombstones nobody replies to any more.
const SWEEP_ORPHANS: &str = "DELETE FROM comments
  WHERE mode = 4
    AND id NOT IN (SELECT parent FROM comments WHERE parent IS NOT NULL)";

/// Scrubs a comment's content and marks it tombstoned.
const SCRUB: &str = "UPDATE comments
  SET text = '', author = NULL, website = NULL, mode = 4";

/// URIs bound per `count` statement, well below SQLite's variable limit.
const COUNT_CHUNK: usize = 500;

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Delete orphaned tombstones until none are left. Removing a tombstoned
/// reply can orphan its tombstoned parent, which the next pass picks up.
fn sweep_orphans(conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
  let mut removed = 0;
  loop {
    match conn.execute(SWEEP_ORPHANS, [])? {
      0 => return Ok(removed),
      n => removed += n,
    }
  }
}

fn field_value(value: FieldValue) -> Value {
  match value {
    FieldValue::Null => Value::Null,
    FieldValue::Integer(i) => Value::Integer(i),
    FieldValue::Real(r) => Value::Real(r),
    FieldValue::Text(s) => Value::Text(s),
  }
}

/// Appends the filters shared by every thread listing.
struct Listing {
  sql:    String,
  params: Vec<Value>,
}

impl Listing {
  fn new(select: &str) -> Self {
    Self {
      sql:    format!("{select} FROM comments INNER JOIN threads ON threads.id = comments.tid WHERE 1 = 1"),
      params: Vec::new(),
    }
  }

  fn uri(mut self, uri: &str) -> Self {
    self.sql.push_str(" AND threads.uri = ?");
    self.params.push(Value::Text(uri.to_owned()));
    self
  }

  fn mask(mut self, mask: ModeMask) -> Self {
    self.sql.push_str(" AND (? | comments.mode) = ?");
    let bits = i64::from(mask.bits());
    self.params.extend([Value::Integer(bits), Value::Integer(bits)]);
    self
  }

  fn after(mut self, after: f64) -> Self {
    self.sql.push_str(" AND comments.created > ?");
    self.params.push(Value::Real(after));
    self
  }

  fn parent(mut self, parent: ParentFilter) -> Self {
    match parent {
      ParentFilter::Any => {}
      ParentFilter::TopLevel => self.sql.push_str(" AND comments.parent IS NULL"),
      ParentFilter::Exact(id) => {
        self.sql.push_str(" AND comments.parent = ?");
        self.params.push(Value::Integer(id));
      }
    }
    self
  }

  /// Sort by an allow-listed column, breaking ties by creation time.
  fn order(mut self, column: SortColumn, ascending: bool) -> Self {
    let direction = if ascending { "ASC" } else { "DESC" };
    self
      .sql
      .push_str(&format!(" ORDER BY comments.{} {direction}", column.column()));
    if column != SortColumn::Created {
      self.sql.push_str(", comments.created ASC");
    }
    self
  }

  /// A zero limit means no cap.
  fn limit(mut self, limit: Option<u32>, offset: u64) -> Self {
    if let Some(limit) = limit.filter(|&n| n > 0) {
      self.sql.push_str(" LIMIT ? OFFSET ?");
      self.params.push(Value::Integer(i64::from(limit)));
      self.params.push(Value::Integer(offset as i64));
    }
    self
  }

  fn group_by_parent(mut self) -> Self {
    self.sql.push_str(" GROUP BY comments.parent");
    self
  }
}

enum Added {
  Comment(RawComment),
  UnknownThread,
  UnknownParent(i64),
}

// ─── CommentStore impl ───────────────────────────────────────────────────────

impl CommentStore for SqliteStore {
  type Error = Error;

  async fn add(&self, uri: &str, comment: NewComment) -> Result<Comment> {
    let uri_owned = uri.to_owned();
    let created = comment.created.unwrap_or_else(now);
    let voters = BloomFilter::seeded(&comment.remote_addr).into_bytes();

    let added = self
      .db
      .transaction(move |tx| {
        // Replies to replies hang off the top-level ancestor.
        let parent = match comment.parent {
          None => None,
          Some(id) => {
            let grandparent: Option<Option<i64>> = tx
              .query_row("SELECT parent FROM comments WHERE id = ?1", [id], |r| r.get(0))
              .optional()?;
            match grandparent {
              None => return Ok(Added::UnknownParent(id)),
              Some(grandparent) => Some(grandparent.unwrap_or(id)),
            }
          }
        };

        let inserted = tx.execute(
          "INSERT INTO comments (
             tid, parent, created, modified, mode, remote_addr,
             text, author, email, website, voters, notification
           )
           SELECT threads.id, ?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
           FROM threads WHERE threads.uri = ?11",
          params![
            parent,
            created,
            comment.mode.bits(),
            comment.remote_addr,
            comment.text,
            comment.author,
            comment.email,
            comment.website,
            voters,
            comment.notification,
            uri_owned,
          ],
        )?;
        if inserted == 0 {
          return Ok(Added::UnknownThread);
        }

        let id = tx.last_insert_rowid();
        let raw = tx.query_row(
          &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
          [id],
          raw_comment,
        )?;
        Ok(Added::Comment(raw))
      })
      .await?;

    match added {
      Added::Comment(raw) => {
        let comment = raw.into_comment()?;
        tracing::debug!(id = comment.id, uri, parent = ?comment.parent, "added comment");
        Ok(comment)
      }
      Added::UnknownThread => Err(parley_core::Error::ThreadNotFound(uri.to_owned()).into()),
      Added::UnknownParent(id) => Err(parley_core::Error::CommentNotFound(id).into()),
    }
  }

  async fn get(&self, id: i64) -> Result<Option<Comment>> {
    self
      .db
      .fetchone(
        format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
        values![id],
        raw_comment,
      )
      .await?
      .map(RawComment::into_comment)
      .transpose()
  }

  async fn update(&self, id: i64, patch: CommentPatch) -> Result<Comment> {
    let assignments = patch.assignments();
    if !assignments.is_empty() {
      let mut columns = Vec::with_capacity(assignments.len());
      let mut params = Vec::with_capacity(assignments.len() + 1);
      for (i, (column, value)) in assignments.into_iter().enumerate() {
        columns.push(format!("{column} = ?{}", i + 1));
        params.push(field_value(value));
      }
      params.push(Value::Integer(id));

      let sql = format!(
        "UPDATE comments SET {} WHERE id = ?{}",
        columns.join(", "),
        params.len()
      );
      self.db.execute(sql, params).await?;
    }

    self
      .get(id)
      .await?
      .ok_or_else(|| parley_core::Error::CommentNotFound(id).into())
  }

  async fn activate(&self, id: i64) -> Result<()> {
    self
      .db
      .execute(
        "UPDATE comments SET mode = 1 WHERE id = ?1 AND mode = 2",
        values![id],
      )
      .await?;
    Ok(())
  }

  async fn unsubscribe(&self, email: &str, id: i64) -> Result<()> {
    self
      .db
      .execute(
        "UPDATE comments SET notification = 0
         WHERE email = ?1 AND (id = ?2 OR parent = ?2)",
        values![email.to_owned(), id],
      )
      .await?;
    Ok(())
  }

  async fn is_previously_approved_author(&self, email: Option<&str>) -> Result<bool> {
    let Some(email) = email.filter(|e| !e.is_empty()) else {
      return Ok(false);
    };
    let cutoff = self.policy.approval_cutoff(Utc::now());

    let found = self
      .db
      .fetchone(
        "SELECT EXISTS (
           SELECT 1 FROM comments WHERE email = ?1 AND mode = 1 AND created > ?2
         )",
        values![email.to_owned(), cutoff],
        |row| row.get::<_, bool>(0),
      )
      .await?;
    Ok(found.unwrap_or(false))
  }

  async fn vote(&self, upvote: bool, id: i64, remote_addr: &str) -> Result<Option<Votes>> {
    let cap = self.policy.vote_cap;
    let addr = remote_addr.to_owned();

    self
      .db
      .transaction(move |tx| {
        let row: Option<(u32, u32, Vec<u8>)> = tx
          .query_row(
            "SELECT likes, dislikes, voters FROM comments WHERE id = ?1",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;
        let Some((likes, dislikes, voters)) = row else {
          return Ok(None);
        };

        let current = Votes { likes, dislikes };
        if current.total() >= cap {
          return Ok(Some(current));
        }

        let mut filter = BloomFilter::from_bytes(voters, current.total() as usize).map_err(|e| {
          rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Blob, Box::new(e))
        })?;
        if filter.contains(&addr) {
          return Ok(Some(current));
        }
        filter.insert(&addr);

        let sql = if upvote {
          "UPDATE comments SET likes = likes + 1, voters = ?1 WHERE id = ?2"
        } else {
          "UPDATE comments SET dislikes = dislikes + 1, voters = ?1 WHERE id = ?2"
        };
        tx.execute(sql, params![filter.as_bytes(), id])?;

        Ok(Some(if upvote {
          Votes { likes: likes + 1, ..current }
        } else {
          Votes { dislikes: dislikes + 1, ..current }
        }))
      })
      .await
  }

  async fn delete(&self, id: i64) -> Result<Option<Comment>> {
    let (scrubbed, swept) = self
      .db
      .transaction(move |tx| {
        let has_replies: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM comments WHERE parent = ?1)",
          [id],
          |r| r.get(0),
        )?;

        if !has_replies {
          tx.execute("DELETE FROM comments WHERE id = ?1", [id])?;
          return Ok((None, sweep_orphans(tx)?));
        }

        tx.execute(&format!("{SCRUB} WHERE id = ?1"), [id])?;
        let swept = sweep_orphans(tx)?;
        let raw = tx
          .query_row(
            &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
            [id],
            raw_comment,
          )
          .optional()?;
        Ok((raw, swept))
      })
      .await?;

    tracing::debug!(id, soft = scrubbed.is_some(), swept, "deleted comment");
    scrubbed.map(RawComment::into_comment).transpose()
  }

  async fn purge(&self, age: Duration) -> Result<()> {
    let cutoff = now() - age.as_secs_f64();

    let (removed, swept) = self
      .db
      .transaction(move |tx| {
        // Expired pending comments that already have replies keep the tree
        // intact as tombstones; the sweep removes them once childless.
        tx.execute(
          &format!(
            "{SCRUB} WHERE mode = 2 AND created < ?1
               AND id IN (SELECT parent FROM comments WHERE parent IS NOT NULL)"
          ),
          [cutoff],
        )?;
        let removed = tx.execute(
          "DELETE FROM comments WHERE mode = 2 AND created < ?1",
          [cutoff],
        )?;
        Ok((removed, sweep_orphans(tx)?))
      })
      .await?;

    tracing::info!(removed, swept, "purged expired pending comments");
    Ok(())
  }

  async fn count(&self, uris: &[&str]) -> Result<Vec<u64>> {
    let mut counts: HashMap<String, u64> = HashMap::new();

    for chunk in uris.chunks(COUNT_CHUNK) {
      let placeholders = vec!["?"; chunk.len()].join(", ");
      let sql = format!(
        "SELECT threads.uri, COUNT(comments.id)
         FROM comments INNER JOIN threads ON threads.id = comments.tid
         WHERE comments.mode = 1 AND threads.uri IN ({placeholders})
         GROUP BY threads.uri"
      );
      let params = chunk.iter().map(|u| Value::Text((*u).to_owned())).collect();

      let rows: Vec<(String, u64)> = self
        .db
        .fetchall(sql, params, |row| Ok((row.get(0)?, row.get(1)?)))
        .await?;
      counts.extend(rows);
    }

    Ok(uris.iter().map(|u| counts.get(*u).copied().unwrap_or(0)).collect())
  }

  async fn count_modes(&self) -> Result<BTreeMap<Mode, u64>> {
    let rows: Vec<(i64, u64)> = self
      .db
      .fetchall(
        "SELECT mode, COUNT(*) FROM comments GROUP BY mode",
        values![],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .await?;

    rows
      .into_iter()
      .map(|(mode, n)| -> Result<(Mode, u64)> { Ok((Mode::from_bits(mode)?, n)) })
      .collect()
  }

  async fn fetch(&self, uri: &str, query: &FetchQuery) -> Result<Vec<Comment>> {
    let listing = Listing::new(&format!("SELECT {COMMENT_COLUMNS}"))
      .uri(uri)
      .mask(query.mask)
      .after(query.after)
      .parent(query.parent)
      .order(query.order_by, query.ascending)
      .limit(query.limit, 0);

    self
      .db
      .fetchall(listing.sql, listing.params, raw_comment)
      .await?
      .into_iter()
      .map(RawComment::into_comment)
      .collect()
  }

  async fn fetchall(&self, query: &AdminQuery) -> Result<Vec<ThreadedComment>> {
    let (limit, offset) = match query.window() {
      Some((limit, offset)) => (Some(limit), offset),
      None => (None, 0),
    };
    let listing = Listing::new(&format!("SELECT {COMMENT_COLUMNS}, threads.uri, threads.title"))
      .mask(query.mask)
      .after(query.after)
      .parent(query.parent)
      .order(query.order_by, query.ascending)
      .limit(limit, offset);

    self
      .db
      .fetchall(listing.sql, listing.params, raw_threaded_comment)
      .await?
      .into_iter()
      .map(|raw| raw.into_threaded())
      .collect()
  }

  async fn reply_count(
    &self,
    uri: &str,
    mask: ModeMask,
    after: f64,
  ) -> Result<BTreeMap<Option<i64>, u64>> {
    let listing = Listing::new("SELECT comments.parent, COUNT(*)")
      .uri(uri)
      .mask(mask)
      .after(after)
      .group_by_parent();

    let rows: Vec<(Option<i64>, u64)> = self
      .db
      .fetchall(listing.sql, listing.params, |row| Ok((row.get(0)?, row.get(1)?)))
      .await?;
    Ok(rows.into_iter().collect())
  }
}
