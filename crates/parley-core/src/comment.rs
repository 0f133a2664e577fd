//! Comment types, the primary entity of the store.
//!
//! Comments form a tree of depth at most two: top-level comments and flat
//! replies to them. Timestamps are fractional seconds since the Unix epoch.

use std::ops::BitOr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BloomFilter, Error, Result};

// ─── Time ────────────────────────────────────────────────────────────────────

/// Convert a UTC instant to fractional epoch seconds.
pub fn timestamp(dt: DateTime<Utc>) -> f64 {
  dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1_000_000.0
}

/// The current time as fractional epoch seconds.
pub fn now() -> f64 { timestamp(Utc::now()) }

// ─── Mode ────────────────────────────────────────────────────────────────────

/// Moderation state of a comment, stored as a single bit.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Mode {
  Valid      = 1,
  Pending    = 2,
  /// Content scrubbed; the row only keeps its replies attached.
  Tombstoned = 4,
}

impl Mode {
  pub fn bits(self) -> u8 { self as u8 }

  pub fn from_bits(bits: i64) -> Result<Self> {
    match bits {
      1 => Ok(Self::Valid),
      2 => Ok(Self::Pending),
      4 => Ok(Self::Tombstoned),
      other => Err(Error::UnknownMode(other)),
    }
  }
}

/// A set of [`Mode`]s. A comment matches when its bit is in the mask, i.e.
/// `mask | mode == mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeMask(u8);

impl ModeMask {
  pub const VALID: Self = Self(1);
  pub const PENDING: Self = Self(2);
  pub const TOMBSTONED: Self = Self(4);
  /// Valid and tombstoned: what a public comment listing shows.
  pub const VISIBLE: Self = Self(5);
  pub const ALL: Self = Self(7);

  pub const fn from_bits(bits: u8) -> Self { Self(bits) }

  pub fn bits(self) -> u8 { self.0 }

  pub fn contains(self, mode: Mode) -> bool { self.0 | mode.bits() == self.0 }
}

impl Default for ModeMask {
  fn default() -> Self { Self::VISIBLE }
}

impl From<Mode> for ModeMask {
  fn from(mode: Mode) -> Self { Self(mode.bits()) }
}

impl BitOr for ModeMask {
  type Output = ModeMask;

  fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

impl BitOr<Mode> for ModeMask {
  type Output = ModeMask;

  fn bitor(self, rhs: Mode) -> Self { Self(self.0 | rhs.bits()) }
}

impl BitOr for Mode {
  type Output = ModeMask;

  fn bitor(self, rhs: Self) -> ModeMask { ModeMask(self.bits() | rhs.bits()) }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A stored comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  pub tid:          i64,
  pub id:           i64,
  /// Always a top-level comment, never a reply.
  pub parent:       Option<i64>,
  pub created:      f64,
  pub modified:     Option<f64>,
  pub mode:         Mode,
  /// Only used for vote deduplication.
  pub remote_addr:  Option<String>,
  pub text:         Option<String>,
  pub author:       Option<String>,
  pub email:        Option<String>,
  pub website:      Option<String>,
  pub likes:        u32,
  pub dislikes:     u32,
  #[serde(skip)]
  pub voters:       BloomFilter,
  pub notification: bool,
}

/// A comment together with the thread it belongs to, as listed for
/// moderators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadedComment {
  #[serde(flatten)]
  pub comment: Comment,
  pub uri:     String,
  pub title:   Option<String>,
}

/// Current vote counters of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Votes {
  pub likes:    u32,
  pub dislikes: u32,
}

impl Votes {
  pub fn total(&self) -> u32 { self.likes + self.dislikes }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// Fields accepted by `CommentStore::add`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
  /// May name a reply; the store rewrites it to the top-level ancestor.
  pub parent:       Option<i64>,
  /// Defaults to the insertion time.
  pub created:      Option<f64>,
  pub mode:         Mode,
  pub remote_addr:  String,
  pub text:         String,
  pub author:       Option<String>,
  pub email:        Option<String>,
  pub website:      Option<String>,
  pub notification: bool,
}

impl NewComment {
  /// A valid, top-level comment with no optional fields set.
  pub fn new(text: impl Into<String>, remote_addr: impl Into<String>) -> Self {
    Self {
      parent:       None,
      created:      None,
      mode:         Mode::Valid,
      remote_addr:  remote_addr.into(),
      text:         text.into(),
      author:       None,
      email:        None,
      website:      None,
      notification: false,
    }
  }

  pub fn reply_to(mut self, parent: i64) -> Self {
    self.parent = Some(parent);
    self
  }

  pub fn with_mode(mut self, mode: Mode) -> Self {
    self.mode = mode;
    self
  }
}

/// A column value carried by a [`CommentPatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl From<Option<String>> for FieldValue {
  fn from(value: Option<String>) -> Self {
    value.map_or(Self::Null, Self::Text)
  }
}

/// A partial update of a comment's mutable fields. `None` leaves a field
/// untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentPatch {
  pub text:         Option<String>,
  pub author:       Option<Option<String>>,
  pub email:        Option<Option<String>>,
  pub website:      Option<Option<String>>,
  pub mode:         Option<Mode>,
  pub modified:     Option<f64>,
  pub notification: Option<bool>,
}

impl CommentPatch {
  pub fn is_empty(&self) -> bool { self.assignments().is_empty() }

  /// `(column, value)` pairs for every field the patch sets. Column names
  /// come from a fixed list and are safe to splice into SQL.
  pub fn assignments(&self) -> Vec<(&'static str, FieldValue)> {
    let mut out = Vec::new();
    if let Some(text) = &self.text {
      out.push(("text", FieldValue::Text(text.clone())));
    }
    if let Some(author) = &self.author {
      out.push(("author", author.clone().into()));
    }
    if let Some(email) = &self.email {
      out.push(("email", email.clone().into()));
    }
    if let Some(website) = &self.website {
      out.push(("website", website.clone().into()));
    }
    if let Some(mode) = self.mode {
      out.push(("mode", FieldValue::Integer(i64::from(mode.bits()))));
    }
    if let Some(modified) = self.modified {
      out.push(("modified", FieldValue::Real(modified)));
    }
    if let Some(notification) = self.notification {
      out.push(("notification", FieldValue::Integer(i64::from(notification))));
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mode_roundtrips_through_bits() {
    for mode in [Mode::Valid, Mode::Pending, Mode::Tombstoned] {
      assert_eq!(Mode::from_bits(i64::from(mode.bits())).unwrap(), mode);
    }
    assert!(matches!(Mode::from_bits(3), Err(Error::UnknownMode(3))));
  }

  #[test]
  fn mask_membership() {
    let visible = ModeMask::default();
    assert!(visible.contains(Mode::Valid));
    assert!(visible.contains(Mode::Tombstoned));
    assert!(!visible.contains(Mode::Pending));

    assert!(!ModeMask::VALID.contains(Mode::Tombstoned));
    assert!(ModeMask::ALL.contains(Mode::Pending));
    assert_eq!(Mode::Valid | Mode::Tombstoned, ModeMask::VISIBLE);
    assert_eq!(ModeMask::VISIBLE | Mode::Pending, ModeMask::ALL);
  }

  #[test]
  fn patch_lists_only_set_fields() {
    let patch = CommentPatch {
      text: Some("edited".into()),
      website: Some(None),
      modified: Some(12.5),
      ..Default::default()
    };

    assert_eq!(
      patch.assignments(),
      vec![
        ("text", FieldValue::Text("edited".into())),
        ("website", FieldValue::Null),
        ("modified", FieldValue::Real(12.5)),
      ]
    );
    assert!(CommentPatch::default().is_empty());
  }

  #[test]
  fn timestamp_keeps_sub_second_precision() {
    let dt = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
    assert_eq!(timestamp(dt), 1_700_000_000.25);
  }

  #[test]
  fn new_comment_defaults() {
    let c = NewComment::new("hi", "127.0.0.1").reply_to(3);
    assert_eq!(c.parent, Some(3));
    assert_eq!(c.mode, Mode::Valid);
    assert!(!c.notification);
  }
}
