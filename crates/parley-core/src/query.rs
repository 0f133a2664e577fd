//! Query parameters for comment listings.

use serde::{Deserialize, Serialize};

use crate::comment::ModeMask;

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Restricts a listing by the `parent` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentFilter {
  /// No restriction.
  #[default]
  Any,
  /// Only comments without a parent.
  TopLevel,
  /// Only replies to the given comment.
  Exact(i64),
}

/// The columns a listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
  #[default]
  Id,
  Created,
  Modified,
  Likes,
  Dislikes,
}

impl SortColumn {
  pub fn column(self) -> &'static str {
    match self {
      Self::Id => "id",
      Self::Created => "created",
      Self::Modified => "modified",
      Self::Likes => "likes",
      Self::Dislikes => "dislikes",
    }
  }

  /// Resolve a caller-supplied column name. Anything outside the allow-list
  /// sorts by creation time.
  pub fn from_name(name: &str) -> Self {
    match name {
      "id" => Self::Id,
      "modified" => Self::Modified,
      "likes" => Self::Likes,
      "dislikes" => Self::Dislikes,
      _ => Self::Created,
    }
  }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Parameters for `CommentStore::fetch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchQuery {
  pub mask:      ModeMask,
  /// Only comments created strictly after this timestamp.
  pub after:     f64,
  pub parent:    ParentFilter,
  pub order_by:  SortColumn,
  pub ascending: bool,
  /// Maximum number of rows. `None` and `Some(0)` both return every match.
  pub limit:     Option<u32>,
}

impl Default for FetchQuery {
  fn default() -> Self {
    Self {
      mask:      ModeMask::VISIBLE,
      after:     0.0,
      parent:    ParentFilter::Any,
      order_by:  SortColumn::Id,
      ascending: true,
      limit:     None,
    }
  }
}

/// Parameters for `CommentStore::fetchall`, the moderator listing across all
/// threads. Results are paged: page `n` skips `n * limit` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminQuery {
  pub mask:      ModeMask,
  pub after:     f64,
  pub parent:    ParentFilter,
  pub order_by:  SortColumn,
  pub ascending: bool,
  /// `None` or `Some(0)` disables paging and returns every match.
  pub limit:     Option<u32>,
  pub page:      u32,
}

impl AdminQuery {
  /// `(limit, offset)` for the requested page, if paging is enabled.
  pub fn window(&self) -> Option<(u32, u64)> {
    self
      .limit
      .filter(|&limit| limit > 0)
      .map(|limit| (limit, u64::from(self.page) * u64::from(limit)))
  }
}

impl Default for AdminQuery {
  fn default() -> Self {
    Self {
      mask:      ModeMask::VISIBLE,
      after:     0.0,
      parent:    ParentFilter::Any,
      order_by:  SortColumn::Id,
      ascending: true,
      limit:     Some(100),
      page:      0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_sort_columns_fall_back_to_created() {
    assert_eq!(SortColumn::from_name("likes"), SortColumn::Likes);
    assert_eq!(SortColumn::from_name("id"), SortColumn::Id);
    assert_eq!(SortColumn::from_name("text; DROP TABLE comments"), SortColumn::Created);
    assert_eq!(SortColumn::from_name(""), SortColumn::Created);
  }

  #[test]
  fn admin_window() {
    let q = AdminQuery { limit: Some(20), page: 3, ..Default::default() };
    assert_eq!(q.window(), Some((20, 60)));

    let q = AdminQuery { limit: None, ..Default::default() };
    assert_eq!(q.window(), None);

    let q = AdminQuery { limit: Some(0), page: 2, ..Default::default() };
    assert_eq!(q.window(), None);
  }
}
