//! Moderation and anti-abuse policy knobs.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::{BloomParams, Error, Result, comment::timestamp};

/// Highest acceptable chance that a new voter is mistaken for a repeat one
/// once a comment reaches its vote cap.
pub const MAX_VOTER_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Tunable limits applied by the comment store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
  /// Once `likes + dislikes` reaches this value, further votes are ignored.
  pub vote_cap:               u32,
  /// How far back a valid comment counts towards auto-approving its author.
  pub approval_window_months: u32,
}

impl Default for Policy {
  fn default() -> Self {
    Self { vote_cap: 142, approval_window_months: 6 }
  }
}

impl Policy {
  /// Check that a filter sized by `params` can tell voters apart all the way
  /// up to the vote cap.
  pub fn validate(&self, params: BloomParams) -> Result<()> {
    params.validate()?;
    let rate = params.false_positive_rate(self.vote_cap as usize);
    if rate > MAX_VOTER_FALSE_POSITIVE_RATE {
      return Err(Error::VoteCapTooHigh {
        cap: self.vote_cap,
        rate,
        max: MAX_VOTER_FALSE_POSITIVE_RATE,
      });
    }
    Ok(())
  }

  /// Earliest `created` timestamp that still counts as a recent approval.
  pub fn approval_cutoff(&self, now: DateTime<Utc>) -> f64 {
    let cutoff = now
      .checked_sub_months(Months::new(self.approval_window_months))
      .unwrap_or(DateTime::<Utc>::MIN_UTC);
    timestamp(cutoff)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cutoff_is_calendar_months_back() {
    let now = DateTime::parse_from_rfc3339("2024-08-31T12:00:00Z")
      .unwrap()
      .with_timezone(&Utc);
    let expected = DateTime::parse_from_rfc3339("2024-02-29T12:00:00Z")
      .unwrap()
      .with_timezone(&Utc);

    assert_eq!(Policy::default().approval_cutoff(now), timestamp(expected));
  }

  #[test]
  fn default_cap_fits_default_filter() {
    Policy::default().validate(BloomParams::DEFAULT).unwrap();
    Policy { vote_cap: 150, ..Default::default() }
      .validate(BloomParams::DEFAULT)
      .unwrap();
  }

  #[test]
  fn oversized_cap_is_rejected() {
    let err = Policy { vote_cap: 1000, ..Default::default() }
      .validate(BloomParams::DEFAULT)
      .unwrap_err();
    assert!(matches!(err, Error::VoteCapTooHigh { cap: 1000, .. }));

    // A larger filter makes room for it.
    let wide = BloomParams { bytes: 4096, hashes: 11 };
    Policy { vote_cap: 1000, ..Default::default() }
      .validate(wide)
      .unwrap();
  }

  #[test]
  fn deserializes_with_defaults() {
    let p: Policy = serde_json::from_str(r#"{"vote_cap": 10}"#).unwrap();
    assert_eq!(p.vote_cap, 10);
    assert_eq!(p.approval_window_months, 6);
  }
}
