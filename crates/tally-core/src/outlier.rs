//! Weekly totals and outlier flagging.
//!
//! A week is an outlier when its total differs from the grand mean of all
//! weekly totals by more than [`OUTLIER_THRESHOLD`] in relative terms:
//! `|1 - total / mean| > threshold`. The comparison is strict.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{vote::VoteRecord, week::WeekBucket};

pub const OUTLIER_THRESHOLD: f64 = 0.2;

/// Vote count for one `(year, week_number)` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTotal {
  pub year:        i32,
  pub week_number: u32,
  pub total_votes: i64,
}

/// A [`WeeklyTotal`] that passed the outlier test.
pub type OutlierWeek = WeeklyTotal;

impl WeeklyTotal {
  pub fn bucket(&self) -> WeekBucket {
    WeekBucket { year: self.year, week_number: self.week_number }
  }
}

/// Count `votes` per week, ordered by `(year, week_number)`.
pub fn weekly_totals<'a>(votes: impl IntoIterator<Item = &'a VoteRecord>) -> Vec<WeeklyTotal> {
  let mut counts: BTreeMap<WeekBucket, i64> = BTreeMap::new();
  for vote in votes {
    *counts.entry(WeekBucket::of(vote.creation_date)).or_default() += 1;
  }
  counts
    .into_iter()
    .map(|(bucket, total_votes)| WeeklyTotal {
      year: bucket.year,
      week_number: bucket.week_number,
      total_votes,
    })
    .collect()
}

/// Arithmetic mean of the totals; `None` when there are no weeks.
pub fn mean_total(totals: &[WeeklyTotal]) -> Option<f64> {
  if totals.is_empty() {
    return None;
  }
  let sum: i64 = totals.iter().map(|t| t.total_votes).sum();
  Some(sum as f64 / totals.len() as f64)
}

pub fn is_outlier(total_votes: i64, mean: f64, threshold: f64) -> bool {
  (1.0 - total_votes as f64 / mean).abs() > threshold
}

/// Weeks deviating from the mean by more than `threshold`, ordered by
/// `(year, week_number)`. No weeks means no outliers.
pub fn flag_outliers(totals: &[WeeklyTotal], threshold: f64) -> Vec<OutlierWeek> {
  let Some(mean) = mean_total(totals) else {
    return Vec::new();
  };
  let mut outliers: Vec<OutlierWeek> = totals
    .iter()
    .filter(|t| is_outlier(t.total_votes, mean, threshold))
    .copied()
    .collect();
  outliers.sort_by_key(WeeklyTotal::bucket);
  outliers
}

#[cfg(test)]
mod tests {
  use crate::vote::parse_timestamp;

  use super::*;

  fn totals(counts: &[i64]) -> Vec<WeeklyTotal> {
    counts
      .iter()
      .enumerate()
      .map(|(week, &total_votes)| WeeklyTotal {
        year: 2022,
        week_number: week as u32,
        total_votes,
      })
      .collect()
  }

  #[test]
  fn spike_is_flagged() {
    let weeks = totals(&[10, 10, 10, 10, 100]);
    assert_eq!(mean_total(&weeks), Some(28.0));

    let flagged = flag_outliers(&weeks, OUTLIER_THRESHOLD);
    assert!(flagged.iter().any(|w| w.total_votes == 100 && w.week_number == 4));
    // 10 / 28 deviates by ~64%, so the quiet weeks are outliers too.
    assert_eq!(flagged.len(), 5);
  }

  #[test]
  fn week_at_the_mean_is_not_flagged() {
    let flagged = flag_outliers(&totals(&[20, 28, 36]), OUTLIER_THRESHOLD);
    let weeks: Vec<u32> = flagged.iter().map(|w| w.week_number).collect();
    assert_eq!(weeks, vec![0, 2]);
  }

  #[test]
  fn uniform_weeks_have_no_outliers() {
    assert!(flag_outliers(&totals(&[5, 5, 5, 5]), OUTLIER_THRESHOLD).is_empty());
  }

  #[test]
  fn deviation_exactly_at_threshold_is_not_flagged() {
    // mean 10; 8 and 12 deviate by 20%.
    assert!(!is_outlier(8, 10.0, OUTLIER_THRESHOLD));
    assert!(!is_outlier(12, 10.0, OUTLIER_THRESHOLD));
    assert!(is_outlier(7, 10.0, OUTLIER_THRESHOLD));
    assert!(is_outlier(13, 10.0, OUTLIER_THRESHOLD));
  }

  #[test]
  fn empty_input_yields_no_outliers() {
    assert_eq!(mean_total(&[]), None);
    assert!(flag_outliers(&[], OUTLIER_THRESHOLD).is_empty());
  }

  #[test]
  fn output_is_ordered_by_year_then_week() {
    let weeks = vec![
      WeeklyTotal { year: 2023, week_number: 1, total_votes: 1 },
      WeeklyTotal { year: 2022, week_number: 9, total_votes: 1 },
      WeeklyTotal { year: 2022, week_number: 2, total_votes: 10 },
    ];
    let flagged = flag_outliers(&weeks, OUTLIER_THRESHOLD);
    let order: Vec<(i32, u32)> = flagged.iter().map(|w| (w.year, w.week_number)).collect();
    assert_eq!(order, vec![(2022, 2), (2022, 9), (2023, 1)]);
  }

  #[test]
  fn totals_are_counted_per_bucket() {
    let votes: Vec<VoteRecord> = ["2022-01-01", "2022-01-08", "2022-01-09", "2022-01-15"]
      .iter()
      .enumerate()
      .map(|(i, at)| VoteRecord {
        id:            i.to_string(),
        user_id:       None,
        post_id:       "p".into(),
        vote_type_id:  2,
        bounty_amount: None,
        creation_date: parse_timestamp(at).unwrap(),
      })
      .collect();

    let weekly = weekly_totals(&votes);
    let flat: Vec<(i32, u32, i64)> = weekly
      .iter()
      .map(|w| (w.year, w.week_number, w.total_votes))
      .collect();
    assert_eq!(flat, vec![(2022, 0, 1), (2022, 1, 2), (2022, 2, 1)]);
  }
}
