//! Weekly bucketing of vote timestamps.
//!
//! A bucket pairs the calendar year with the ISO week number reduced modulo
//! 52. The two are deliberately mixed: 2022-01-01 falls in ISO week 52 of
//! 2021 and therefore lands in `(2022, 0)`, and ISO week 53 lands in bucket 1.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const WEEK_NUMBER_MODULO: u32 = 52;

/// A `(year, week_number)` bucket; orders by year, then week.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WeekBucket {
  pub year:        i32,
  /// In `[0, 52)`.
  pub week_number: u32,
}

impl WeekBucket {
  pub fn of(ts: NaiveDateTime) -> Self {
    Self {
      year:        ts.year(),
      week_number: iso_week(ts) % WEEK_NUMBER_MODULO,
    }
  }
}

/// The unreduced ISO 8601 week number, `1..=53`.
pub fn iso_week(ts: NaiveDateTime) -> u32 { ts.iso_week().week() }
