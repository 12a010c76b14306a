//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width `YYYY-MM-DD HH:MM:SS.ffffff` text, so
//! lexical order in SQL equals temporal order and SQLite's own date functions
//! can read them.

use chrono::NaiveDateTime;
use tally_core::{outlier::WeeklyTotal, vote::VoteRecord};

use crate::{Error, Result};

// ─── NaiveDateTime ───────────────────────────────────────────────────────────

const STORED_DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn encode_dt(dt: NaiveDateTime) -> String { dt.format(STORED_DT_FORMAT).to_string() }

pub fn parse_stored_dt(s: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
}

pub fn decode_dt(s: &str) -> Result<NaiveDateTime> {
  parse_stored_dt(s).map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `votes`-shaped row.
pub struct RawVote {
  pub id:            String,
  pub user_id:       Option<String>,
  pub post_id:       String,
  pub vote_type_id:  i32,
  pub bounty_amount: Option<f64>,
  pub creation_date: String,
}

impl RawVote {
  /// Map a row selected with the standard six-column list.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      user_id:       row.get(1)?,
      post_id:       row.get(2)?,
      vote_type_id:  row.get(3)?,
      bounty_amount: row.get(4)?,
      creation_date: row.get(5)?,
    })
  }

  pub fn into_vote(self) -> Result<VoteRecord> {
    Ok(VoteRecord {
      id:            self.id,
      user_id:       self.user_id,
      post_id:       self.post_id,
      vote_type_id:  self.vote_type_id,
      bounty_amount: self.bounty_amount,
      creation_date: decode_dt(&self.creation_date)?,
    })
  }
}

/// Raw integers from a weekly-total row.
pub struct RawWeeklyTotal {
  pub year:        i64,
  pub week_number: i64,
  pub total_votes: i64,
}

impl RawWeeklyTotal {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      year:        row.get(0)?,
      week_number: row.get(1)?,
      total_votes: row.get(2)?,
    })
  }

  pub fn into_weekly_total(self) -> Result<WeeklyTotal> {
    let year = i32::try_from(self.year)
      .map_err(|_| Error::OutOfRange { column: "year", value: self.year })?;
    let week_number = u32::try_from(self.week_number)
      .map_err(|_| Error::OutOfRange { column: "week_number", value: self.week_number })?;
    Ok(WeeklyTotal { year, week_number, total_votes: self.total_votes })
  }
}
