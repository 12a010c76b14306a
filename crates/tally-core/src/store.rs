//! The `VoteStore` trait and its result types.
//!
//! Implemented by storage backends (e.g. `tally-store-sqlite`). The ingestion
//! pipeline and the binary depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use serde::Serialize;

use crate::{
  outlier::{OutlierWeek, WeeklyTotal},
  vote::{SourcedVote, VoteRecord},
};

/// Row counts from one stage-and-merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MergeCounts {
  /// Distinct ids left in staging after deduplication.
  pub staged:   usize,
  /// Rows inserted or replaced in the durable table.
  pub upserted: usize,
}

/// Abstraction over a vote warehouse backend.
///
/// The durable table holds at most one row per vote id. Writes are upserts
/// keyed on id: a later run replaces earlier rows in full, whatever their
/// timestamps.
pub trait VoteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Stage `batch` and merge it into the durable table as one all-or-nothing
  /// unit. Nothing is written if any step fails.
  fn ingest(
    &self,
    batch: Vec<SourcedVote>,
  ) -> impl Future<Output = Result<MergeCounts, Self::Error>> + Send + '_;

  /// Replace the staging set with `batch` deduplicated by id (latest
  /// `creation_date`, then latest line). Returns the number of staged rows.
  /// Never touches the durable table.
  fn stage(
    &self,
    batch: Vec<SourcedVote>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Upsert every staged row into the durable table.
  fn merge_staged(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Discard the staging set, if any.
  fn drop_staging(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_vote<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<VoteRecord>, Self::Error>> + Send + 'a;

  fn count_votes(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Every `(year, week_number)` bucket with its vote count, ordered.
  fn weekly_totals(
    &self,
  ) -> impl Future<Output = Result<Vec<WeeklyTotal>, Self::Error>> + Send + '_;

  /// Weeks whose total deviates from the mean weekly total by more than the
  /// outlier threshold, ordered by `(year, week_number)`. Recomputed from the
  /// durable table on every call; empty when the table is.
  fn outlier_weeks(
    &self,
  ) -> impl Future<Output = Result<Vec<OutlierWeek>, Self::Error>> + Send + '_;
}
