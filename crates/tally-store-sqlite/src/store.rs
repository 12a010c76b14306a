//! [`SqliteStore`], the SQLite implementation of [`VoteStore`].

use std::{sync::Arc, time::Duration};

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;

use tally_core::{
  WarehouseConfig,
  outlier::{OutlierWeek, WeeklyTotal},
  store::{MergeCounts, VoteStore},
  vote::{SourcedVote, VoteRecord},
};

use crate::{
  Result,
  encode::{RawVote, RawWeeklyTotal, encode_dt},
  functions,
  schema::Statements,
};

/// How long a connection waits on another process's write lock before
/// failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A vote warehouse backed by a single SQLite file.
///
/// The file is attached to an otherwise empty connection under the configured
/// schema name. Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  sql:    Arc<Statements>,
  config: Arc<WarehouseConfig>,
}

impl SqliteStore {
  /// Open (or create) the warehouse at `config.warehouse_location` and run
  /// schema initialisation.
  pub async fn open(config: WarehouseConfig) -> Result<Self> {
    let location = config.warehouse_location.to_string_lossy().into_owned();
    Self::attach(config, location).await
  }

  /// Open an in-memory warehouse for tests. `warehouse_location`
  /// is ignored.
  pub async fn open_in_memory(config: WarehouseConfig) -> Result<Self> {
    Self::attach(config, ":memory:".to_owned()).await
  }

  async fn attach(config: WarehouseConfig, location: String) -> Result<Self> {
    config.validate()?;
    let sql = Arc::new(Statements::new(&config));
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;

    let init = Arc::clone(&sql);
    let attached = location.clone();
    conn
      .call(move |conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        functions::register(conn)?;
        conn.execute(&init.attach, [attached])?;
        conn.execute_batch(&init.journal)?;
        // Table and view DDL is one unit; concurrent opens take turns.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(&init.schema)?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(%location, schema = %config.schema_name, "warehouse attached");
    Ok(Self { conn, sql, config: Arc::new(config) })
  }

  pub fn config(&self) -> &WarehouseConfig { &self.config }

  /// Every durable row, ordered by id.
  pub async fn all_votes(&self) -> Result<Vec<VoteRecord>> {
    let sql = Arc::clone(&self.sql);
    let raws = self
      .conn
      .call(move |conn| select_raw_votes(conn, &sql.select_votes))
      .await?;
    raws.into_iter().map(RawVote::into_vote).collect()
  }

  /// Every row currently in the staging table, ordered by id.
  pub async fn staged_votes(&self) -> Result<Vec<VoteRecord>> {
    let sql = Arc::clone(&self.sql);
    let raws = self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql.ensure_staging)?;
        select_raw_votes(conn, &sql.select_staged)
      })
      .await?;
    raws.into_iter().map(RawVote::into_vote).collect()
  }

  async fn select_weekly(&self, pick: fn(&Statements) -> &str) -> Result<Vec<WeeklyTotal>> {
    let sql = Arc::clone(&self.sql);
    let raws: Vec<RawWeeklyTotal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(pick(&sql))?;
        let rows = stmt
          .query_map([], RawWeeklyTotal::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawWeeklyTotal::into_weekly_total).collect()
  }
}

// ─── Synchronous steps, run on the connection thread ─────────────────────────

fn select_raw_votes(conn: &rusqlite::Connection, query: &str) -> tokio_rusqlite::Result<Vec<RawVote>> {
  let mut stmt = conn.prepare(query)?;
  let rows = stmt
    .query_map([], RawVote::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Load `batch` into the scratch table, then rebuild staging with one row per
/// id ranked by recency.
fn stage_batch(
  conn:  &rusqlite::Connection,
  sql:   &Statements,
  batch: &[SourcedVote],
) -> rusqlite::Result<usize> {
  conn.execute_batch(&sql.reset_load)?;
  {
    let mut insert = conn.prepare(&sql.insert_load)?;
    for sourced in batch {
      let vote = &sourced.vote;
      insert.execute(rusqlite::params![
        sourced.line as i64,
        vote.id,
        vote.user_id,
        vote.post_id,
        vote.vote_type_id,
        vote.bounty_amount,
        encode_dt(vote.creation_date),
      ])?;
    }
  }
  conn.execute_batch(&sql.reset_staging)?;
  conn.execute(&sql.stage_dedup, [])
}

fn merge_staging(conn: &rusqlite::Connection, sql: &Statements) -> rusqlite::Result<usize> {
  conn.execute_batch(&sql.ensure_staging)?;
  conn.execute(&sql.merge, [])
}

// ─── VoteStore impl ──────────────────────────────────────────────────────────

impl VoteStore for SqliteStore {
  type Error = crate::Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn ingest(&self, batch: Vec<SourcedVote>) -> Result<MergeCounts> {
    let sql = Arc::clone(&self.sql);
    let drop_staging = self.config.drop_staging;

    let counts = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front: one writer at a time.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let staged = stage_batch(&tx, &sql, &batch)?;
        let upserted = merge_staging(&tx, &sql)?;
        if drop_staging {
          tx.execute_batch(&sql.drop_staging)?;
        }
        tx.commit()?;
        Ok(MergeCounts { staged, upserted })
      })
      .await?;

    debug!(staged = counts.staged, upserted = counts.upserted, drop_staging, "batch merged");
    Ok(counts)
  }

  async fn stage(&self, batch: Vec<SourcedVote>) -> Result<usize> {
    let sql = Arc::clone(&self.sql);
    let staged = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let staged = stage_batch(&tx, &sql, &batch)?;
        tx.commit()?;
        Ok(staged)
      })
      .await?;
    debug!(staged, "batch staged");
    Ok(staged)
  }

  async fn merge_staged(&self) -> Result<usize> {
    let sql = Arc::clone(&self.sql);
    let upserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let upserted = merge_staging(&tx, &sql)?;
        tx.commit()?;
        Ok(upserted)
      })
      .await?;
    debug!(upserted, "staging merged");
    Ok(upserted)
  }

  async fn drop_staging(&self) -> Result<()> {
    let sql = Arc::clone(&self.sql);
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql.drop_staging)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_vote(&self, id: &str) -> Result<Option<VoteRecord>> {
    let sql = Arc::clone(&self.sql);
    let id = id.to_owned();

    let raw: Option<RawVote> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql.select_vote, rusqlite::params![id], RawVote::from_row)
          .optional()?)
      })
      .await?;

    raw.map(RawVote::into_vote).transpose()
  }

  async fn count_votes(&self) -> Result<u64> {
    let sql = Arc::clone(&self.sql);
    let count: i64 = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql.count_votes, [], |r| r.get(0))?))
      .await?;
    u64::try_from(count).map_err(|_| crate::Error::OutOfRange { column: "count", value: count })
  }

  async fn weekly_totals(&self) -> Result<Vec<WeeklyTotal>> {
    self.select_weekly(|sql| sql.weekly_totals.as_str()).await
  }

  async fn outlier_weeks(&self) -> Result<Vec<OutlierWeek>> {
    self.select_weekly(|sql| sql.outlier_weeks.as_str()).await
  }
}
