//! File ingestion: existence check → first-record validation → read and
//! coerce every line → stage and merge through a [`VoteStore`].
//!
//! Every failure is fatal and surfaces before anything is written, except
//! storage errors, which the store rolls back.

use std::path::Path;

use serde::Serialize;
use tracing::{Instrument as _, info, info_span};
use uuid::Uuid;

use crate::{
  Error, Result,
  dedup::dedup_latest,
  reader::read_votes,
  store::VoteStore,
  validate::check_required_fields,
};

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
  pub run_id:       Uuid,
  pub records_read: usize,
  pub staged:       usize,
  pub upserted:     usize,
}

/// What an ingestion of a file would do, computed without a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestPlan {
  pub records_read: usize,
  pub unique_ids:   usize,
}

fn ensure_exists(path: &Path) -> Result<()> {
  match path.try_exists() {
    Ok(true) => Ok(()),
    Ok(false) => Err(Error::InputNotFound(path.to_path_buf())),
    Err(source) => Err(Error::Io { path: path.to_path_buf(), source }),
  }
}

/// Ingest the JSON-lines file at `path` into `store`.
pub async fn ingest_file<S: VoteStore>(store: &S, path: &Path) -> Result<IngestReport> {
  let run_id = Uuid::new_v4();
  let span = info_span!("ingest", %run_id, path = %path.display());

  async move {
    ensure_exists(path)?;
    check_required_fields(path)?;

    let batch = read_votes(path)?;
    let records_read = batch.len();
    info!(records_read, "input read");

    let counts = store
      .ingest(batch)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
    info!(staged = counts.staged, upserted = counts.upserted, "merged");

    Ok(IngestReport {
      run_id,
      records_read,
      staged: counts.staged,
      upserted: counts.upserted,
    })
  }
  .instrument(span)
  .await
}

/// Validate, read and deduplicate `path` in-process without writing.
pub fn plan_file(path: &Path) -> Result<IngestPlan> {
  ensure_exists(path)?;
  check_required_fields(path)?;

  let batch = read_votes(path)?;
  let records_read = batch.len();
  let unique_ids = dedup_latest(batch).len();
  Ok(IngestPlan { records_read, unique_ids })
}
