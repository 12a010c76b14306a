//! SQL for the warehouse schema, rendered once per store from its
//! [`WarehouseConfig`].
//!
//! The warehouse file is attached under `schema_name`, so every table is
//! addressed as `"schema"."table"`. Names come from a validated config and are
//! safe to interpolate.

use tally_core::{
  WarehouseConfig,
  outlier::OUTLIER_THRESHOLD,
  week::WEEK_NUMBER_MODULO,
};

use crate::functions::ISO_WEEK_FN;

/// Column list shared by the durable, staging and load tables.
const VOTE_COLUMNS: &str =
  "id, user_id, post_id, vote_type_id, bounty_amount, creation_date";

/// Per-connection scratch table holding the raw batch before ranking.
const LOAD_TABLE: &str = "temp.vote_load";

/// Column definitions for a durable-shaped vote table. TEXT, not STRING:
/// SQLite gives `STRING` numeric affinity and would turn `'1'` into `1`.
const VOTE_TABLE_BODY: &str = "
    id            TEXT    NOT NULL PRIMARY KEY,
    user_id       TEXT,
    post_id       TEXT    NOT NULL,
    vote_type_id  INTEGER NOT NULL,
    bounty_amount REAL,
    creation_date TEXT    NOT NULL   -- 'YYYY-MM-DD HH:MM:SS.ffffff'
";

pub struct Statements {
  pub attach:         String,
  pub journal:        String,
  pub schema:         String,
  pub reset_load:     String,
  pub insert_load:    String,
  pub reset_staging:  String,
  pub ensure_staging: String,
  pub stage_dedup:    String,
  pub merge:          String,
  pub drop_staging:   String,
  pub select_vote:    String,
  pub select_votes:   String,
  pub select_staged:  String,
  pub count_votes:    String,
  pub weekly_totals:  String,
  pub outlier_weeks:  String,
}

/// `(year, week_number, total_votes)` for every bucket of `table`.
fn weekly_total_select(table: &str) -> String {
  format!(
    "SELECT
         CAST(strftime('%Y', creation_date) AS INTEGER) AS year,
         {ISO_WEEK_FN}(creation_date) % {WEEK_NUMBER_MODULO} AS week_number,
         COUNT(1) AS total_votes
     FROM {table}
     GROUP BY year, week_number"
  )
}

impl Statements {
  pub fn new(cfg: &WarehouseConfig) -> Self {
    let schema_name = &cfg.schema_name;
    let main = cfg.main_table();
    let staging = cfg.staging_table();
    let dlq = cfg.dlq_table();
    let view = cfg.outlier_view();
    let weekly = weekly_total_select(&main);

    // Run inside one IMMEDIATE transaction at open, after `journal`.
    let schema = format!(
      "
CREATE TABLE IF NOT EXISTS {main} ({VOTE_TABLE_BODY});

CREATE TABLE IF NOT EXISTS {staging} ({VOTE_TABLE_BODY});

-- Same shape as the durable table with every column nullable.
-- Reserved for quarantined records; nothing writes here yet.
CREATE TABLE IF NOT EXISTS {dlq} (
    id            TEXT,
    user_id       TEXT,
    post_id       TEXT,
    vote_type_id  INTEGER,
    bounty_amount REAL,
    creation_date TEXT
);

-- Recomputed on every read; relies on {ISO_WEEK_FN}() being registered on
-- the reading connection.
DROP VIEW IF EXISTS {view};
CREATE VIEW {view} AS
WITH weekly_total AS (
    {weekly}
),
average_votes AS (
    SELECT AVG(total_votes) AS avg FROM weekly_total
)
SELECT year, week_number, total_votes
FROM weekly_total, average_votes
WHERE abs(1 - total_votes / avg) > {OUTLIER_THRESHOLD}
ORDER BY year, week_number ASC;

PRAGMA \"{schema_name}\".user_version = 1;
"
    );

    Self {
      attach: format!("ATTACH DATABASE ?1 AS \"{schema_name}\""),
      // journal_mode cannot change inside a transaction.
      journal: format!("PRAGMA \"{schema_name}\".journal_mode = WAL;"),
      schema,
      reset_load: format!(
        "CREATE TEMP TABLE IF NOT EXISTS vote_load (
             line          INTEGER NOT NULL,
             id            TEXT    NOT NULL,
             user_id       TEXT,
             post_id       TEXT    NOT NULL,
             vote_type_id  INTEGER NOT NULL,
             bounty_amount REAL,
             creation_date TEXT    NOT NULL
         );
         DELETE FROM {LOAD_TABLE};"
      ),
      insert_load: format!(
        "INSERT INTO {LOAD_TABLE} (line, {VOTE_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
      ),
      reset_staging: format!(
        "DROP TABLE IF EXISTS {staging};
         CREATE TABLE {staging} ({VOTE_TABLE_BODY});"
      ),
      ensure_staging: format!("CREATE TABLE IF NOT EXISTS {staging} ({VOTE_TABLE_BODY});"),
      // Latest creation_date wins; among equal timestamps, the later line.
      stage_dedup: format!(
        "INSERT INTO {staging} ({VOTE_COLUMNS})
         SELECT {VOTE_COLUMNS} FROM (
             SELECT *, ROW_NUMBER() OVER (
                 PARTITION BY id
                 ORDER BY creation_date DESC, line DESC
             ) AS recency_rank
             FROM {LOAD_TABLE}
         )
         WHERE recency_rank = 1"
      ),
      merge: format!(
        "INSERT OR REPLACE INTO {main} ({VOTE_COLUMNS})
         SELECT {VOTE_COLUMNS} FROM {staging}"
      ),
      drop_staging: format!("DROP TABLE IF EXISTS {staging};"),
      select_vote: format!("SELECT {VOTE_COLUMNS} FROM {main} WHERE id = ?1"),
      select_votes: format!("SELECT {VOTE_COLUMNS} FROM {main} ORDER BY id"),
      select_staged: format!("SELECT {VOTE_COLUMNS} FROM {staging} ORDER BY id"),
      count_votes: format!("SELECT COUNT(*) FROM {main}"),
      weekly_totals: format!("{weekly} ORDER BY year, week_number"),
      outlier_weeks: format!(
        "SELECT year, week_number, total_votes FROM {view} ORDER BY year, week_number"
      ),
    }
  }
}
