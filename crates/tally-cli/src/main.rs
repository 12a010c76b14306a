//! `tally`: load vote exports into the warehouse and report outlier weeks.
//!
//! # Usage
//!
//! ```
//! tally ingest votes.jsonl
//! tally ingest --dry-run votes.jsonl
//! tally outliers --json
//! tally --warehouse ~/data/warehouse.db outliers --all
//! ```
//!
//! Settings come from `tally.toml` (or `--config`), then `TALLY_*` environment
//! variables, then `--warehouse`. Logs go to stderr; stdout carries only
//! command output.

use std::{
  io::{self, Write},
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tally_core::{WarehouseConfig, outlier::WeeklyTotal, pipeline, store::VoteStore as _};
use tally_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tally", author, version, about = "Vote warehouse ingestion and weekly outlier report")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "tally.toml")]
  config: PathBuf,

  /// Warehouse database file; overrides `warehouse_location`.
  #[arg(long, global = true, value_name = "PATH")]
  warehouse: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load a JSON-lines vote export into the warehouse.
  Ingest {
    file_path: PathBuf,

    /// Validate, read and deduplicate without writing anything.
    #[arg(long)]
    dry_run: bool,
  },

  /// Print the weeks whose vote count deviates from the weekly mean.
  Outliers {
    /// Print a JSON array instead of a table.
    #[arg(long)]
    json: bool,

    /// Print every weekly total, not just the outliers.
    #[arg(long)]
    all: bool,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let config = load_config(&cli.config, cli.warehouse.as_deref())?;

  match cli.command {
    Command::Ingest { file_path, dry_run: true } => {
      let plan = pipeline::plan_file(&file_path)
        .with_context(|| format!("dry run of {} failed", file_path.display()))?;
      println!("records_read {}", plan.records_read);
      println!("unique_ids   {}", plan.unique_ids);
    }

    Command::Ingest { file_path, dry_run: false } => {
      let store = open_store(config).await?;
      let report = pipeline::ingest_file(&store, &file_path)
        .await
        .with_context(|| format!("failed to ingest {}", file_path.display()))?;
      println!(
        "run {}: read {} records, staged {}, upserted {}",
        report.run_id, report.records_read, report.staged, report.upserted
      );
    }

    Command::Outliers { json, all } => {
      let store = open_store(config).await?;
      let weeks = if all {
        store.weekly_totals().await
      } else {
        store.outlier_weeks().await
      }
      .context("failed to query weekly totals")?;

      if json {
        println!("{}", serde_json::to_string_pretty(&weeks)?);
      } else {
        write_table(&mut std::io::stdout().lock(), &weeks)?;
      }
    }
  }

  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Layer the config file, `TALLY_*` environment and the `--warehouse` flag.
fn load_config(path: &Path, warehouse: Option<&Path>) -> anyhow::Result<WarehouseConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .context("failed to read config file")?;

  let mut cfg: WarehouseConfig = settings
    .try_deserialize()
    .context("failed to deserialise WarehouseConfig")?;

  if let Some(location) = warehouse {
    cfg.warehouse_location = location.to_path_buf();
  }
  cfg.warehouse_location = expand_tilde(&cfg.warehouse_location);
  Ok(cfg)
}

async fn open_store(config: WarehouseConfig) -> anyhow::Result<SqliteStore> {
  let location = config.warehouse_location.clone();
  SqliteStore::open(config)
    .await
    .with_context(|| format!("failed to open warehouse at {location:?}"))
}

fn write_table(out: &mut impl Write, weeks: &[WeeklyTotal]) -> io::Result<()> {
  writeln!(out, "{:>4} {:>11} {:>11}", "year", "week_number", "total_votes")?;
  for w in weeks {
    writeln!(out, "{:>4} {:>11} {:>11}", w.year, w.week_number, w.total_votes)?;
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use clap::CommandFactory as _;

  use super::*;

  fn toml_file(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
  }

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn ingest_requires_a_file_path() {
    assert!(Cli::try_parse_from(["tally", "ingest"]).is_err());
    assert!(Cli::try_parse_from(["tally", "ingest", "a.jsonl", "b.jsonl"]).is_err());
  }

  #[test]
  fn global_flags_follow_the_subcommand() {
    let cli = Cli::try_parse_from(["tally", "outliers", "--json", "--warehouse", "w.db"]).unwrap();
    assert_eq!(cli.warehouse, Some(PathBuf::from("w.db")));
    assert!(matches!(cli.command, Command::Outliers { json: true, all: false }));
  }

  #[test]
  fn missing_config_file_yields_defaults() {
    let cfg = load_config(Path::new("no-such-tally.toml"), None).unwrap();
    assert_eq!(cfg.schema_name, WarehouseConfig::default().schema_name);
    assert_eq!(cfg.main_table_name, "votes");
  }

  #[test]
  fn file_values_are_read_and_warehouse_flag_wins() {
    let file = toml_file(
      "warehouse_location = \"from-file.db\"\nmain_table_name = \"ballots\"\ndrop_staging = true\n",
    );

    let cfg = load_config(file.path(), None).unwrap();
    assert_eq!(cfg.warehouse_location, PathBuf::from("from-file.db"));
    assert_eq!(cfg.main_table_name, "ballots");
    assert!(cfg.drop_staging);
    assert_eq!(cfg.staging_table_name, "votes_stage");

    let cfg = load_config(file.path(), Some(Path::new("flag.db"))).unwrap();
    assert_eq!(cfg.warehouse_location, PathBuf::from("flag.db"));
  }

  #[test]
  fn table_has_a_header_and_one_row_per_week() {
    let weeks = [
      WeeklyTotal { year: 2022, week_number: 0, total_votes: 1 },
      WeeklyTotal { year: 2022, week_number: 12, total_votes: 340 },
    ];
    let mut out = Vec::new();
    write_table(&mut out, &weeks).unwrap();

    assert_eq!(
      String::from_utf8(out).unwrap(),
      "year week_number total_votes\n\
       2022           0           1\n\
       2022          12         340\n"
    );
  }

  #[test]
  fn relative_paths_are_not_expanded() {
    assert_eq!(expand_tilde(Path::new("data/w.db")), PathBuf::from("data/w.db"));
    assert_eq!(expand_tilde(Path::new("~user/w.db")), PathBuf::from("~user/w.db"));
  }
}
