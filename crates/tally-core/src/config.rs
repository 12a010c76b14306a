//! Warehouse configuration shared by every component.
//!
//! Deserialised from `tally.toml` and `TALLY_*` environment variables by the
//! binary; every field has a default so an empty source is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the derived outlier view inside the warehouse schema.
pub const OUTLIER_VIEW_NAME: &str = "outlier_weeks";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
  /// Path of the database file holding the warehouse schema.
  pub warehouse_location: PathBuf,
  pub schema_name:        String,
  pub main_table_name:    String,
  pub staging_table_name: String,
  /// Declared for quarantined records; nothing writes to it yet.
  pub dlq_table_name:     String,
  /// Drop the staging table after a successful merge instead of keeping it
  /// for inspection.
  pub drop_staging:       bool,
}

impl Default for WarehouseConfig {
  fn default() -> Self {
    Self {
      warehouse_location: PathBuf::from("warehouse.db"),
      schema_name:        "blog_analysis".into(),
      main_table_name:    "votes".into(),
      staging_table_name: "votes_stage".into(),
      dlq_table_name:     "votes_dlq".into(),
      drop_staging:       false,
    }
  }
}

impl WarehouseConfig {
  /// Check that every name is a plain SQL identifier and that no two tables
  /// (or the outlier view) share a name. Names are interpolated into SQL, so
  /// this must pass before any statement is built.
  pub fn validate(&self) -> Result<()> {
    let names = [
      ("schema_name", &self.schema_name),
      ("main_table_name", &self.main_table_name),
      ("staging_table_name", &self.staging_table_name),
      ("dlq_table_name", &self.dlq_table_name),
    ];
    for (setting, value) in names {
      if !is_identifier(value) {
        return Err(Error::InvalidIdentifier { setting, value: value.clone() });
      }
    }

    let mut tables = vec![
      self.main_table_name.to_ascii_lowercase(),
      self.staging_table_name.to_ascii_lowercase(),
      self.dlq_table_name.to_ascii_lowercase(),
      OUTLIER_VIEW_NAME.to_owned(),
    ];
    tables.sort();
    if let Some(pair) = tables.windows(2).find(|pair| pair[0] == pair[1]) {
      return Err(Error::DuplicateTableName(pair[0].clone()));
    }
    Ok(())
  }

  /// `"schema"."table"`, quoted for interpolation into SQL.
  pub fn qualified(&self, table: &str) -> String {
    format!("\"{}\".\"{}\"", self.schema_name, table)
  }

  pub fn main_table(&self) -> String { self.qualified(&self.main_table_name) }

  pub fn staging_table(&self) -> String { self.qualified(&self.staging_table_name) }

  pub fn dlq_table(&self) -> String { self.qualified(&self.dlq_table_name) }

  pub fn outlier_view(&self) -> String { self.qualified(OUTLIER_VIEW_NAME) }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
