//! Scalar SQL functions registered on every store connection.

use rusqlite::{Connection, functions::FunctionFlags};
use tally_core::week::iso_week;

use crate::encode::parse_stored_dt;

/// `iso_week(ts TEXT) -> INTEGER`: ISO 8601 week number of a stored
/// timestamp, `NULL` for `NULL`.
pub const ISO_WEEK_FN: &str = "iso_week";

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    ISO_WEEK_FN,
    1,
    FunctionFlags::SQLITE_UTF8
      | FunctionFlags::SQLITE_DETERMINISTIC
      | FunctionFlags::SQLITE_INNOCUOUS,
    |ctx| {
      let raw: Option<String> = ctx.get(0)?;
      raw
        .map(|s| parse_stored_dt(&s).map(|ts| i64::from(iso_week(ts))))
        .transpose()
        .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))
    },
  )
}
