//! Vote records and the type coercion applied to raw source objects.
//!
//! Source records use the upstream export's PascalCase keys (`Id`, `PostId`,
//! ...). Coercion is lenient in the same way a SQL `CAST` is: numeric columns
//! accept either JSON numbers or strings holding a number, and text columns
//! accept numbers. Anything else is a fatal error for the whole batch.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Source field names as they appear in the input file.
pub mod field {
  pub const ID: &str = "Id";
  pub const USER_ID: &str = "UserId";
  pub const POST_ID: &str = "PostId";
  pub const VOTE_TYPE_ID: &str = "VoteTypeId";
  pub const BOUNTY_AMOUNT: &str = "BountyAmount";
  pub const CREATION_DATE: &str = "CreationDate";
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One row of the durable `votes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
  pub id:            String,
  /// `None` when the caster is anonymous or deleted.
  pub user_id:       Option<String>,
  pub post_id:       String,
  pub vote_type_id:  i32,
  /// Only present on bounty-granting votes.
  pub bounty_amount: Option<f64>,
  pub creation_date: NaiveDateTime,
}

/// A coerced record together with the 1-based input line it came from.
///
/// The line number is the secondary tie-break when two records share both an
/// id and the latest `creation_date`: the later line wins.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedVote {
  pub line: usize,
  pub vote: VoteRecord,
}

impl VoteRecord {
  /// Coerce a raw source object into a typed record.
  pub fn from_source(line: usize, record: &Map<String, Value>) -> Result<Self> {
    Ok(Self {
      id:            required(line, field::ID, record, coerce_text)?,
      user_id:       optional(line, field::USER_ID, record, coerce_text)?,
      post_id:       required(line, field::POST_ID, record, coerce_text)?,
      vote_type_id:  required(line, field::VOTE_TYPE_ID, record, coerce_integer)?,
      bounty_amount: optional(line, field::BOUNTY_AMOUNT, record, coerce_double)?,
      creation_date: required(line, field::CREATION_DATE, record, coerce_timestamp)?,
    })
  }
}

// ─── Coercion ────────────────────────────────────────────────────────────────

type Cast<T> = fn(&Value) -> std::result::Result<T, String>;

fn required<T>(
  line: usize,
  field: &'static str,
  record: &Map<String, Value>,
  cast: Cast<T>,
) -> Result<T> {
  match record.get(field) {
    None | Some(Value::Null) => Err(Error::Coercion {
      line,
      field,
      reason: "value is missing".into(),
    }),
    Some(value) => cast(value).map_err(|reason| Error::Coercion { line, field, reason }),
  }
}

fn optional<T>(
  line: usize,
  field: &'static str,
  record: &Map<String, Value>,
  cast: Cast<T>,
) -> Result<Option<T>> {
  match record.get(field) {
    None | Some(Value::Null) => Ok(None),
    Some(value) => cast(value)
      .map(Some)
      .map_err(|reason| Error::Coercion { line, field, reason }),
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

fn coerce_text(value: &Value) -> std::result::Result<String, String> {
  match value {
    Value::String(s) => Ok(s.clone()),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(format!("expected a string, found {}", json_kind(other))),
  }
}

fn coerce_integer(value: &Value) -> std::result::Result<i32, String> {
  let wide = match value {
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().and_then(integral))
      .ok_or_else(|| format!("{n} is not an integer"))?,
    Value::String(s) => {
      let trimmed = s.trim();
      trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
        .ok_or_else(|| format!("{s:?} is not an integer"))?
    }
    other => return Err(format!("expected an integer, found {}", json_kind(other))),
  };
  i32::try_from(wide).map_err(|_| format!("{wide} is not a 32-bit integer"))
}

/// `2.0` → `2`; anything with a fractional part is not an integer.
fn integral(f: f64) -> Option<i64> {
  (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn coerce_double(value: &Value) -> std::result::Result<f64, String> {
  match value {
    Value::Number(n) => n
      .as_f64()
      .ok_or_else(|| format!("{n} is not representable as a double")),
    Value::String(s) => s
      .trim()
      .parse::<f64>()
      .map_err(|e| format!("{s:?} is not a number: {e}")),
    other => Err(format!("expected a number, found {}", json_kind(other))),
  }
}

fn coerce_timestamp(value: &Value) -> std::result::Result<NaiveDateTime, String> {
  match value {
    Value::String(s) => {
      parse_timestamp(s).ok_or_else(|| format!("{s:?} is not a timestamp"))
    }
    other => Err(format!("expected a timestamp string, found {}", json_kind(other))),
  }
}

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a source timestamp.
///
/// Accepts ISO 8601 date-times with either a `T` or a space separator and
/// optional fractional seconds, RFC 3339 strings with an offset (converted to
/// UTC, zone dropped), and bare dates (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
  let raw = raw.trim();
  TIMESTAMP_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
    .or_else(|| {
      NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}
