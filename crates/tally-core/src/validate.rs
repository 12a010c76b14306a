//! Pre-ingestion check of the first input record.
//!
//! Only the first line is inspected. Later malformed records are caught by the
//! reader during coercion, before anything is written.

use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use serde_json::{Map, Value};

use crate::{Error, Result, vote::field};

/// Keys every record must carry, using the source file's names.
pub const REQUIRED_FIELDS: [&str; 4] = [
  field::ID,
  field::POST_ID,
  field::VOTE_TYPE_ID,
  field::CREATION_DATE,
];

/// Required keys absent from `record`, in [`REQUIRED_FIELDS`] order.
pub fn missing_required_fields(record: &Map<String, Value>) -> Vec<&'static str> {
  REQUIRED_FIELDS
    .iter()
    .copied()
    .filter(|name| !record.contains_key(*name))
    .collect()
}

/// Parse the first line of `reader`. `None` means the input is empty.
fn first_record(mut reader: impl BufRead) -> Result<Option<Value>> {
  let mut line = String::new();
  let read = reader
    .read_line(&mut line)
    .map_err(|source| Error::ReadLine { line: 1, source })?;
  if read == 0 {
    return Ok(None);
  }
  serde_json::from_str(&line)
    .map(Some)
    .map_err(|source| Error::MalformedJson { line: 1, source })
}

/// Whether the first record carries every required field.
///
/// Empty input yields `false`; a first line that is not valid JSON is an
/// error rather than `false`.
pub fn first_record_has_required_fields(reader: impl BufRead) -> Result<bool> {
  Ok(match first_record(reader)? {
    Some(Value::Object(record)) => missing_required_fields(&record).is_empty(),
    _ => false,
  })
}

fn open(path: &Path) -> Result<BufReader<File>> {
  File::open(path)
    .map(BufReader::new)
    .map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

/// [`first_record_has_required_fields`] over a file on disk.
pub fn has_required_fields(path: &Path) -> Result<bool> {
  first_record_has_required_fields(open(path)?).map_err(|e| e.in_file(path))
}

/// Fail with a descriptive error unless the first record of `path` carries
/// every required field.
pub fn check_required_fields(path: &Path) -> Result<()> {
  match first_record(open(path)?).map_err(|e| e.in_file(path))? {
    None => Err(Error::EmptyInput(path.to_path_buf())),
    Some(Value::Object(record)) => {
      let missing = missing_required_fields(&record);
      if missing.is_empty() {
        Ok(())
      } else {
        Err(Error::MissingRequiredFields { path: path.to_path_buf(), missing })
      }
    }
    Some(_) => Err(Error::MissingRequiredFields {
      path:    path.to_path_buf(),
      missing: REQUIRED_FIELDS.to_vec(),
    }),
  }
}
