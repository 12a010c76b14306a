//! Newline-delimited JSON reader producing coerced [`SourcedVote`]s.

use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use serde_json::Value;

use crate::{
  Error, Result,
  vote::{SourcedVote, VoteRecord},
};

/// Iterator over the records of a JSON-lines stream.
///
/// Blank lines are skipped; line numbers still count them so errors point at
/// the physical line in the file.
pub struct VoteLines<R> {
  reader: R,
  line:   usize,
  buf:    String,
}

impl<R: BufRead> VoteLines<R> {
  pub fn new(reader: R) -> Self {
    Self { reader, line: 0, buf: String::new() }
  }

  fn parse_current(&self) -> Result<SourcedVote> {
    let line = self.line;
    let value: Value = serde_json::from_str(&self.buf)
      .map_err(|source| Error::MalformedJson { line, source })?;
    let Value::Object(record) = value else {
      return Err(Error::Coercion {
        line,
        field: "record",
        reason: "expected a JSON object".into(),
      });
    };
    let vote = VoteRecord::from_source(line, &record)?;
    Ok(SourcedVote { line, vote })
  }
}

impl<R: BufRead> Iterator for VoteLines<R> {
  type Item = Result<SourcedVote>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      self.buf.clear();
      match self.reader.read_line(&mut self.buf) {
        Ok(0) => return None,
        Ok(_) => self.line += 1,
        Err(source) => {
          return Some(Err(Error::ReadLine { line: self.line + 1, source }));
        }
      }
      if !self.buf.trim().is_empty() {
        return Some(self.parse_current());
      }
    }
  }
}

/// Read and coerce every record of `path`, failing on the first bad line.
pub fn read_votes(path: &Path) -> Result<Vec<SourcedVote>> {
  let file = File::open(path)
    .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
  VoteLines::new(BufReader::new(file))
    .collect::<Result<_>>()
    .map_err(|e| e.in_file(path))
}
