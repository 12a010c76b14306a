//! In-process deduplication with the same ranking the store applies in SQL:
//! per `id`, latest `creation_date` wins, then latest input line.

use std::collections::{HashMap, hash_map::Entry};

use crate::vote::SourcedVote;

/// Whether `candidate` outranks `current` for the same id.
pub fn supersedes(candidate: &SourcedVote, current: &SourcedVote) -> bool {
  (candidate.vote.creation_date, candidate.line) > (current.vote.creation_date, current.line)
}

/// Collapse `batch` to one record per id, returned in input-line order.
pub fn dedup_latest(batch: Vec<SourcedVote>) -> Vec<SourcedVote> {
  let mut latest: HashMap<String, SourcedVote> = HashMap::with_capacity(batch.len());

  for candidate in batch {
    match latest.entry(candidate.vote.id.clone()) {
      Entry::Vacant(slot) => {
        slot.insert(candidate);
      }
      Entry::Occupied(mut slot) => {
        if supersedes(&candidate, slot.get()) {
          slot.insert(candidate);
        }
      }
    }
  }

  let mut survivors: Vec<SourcedVote> = latest.into_values().collect();
  survivors.sort_by_key(|sv| sv.line);
  survivors
}
