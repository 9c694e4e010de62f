// Log Invariants
//
// Checks that what is stored matches what the log believes:
// the marker equals the cached tail, entries fill [0, tail]
// without gaps, and nothing lives past the tail.

use std::fmt;

use serde::Serialize;

use crate::log::store::KvStore;
use crate::log::{Index, IndexedLog, LogError};

/// Rules checked by [`verify`], in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    MarkerMatchesTail,
    Contiguous,
    NothingPastTail,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::MarkerMatchesTail => "marker-matches-tail",
            Rule::Contiguous => "contiguous",
            Rule::NothingPastTail => "nothing-past-tail",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a rule does not hold, or storage could not be read.
#[derive(Debug, thiserror::Error)]
pub enum InvariantViolation {
    #[error("invariant `{rule}` violated: {reason}")]
    Broken { rule: Rule, reason: String },

    #[error("cannot verify log: {0}")]
    Log(#[from] LogError),
}

/// Summary of a passing verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub last_index: Index,
    pub entries_checked: u64,
}

/// Evaluate every rule against storage.
///
/// Stops at the first failure. Reads one key per entry, so cost is
/// linear in log length. Run while no writer is active.
pub fn verify<S: KvStore>(log: &IndexedLog<S>) -> Result<VerifyReport, InvariantViolation> {
    let tail = log.last_index();

    let marker = log.persisted_last_index()?;
    if marker != tail {
        return Err(InvariantViolation::Broken {
            rule: Rule::MarkerMatchesTail,
            reason: format!("marker holds {marker}, cached tail is {tail}"),
        });
    }

    for index in 0..=tail {
        match log.get(index) {
            Ok(_) => {}
            Err(LogError::NotFound { .. }) => {
                return Err(InvariantViolation::Broken {
                    rule: Rule::Contiguous,
                    reason: format!("missing entry {index} below tail {tail}"),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(beyond) = tail.checked_add(1) {
        match log.get(beyond) {
            Ok(_) => {
                return Err(InvariantViolation::Broken {
                    rule: Rule::NothingPastTail,
                    reason: format!("entry {beyond} exists past tail {tail}"),
                })
            }
            Err(LogError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(VerifyReport {
        last_index: tail,
        entries_checked: (tail + 1) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::log::key;
    use crate::log::store::KvTransaction;

    fn raw_write(store: &InMemoryStore, k: &str, v: Option<&[u8]>) {
        let mut txn = store.begin().unwrap();
        match v {
            Some(v) => txn.put(k, v).unwrap(),
            None => txn.delete(k).unwrap(),
        }
        txn.commit().unwrap();
    }

    fn broken_rule(result: Result<VerifyReport, InvariantViolation>) -> Rule {
        match result {
            Err(InvariantViolation::Broken { rule, .. }) => rule,
            other => panic!("expected a broken rule, got {other:?}"),
        }
    }

    #[test]
    fn healthy_log_passes() {
        let log = IndexedLog::with_store(InMemoryStore::new()).unwrap();
        for i in 0..10 {
            log.append(&[i]).unwrap();
        }
        log.truncate_to_end(7).unwrap();

        let report = verify(&log).unwrap();
        assert_eq!(report.last_index, 6);
        assert_eq!(report.entries_checked, 7);
    }

    #[test]
    fn empty_log_passes() {
        let log = IndexedLog::with_store(InMemoryStore::new()).unwrap();
        let report = verify(&log).unwrap();
        assert_eq!(report.entries_checked, 0);
    }

    #[test]
    fn detects_marker_drift() {
        let store = InMemoryStore::new();
        let log = IndexedLog::with_store(store.clone()).unwrap();
        log.append(b"a").unwrap();
        raw_write(&store, key::MARKER_KEY, Some(b"5"));

        let err = verify(&log).unwrap_err();
        assert!(err.to_string().contains("marker-matches-tail"));
        assert_eq!(broken_rule(Err(err)), Rule::MarkerMatchesTail);
    }

    #[test]
    fn detects_gap() {
        let store = InMemoryStore::new();
        let log = IndexedLog::with_store(store.clone()).unwrap();
        for _ in 0..3 {
            log.append(b"x").unwrap();
        }
        raw_write(&store, &key::entry_key(1), None);

        assert_eq!(broken_rule(verify(&log)), Rule::Contiguous);
    }

    #[test]
    fn detects_stray_entry_past_tail() {
        let store = InMemoryStore::new();
        let log = IndexedLog::with_store(store.clone()).unwrap();
        log.append(b"x").unwrap();
        raw_write(&store, &key::entry_key(1), Some(b"stray"));

        assert_eq!(broken_rule(verify(&log)), Rule::NothingPastTail);
    }

    #[test]
    fn closed_log_cannot_be_verified() {
        let log = IndexedLog::with_store(InMemoryStore::new()).unwrap();
        log.close();
        assert!(matches!(
            verify(&log),
            Err(InvariantViolation::Log(LogError::Closed))
        ));
    }
}
