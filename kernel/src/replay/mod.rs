// Ordered Replay
//
// Reads entries back in index order, from a starting index up to
// the tail observed when the replay began.

use crate::log::store::KvStore;
use crate::log::{Index, IndexedLog, LogError};

/// Iterator over `(index, data)` pairs. Created by [`replay`].
pub struct Replay<'a, S: KvStore> {
    log: &'a IndexedLog<S>,
    next: Index,
    end: Index,
}

/// Replay entries `[max(from, 0), tail]`.
///
/// Entries appended after this call are not included. An entry that
/// disappears mid-replay (a concurrent truncation) is reported as
/// [`LogError::NotFound`] and ends the replay.
pub fn replay<S: KvStore>(log: &IndexedLog<S>, from: Index) -> Replay<'_, S> {
    Replay {
        log,
        next: from.max(0),
        end: log.last_index(),
    }
}

impl<S: KvStore> Iterator for Replay<'_, S> {
    type Item = Result<(Index, Vec<u8>), LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let index = self.next;
        match self.log.get(index) {
            Ok(data) => {
                self.next += 1;
                Some(Ok((index, data)))
            }
            Err(e) => {
                // Stop after the first failure.
                self.next = self.end.saturating_add(1);
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;

    fn log_with(n: usize) -> IndexedLog<InMemoryStore> {
        let log = IndexedLog::with_store(InMemoryStore::new()).unwrap();
        for i in 0..n {
            log.append(format!("entry {i}").as_bytes()).unwrap();
        }
        log
    }

    #[test]
    fn replays_from_start_in_order() {
        let log = log_with(5);

        let entries: Vec<_> = replay(&log, 0).collect::<Result<_, _>>().unwrap();

        assert_eq!(entries.len(), 5);
        for (i, (index, data)) in entries.iter().enumerate() {
            assert_eq!(*index, i as Index);
            assert_eq!(data, format!("entry {i}").as_bytes());
        }
    }

    #[test]
    fn replays_suffix_and_clamps_negative_start() {
        let log = log_with(5);

        let indices: Vec<Index> = replay(&log, 3).map(|r| r.unwrap().0).collect();
        assert_eq!(indices, vec![3, 4]);

        assert_eq!(replay(&log, -10).count(), 5);
        assert_eq!(replay(&log, 5).count(), 0);
    }

    #[test]
    fn empty_log_replays_nothing() {
        let log = log_with(0);
        assert!(replay(&log, 0).next().is_none());
    }

    #[test]
    fn tail_is_fixed_when_replay_starts() {
        let log = log_with(2);
        let mut entries = replay(&log, 0);
        assert_eq!(entries.next().unwrap().unwrap().0, 0);

        log.append(b"late").unwrap();

        assert_eq!(entries.next().unwrap().unwrap().0, 1);
        assert!(entries.next().is_none());
    }

    #[test]
    fn truncation_during_replay_surfaces_not_found() {
        let log = log_with(4);
        let mut entries = replay(&log, 0);
        assert!(entries.next().unwrap().is_ok());

        log.truncate_to_end(2).unwrap();

        assert!(entries.next().unwrap().is_ok());
        assert!(matches!(
            entries.next(),
            Some(Err(LogError::NotFound { index: 2 }))
        ));
        assert!(entries.next().is_none());
    }
}
