// Indexed Log
//
// A contiguous, zero-based sequence of opaque records kept in an
// ordered KV store. Every mutation moves entry keys and the
// last-index marker together in a single transaction.

use std::path::Path;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::adapters::redb::RedbStore;
use crate::config::LogConfig;

pub mod key;
pub mod store;

use store::{KvStore, KvTransaction, StoreError};

/// Position of an entry in the log.
pub type Index = i64;

/// Tail index of a log with no entries.
pub const EMPTY_INDEX: Index = -1;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("cannot open log storage: {0}")]
    StorageOpen(#[source] StoreError),

    #[error("log transaction failed: {0}")]
    Transaction(#[source] StoreError),

    #[error("log read failed: {0}")]
    Storage(#[source] StoreError),

    #[error("no entry at index {index}")]
    NotFound { index: Index },

    #[error("cannot truncate from {from}: last index is {last}")]
    InvalidRange { from: Index, last: Index },

    #[error("log is closed")]
    Closed,

    #[error("corrupt last-index marker: {value:?}")]
    CorruptMarker { value: String },

    #[error("log index space exhausted")]
    IndexExhausted,
}

/// Append-only log of byte records addressed by [`Index`].
///
/// Safe to share between threads. Appends and truncations are serialized
/// from index allocation through commit; reads run alongside them.
pub struct IndexedLog<S: KvStore = RedbStore> {
    store: RwLock<Option<S>>,
    writer: Mutex<()>,
    last_index: Mutex<Index>,
}

impl IndexedLog<RedbStore> {
    /// Create an indexed log in the directory `path`, or open the one there.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        Self::open_with_config(path, &LogConfig::default_config())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: &LogConfig) -> Result<Self, LogError> {
        let path = path.as_ref();
        let store = RedbStore::open(path, config).map_err(LogError::StorageOpen)?;
        let log = Self::with_store(store)?;
        debug!(
            path = %path.display(),
            last_index = log.last_index(),
            "opened indexed log"
        );
        Ok(log)
    }
}

impl<S: KvStore> IndexedLog<S> {
    /// Wrap an already opened store, recovering the tail from its marker.
    ///
    /// A missing marker means the log is empty.
    pub fn with_store(store: S) -> Result<Self, LogError> {
        let raw = store.get(key::MARKER_KEY).map_err(LogError::StorageOpen)?;
        let last_index = decode_tail(raw)?;

        Ok(Self {
            store: RwLock::new(Some(store)),
            writer: Mutex::new(()),
            last_index: Mutex::new(last_index),
        })
    }

    /// Append at the next available index, which is `last_index() + 1`.
    ///
    /// Returns the index written. On error nothing is written and the tail
    /// is unchanged.
    pub fn append(&self, data: &[u8]) -> Result<Index, LogError> {
        let _writer = self.writer.lock();
        self.with_store_ref(|store| {
            let next = self
                .last_index()
                .checked_add(1)
                .ok_or(LogError::IndexExhausted)?;

            commit_with(store, |txn| {
                txn.put(&key::entry_key(next), data)?;
                txn.put(key::MARKER_KEY, &key::encode_marker(next))
            })?;

            self.set_last_index(next);
            trace!(index = next, len = data.len(), "appended entry");
            Ok(next)
        })
    }

    /// Data stored at `index`.
    pub fn get(&self, index: Index) -> Result<Vec<u8>, LogError> {
        self.with_store_ref(|store| {
            store
                .get(&key::entry_key(index))
                .map_err(LogError::Storage)?
                .ok_or(LogError::NotFound { index })
        })
    }

    /// Remove all entries from (and including) `from` to the end.
    ///
    /// Afterwards `last_index()` is `from - 1`. `from` must lie in
    /// `[0, last_index() + 1]`.
    pub fn truncate_to_end(&self, from: Index) -> Result<(), LogError> {
        let _writer = self.writer.lock();
        self.with_store_ref(|store| {
            let last = self.last_index();
            // `from >= 0` keeps `from - 1` in range even when `last` is i64::MAX.
            if from < 0 || from - 1 > last {
                return Err(LogError::InvalidRange { from, last });
            }
            let new_last = from - 1;

            commit_with(store, |txn| {
                for index in from..=last {
                    txn.delete(&key::entry_key(index))?;
                }
                txn.put(key::MARKER_KEY, &key::encode_marker(new_last))
            })?;

            self.set_last_index(new_last);
            debug!(from, removed = last - new_last, "truncated log");
            Ok(())
        })
    }

    /// Highest index holding data, or [`EMPTY_INDEX`].
    ///
    /// Served from memory. After `close` this keeps reporting the last
    /// known tail.
    pub fn last_index(&self) -> Index {
        *self.last_index.lock()
    }

    pub fn is_empty(&self) -> bool {
        self.last_index() == EMPTY_INDEX
    }

    /// Tail as recorded by the marker in storage.
    pub fn persisted_last_index(&self) -> Result<Index, LogError> {
        self.with_store_ref(|store| {
            let raw = store.get(key::MARKER_KEY).map_err(LogError::Storage)?;
            decode_tail(raw)
        })
    }

    /// Release the store. Later operations fail with [`LogError::Closed`].
    ///
    /// Calling this more than once is harmless.
    pub fn close(&self) {
        if self.store.write().take().is_some() {
            debug!(last_index = self.last_index(), "closed indexed log");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.store.read().is_none()
    }

    fn with_store_ref<T>(
        &self,
        f: impl FnOnce(&S) -> Result<T, LogError>,
    ) -> Result<T, LogError> {
        let guard = self.store.read();
        let store = guard.as_ref().ok_or(LogError::Closed)?;
        f(store)
    }

    fn set_last_index(&self, index: Index) {
        *self.last_index.lock() = index;
    }
}

/// Stage writes in one transaction and commit them, or discard them all.
fn commit_with<S: KvStore>(
    store: &S,
    stage: impl FnOnce(&mut S::Txn) -> Result<(), StoreError>,
) -> Result<(), LogError> {
    let mut txn = store.begin().map_err(LogError::Transaction)?;
    match stage(&mut txn) {
        Ok(()) => txn.commit().map_err(LogError::Transaction),
        Err(e) => {
            txn.discard();
            Err(LogError::Transaction(e))
        }
    }
}

fn decode_tail(raw: Option<Vec<u8>>) -> Result<Index, LogError> {
    match raw {
        Some(raw) => key::decode_marker(&raw),
        None => Ok(EMPTY_INDEX),
    }
}
