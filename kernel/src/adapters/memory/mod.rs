// In-Memory Storage Adapter
//
// Non-durable store for tests and dry runs. Clones share data, so
// dropping one handle and wrapping a clone stands in for a reopen.
// A FaultPlan forces backend failures at chosen points.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::log::store::{KvStore, KvTransaction, StoreError};

/// Failures to inject into the next operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pub fail_begin: bool,
    pub fail_commit: bool,
    /// Fail the write at this position within a transaction (0-based).
    pub fail_write_at: Option<usize>,
}

#[derive(Debug, Default)]
struct Shared {
    data: BTreeMap<String, Vec<u8>>,
    faults: FaultPlan,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Mutex<Shared>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_faults(&self, faults: FaultPlan) {
        self.shared.lock().faults = faults;
    }

    pub fn clear_faults(&self) {
        self.set_faults(FaultPlan::default());
    }

    /// Committed keys in store order.
    pub fn keys(&self) -> Vec<String> {
        self.shared.lock().data.keys().cloned().collect()
    }
}

impl KvStore for InMemoryStore {
    type Txn = InMemoryTransaction;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.shared.lock().data.get(key).cloned())
    }

    fn begin(&self) -> Result<InMemoryTransaction, StoreError> {
        if self.shared.lock().faults.fail_begin {
            return Err(StoreError::Transaction("injected begin failure".into()));
        }
        Ok(InMemoryTransaction {
            shared: Arc::clone(&self.shared),
            ops: Vec::new(),
        })
    }
}

#[derive(Debug)]
enum Op {
    Put(String, Vec<u8>),
    Delete(String),
}

/// Buffers writes until commit.
#[derive(Debug)]
pub struct InMemoryTransaction {
    shared: Arc<Mutex<Shared>>,
    ops: Vec<Op>,
}

impl InMemoryTransaction {
    fn push(&mut self, op: Op) -> Result<(), StoreError> {
        if self.shared.lock().faults.fail_write_at == Some(self.ops.len()) {
            return Err(StoreError::Transaction(format!(
                "injected write failure at op {}",
                self.ops.len()
            )));
        }
        self.ops.push(op);
        Ok(())
    }
}

impl KvTransaction for InMemoryTransaction {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.push(Op::Put(key.to_owned(), value.to_vec()))
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.push(Op::Delete(key.to_owned()))
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut shared = self.shared.lock();
        if shared.faults.fail_commit {
            return Err(StoreError::Transaction("injected commit failure".into()));
        }
        for op in self.ops {
            match op {
                Op::Put(key, value) => {
                    shared.data.insert(key, value);
                }
                Op::Delete(key) => {
                    shared.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn discard(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_invisible_until_commit() {
        let store = InMemoryStore::new();
        let mut txn = store.begin().unwrap();
        txn.put("0", b"a").unwrap();
        assert_eq!(store.get("0").unwrap(), None);

        txn.commit().unwrap();
        assert_eq!(store.get("0").unwrap(), Some(b"a".to_vec()));
    }

    #[test]
    fn clones_share_committed_data() {
        let store = InMemoryStore::new();
        let reopened = store.clone();

        let mut txn = store.begin().unwrap();
        txn.put("k", b"v").unwrap();
        txn.delete("missing").unwrap();
        txn.commit().unwrap();
        drop(store);

        assert_eq!(reopened.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn failed_commit_applies_nothing() {
        let store = InMemoryStore::new();
        store.set_faults(FaultPlan {
            fail_commit: true,
            ..FaultPlan::default()
        });

        let mut txn = store.begin().unwrap();
        txn.put("0", b"a").unwrap();
        txn.put("1", b"b").unwrap();
        assert!(matches!(txn.commit(), Err(StoreError::Transaction(_))));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn injected_write_and_begin_failures() {
        let store = InMemoryStore::new();
        store.set_faults(FaultPlan {
            fail_write_at: Some(1),
            ..FaultPlan::default()
        });
        let mut txn = store.begin().unwrap();
        txn.put("0", b"a").unwrap();
        assert!(txn.put("1", b"b").is_err());
        txn.discard();
        assert!(store.keys().is_empty());

        store.set_faults(FaultPlan {
            fail_begin: true,
            ..FaultPlan::default()
        });
        assert!(store.begin().is_err());

        store.clear_faults();
        assert!(store.begin().is_ok());
    }
}
