// Ordered KV Store Abstraction
//
// Defines the contract the indexed log needs from its backing store.
// Implementations may persist to disk, memory, etc.
//
// This module defines *interfaces only*.

/// Errors reported by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open store: {0}")]
    Open(String),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Key-value store the indexed log is persisted on.
///
/// Properties required from implementations:
/// - Point reads observe only committed transactions
/// - Transactions are all-or-nothing
/// - Committed transactions survive a close/reopen cycle
///
/// Dropping the store releases it.
pub trait KvStore: Send + Sync {
    type Txn: KvTransaction;

    /// Read the committed value at `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Start a write transaction.
    fn begin(&self) -> Result<Self::Txn, StoreError>;
}

/// An atomic batch of writes.
///
/// Nothing written through a transaction is visible until `commit`
/// returns `Ok`. Dropping or discarding it applies nothing.
pub trait KvTransaction {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;

    /// Release the transaction without applying it.
    ///
    /// Must be safe after a failed `put` or `delete`.
    fn discard(self);
}
