// redb Storage Adapter
//
// Persists the indexed log in a single redb database file.
// All keys share one table: decimal entry keys plus the marker.

use std::fs;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::config::{Durability, LogConfig};
use crate::log::store::{KvStore, KvTransaction, StoreError};

/// File created inside the log directory.
pub const DB_FILE: &str = "log.redb";

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Durable store rooted at a directory.
pub struct RedbStore {
    db: Database,
    durability: redb::Durability,
    path: PathBuf,
}

impl RedbStore {
    /// Open the store under `dir`, creating the directory and database if absent.
    ///
    /// Fails if another handle holds the database open.
    pub fn open(dir: impl AsRef<Path>, config: &LogConfig) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::Open(format!("{}: {e}", dir.display())))?;
        let path = dir.join(DB_FILE);

        let mut builder = Database::builder();
        if let Some(bytes) = config.cache_size_bytes {
            builder.set_cache_size(bytes);
        }
        let db = builder
            .create(&path)
            .map_err(|e| StoreError::Open(format!("{}: {e}", path.display())))?;

        // Make sure the table exists so reads never see TableDoesNotExist.
        let txn = db
            .begin_write()
            .map_err(|e| StoreError::Open(e.to_string()))?;
        txn.open_table(ENTRIES)
            .map_err(|e| StoreError::Open(e.to_string()))?;
        txn.commit().map_err(|e| StoreError::Open(e.to_string()))?;

        let durability = match config.durability {
            Durability::Immediate => redb::Durability::Immediate,
            Durability::Eventual => redb::Durability::Eventual,
        };

        Ok(Self {
            db,
            durability,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for RedbStore {
    type Txn = RedbTransaction;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let table = txn
            .open_table(ENTRIES)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let value = table
            .get(key)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn begin(&self) -> Result<RedbTransaction, StoreError> {
        let mut txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        txn.set_durability(self.durability);
        Ok(RedbTransaction { txn })
    }
}

pub struct RedbTransaction {
    txn: WriteTransaction,
}

impl KvTransaction for RedbTransaction {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut table = self
            .txn
            .open_table(ENTRIES)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        table
            .insert(key, value)
            .map(|_| ())
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        let mut table = self
            .txn
            .open_table(ENTRIES)
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        table
            .remove(key)
            .map(|_| ())
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    fn commit(self) -> Result<(), StoreError> {
        self.txn
            .commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    fn discard(self) {
        if let Err(e) = self.txn.abort() {
            tracing::warn!(error = %e, "failed to abort redb transaction");
        }
    }
}
