use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTableMetadata, TableDefinition};
use tracing::debug;

use crate::error::KVError;
use crate::traits::Storage;

const TABLE: TableDefinition<&str, &str> = TableDefinition::new("location_state");

/// RedbStorage is a Storage implementation backed by redb — a pure-Rust
/// embedded key-value database. Unlike `MemoryStorage`, entries survive a
/// process restart, which is what a native host needs to restore state after
/// the app is relaunched on the same navigation entry.
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(|e| KVError::Storage(e.to_string()))?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let _table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;

        debug!("RedbStorage: opened {:?}", path);
        Ok(Self { db: Arc::new(db) })
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<u64, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        table.len().map_err(|e| KVError::Storage(e.to_string()))
    }
}

impl Storage for RedbStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_string())),
            Ok(None) => Ok(None),
            Err(e) => Err(KVError::Storage(e.to_string())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }
}
