// This file is part of Hopper.
//
// Hopper is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Hopper is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Hopper.
// If not, see https://www.gnu.org/licenses/.

//! Embedded transactional key-value store.
//!
//! Thin wrapper around a RocksDB [`TransactionDB`]: atomic single-key
//! reads/writes/deletes, multi-key transactions, and ordered prefix scans.
//! One process owns the store at a time; the pool and the reputation tracker
//! share a single handle.

use std::path::Path;

use rocksdb::{Direction, IteratorMode, Options, TransactionDB, TransactionDBOptions};

/// Store result type.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A transaction against the store. Reads see the transaction's own writes.
pub type Txn<'a> = rocksdb::Transaction<'a, TransactionDB>;

/// Store error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying RocksDB failure
    #[error("store backend error: {0}")]
    Backend(#[from] rocksdb::Error),
    /// A stored record failed to decode
    #[error("record decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// A stored record is structurally invalid
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Durable, crash-recoverable key-value store.
pub struct Store {
    db: TransactionDB,
}

impl Store {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let db = TransactionDB::open(&opts, &TransactionDBOptions::default(), path)?;
        Ok(Self { db })
    }

    /// Get the value stored at `key`, if any.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    /// Atomically set `key` to `value`.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        Ok(self.db.put(key, value)?)
    }

    /// Atomically delete `key`. Deleting an absent key is a no-op.
    pub fn delete(&self, key: &[u8]) -> StoreResult<()> {
        Ok(self.db.delete(key)?)
    }

    /// Run `f` inside a transaction. The transaction commits when `f` returns
    /// `Ok` and rolls back when it returns `Err`, so multi-key updates are
    /// all-or-nothing across process restarts.
    pub fn update<T>(&self, f: impl FnOnce(&Txn<'_>) -> StoreResult<T>) -> StoreResult<T> {
        let txn = self.db.transaction();
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                let _ = txn.rollback();
                Err(err)
            }
        }
    }

    /// All key/value pairs whose key starts with `prefix`, in key order,
    /// read within a single snapshot.
    pub fn prefix_scan(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.transaction();
        let mut records = Vec::new();
        for item in txn.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            records.push((key.to_vec(), value.to_vec()));
        }
        Ok(records)
    }

    /// Delete every key starting with `prefix` in one transaction.
    pub fn delete_prefix(&self, prefix: &[u8]) -> StoreResult<()> {
        let keys: Vec<_> = self
            .prefix_scan(prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        self.update(|txn| {
            for key in &keys {
                txn.delete(key)?;
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
