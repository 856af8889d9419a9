use crate::domain::account::{Amount, Balance, UserAccount, UserId};
use crate::domain::assignment::{Assignment, AssignmentId};
use crate::domain::ports::{AssignmentStore, TransactionStore, UserStore};
use crate::domain::transaction::Transaction;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing assignments.
pub const CF_ASSIGNMENTS: &str = "assignments";
/// Column Family for the ledger append log.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for user accounts and balances.
pub const CF_USERS: &str = "users";

/// A persistent store implementation using RocksDB.
///
/// Handles storage for assignments, ledger entries, and user accounts in
/// separate Column Families. This struct is thread-safe (`Clone` shares the
/// underlying `Arc<DB>`); balance credits are serialized through a dedicated
/// mutex so concurrent releases to the same writer all land.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    credit_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_ASSIGNMENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_USERS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            credit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            MarketError::internal(std::io::Error::other(format!(
                "column family {name} not found"
            )))
        })
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key, bytes)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl AssignmentStore for RocksDbStore {
    async fn store(&self, assignment: Assignment) -> Result<()> {
        self.put(CF_ASSIGNMENTS, assignment.id.0.as_bytes(), &assignment)
    }

    async fn get(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        self.fetch(CF_ASSIGNMENTS, id.0.as_bytes())
    }

    async fn remove(&self, id: AssignmentId) -> Result<bool> {
        let cf = self.cf(CF_ASSIGNMENTS)?;
        let existed = self.db.get_pinned_cf(cf, id.0.as_bytes())?.is_some();
        if existed {
            self.db.delete_cf(cf, id.0.as_bytes())?;
        }
        Ok(existed)
    }

    async fn all(&self) -> Result<Vec<Assignment>> {
        self.scan(CF_ASSIGNMENTS)
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn append(&self, tx: Transaction) -> Result<()> {
        self.put(CF_TRANSACTIONS, tx.id.0.as_bytes(), &tx)
    }

    async fn by_assignment(&self, id: AssignmentId) -> Result<Vec<Transaction>> {
        let all: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        Ok(all.into_iter().filter(|t| t.assignment_id == id).collect())
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        self.scan(CF_TRANSACTIONS)
    }
}

#[async_trait]
impl UserStore for RocksDbStore {
    async fn store(&self, user: UserAccount) -> Result<()> {
        self.put(CF_USERS, user.id.0.as_bytes(), &user)
    }

    async fn get(&self, id: UserId) -> Result<Option<UserAccount>> {
        self.fetch(CF_USERS, id.0.as_bytes())
    }

    async fn credit(&self, id: UserId, amount: Amount) -> Result<Balance> {
        let _guard = self.credit_lock.lock().await;
        let mut user: UserAccount = self
            .fetch(CF_USERS, id.0.as_bytes())?
            .ok_or_else(|| MarketError::NotFound(format!("user {id}")))?;
        user.credit(amount);
        self.put(CF_USERS, id.0.as_bytes(), &user)?;
        Ok(user.balance)
    }

    async fn all(&self) -> Result<Vec<UserAccount>> {
        self.scan(CF_USERS)
    }
}
