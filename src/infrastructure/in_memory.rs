use crate::domain::account::{Amount, Balance, UserAccount, UserId};
use crate::domain::assignment::{Assignment, AssignmentId};
use crate::domain::ports::{AssignmentStore, PaymentGateway, TransactionStore, UserStore};
use crate::domain::transaction::Transaction;
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for assignments.
///
/// Uses `Arc<RwLock<HashMap>>` to allow shared concurrent access. Ideal for
/// testing or single-run batch processing where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryAssignmentStore {
    assignments: Arc<RwLock<HashMap<AssignmentId, Assignment>>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn store(&self, assignment: Assignment) -> Result<()> {
        let mut assignments = self.assignments.write().await;
        assignments.insert(assignment.id, assignment);
        Ok(())
    }

    async fn get(&self, id: AssignmentId) -> Result<Option<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments.get(&id).cloned())
    }

    async fn remove(&self, id: AssignmentId) -> Result<bool> {
        let mut assignments = self.assignments.write().await;
        Ok(assignments.remove(&id).is_some())
    }

    async fn all(&self) -> Result<Vec<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments.values().cloned().collect())
    }
}

/// A thread-safe in-memory append log for ledger entries.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.push(tx);
        Ok(())
    }

    async fn by_assignment(&self, id: AssignmentId) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .iter()
            .filter(|t| t.assignment_id == id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.clone())
    }
}

/// A thread-safe in-memory store for user accounts.
///
/// `credit` performs its read-modify-write under the single write lock, so
/// concurrent releases to the same writer all land.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, UserAccount>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn store(&self, user: UserAccount) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(user.id, user);
        Ok(())
    }

    async fn get(&self, id: UserId) -> Result<Option<UserAccount>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn credit(&self, id: UserId, amount: Amount) -> Result<Balance> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound(format!("user {id}")))?;
        user.credit(amount);
        Ok(user.balance)
    }

    async fn all(&self) -> Result<Vec<UserAccount>> {
        let users = self.users.read().await;
        Ok(users.values().cloned().collect())
    }
}

/// Gateway stand-in that approves every charge. The real collaborator lives
/// outside the core.
pub struct InstantGateway;

#[async_trait]
impl PaymentGateway for InstantGateway {
    async fn charge(&self, _assignment_id: AssignmentId, _amount: Amount) -> Result<()> {
        Ok(())
    }
}
