use crate::domain::account::{Amount, Balance, UserAccount, UserId};
use crate::domain::assignment::{Assignment, AssignmentId};
use crate::domain::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type AssignmentStoreRef = Arc<dyn AssignmentStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type UserStoreRef = Arc<dyn UserStore>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn store(&self, assignment: Assignment) -> Result<()>;
    async fn get(&self, id: AssignmentId) -> Result<Option<Assignment>>;
    /// Returns whether a record was actually removed.
    async fn remove(&self, id: AssignmentId) -> Result<bool>;
    async fn all(&self) -> Result<Vec<Assignment>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Appends a ledger entry. Entries are never updated or deleted.
    async fn append(&self, tx: Transaction) -> Result<()>;
    async fn by_assignment(&self, id: AssignmentId) -> Result<Vec<Transaction>>;
    async fn all(&self) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn store(&self, user: UserAccount) -> Result<()>;
    async fn get(&self, id: UserId) -> Result<Option<UserAccount>>;
    /// Atomically adds a payout to the user's balance and returns the new
    /// value. Concurrent credits to the same user must all land.
    async fn credit(&self, id: UserId, amount: Amount) -> Result<Balance>;
    async fn all(&self) -> Result<Vec<UserAccount>>;
}

/// External payment collaborator. The real implementation wraps a card
/// processor; the core only needs an accept/decline answer.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, assignment_id: AssignmentId, amount: Amount) -> Result<()>;
}
