use crate::domain::account::Amount;
use crate::domain::assignment::AssignmentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Student funds captured into escrow.
    Payment,
    /// Net amount released to the writer.
    Payout,
    /// Compensating entry back toward the student.
    Refund,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Payment => "PAYMENT",
            Self::Payout => "PAYOUT",
            Self::Refund => "REFUND",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// An immutable ledger entry.
///
/// The ledger is append-only: entries are never edited or removed, and
/// corrections happen through new compensating entries. Payout entries store
/// the computed net amount, so a later fee-rate change never rewrites
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub assignment_id: AssignmentId,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        assignment_id: AssignmentId,
        amount: Amount,
        kind: TransactionKind,
        status: TransactionStatus,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            assignment_id,
            amount,
            kind,
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn is_successful_payout(&self) -> bool {
        self.kind == TransactionKind::Payout && self.status == TransactionStatus::Success
    }
}
