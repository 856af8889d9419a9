use crate::config::PlatformConfig;
use crate::domain::account::{Amount, Balance, UserId};
use crate::domain::assignment::AssignmentId;
use crate::domain::ports::{PaymentGatewayRef, TransactionStoreRef, UserStoreRef};
use crate::domain::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::error::{MarketError, Result};

/// Moves and accounts for the funds tied to an assignment.
///
/// Every movement is recorded as an immutable ledger entry. The ledger
/// guards against a second payout for the same assignment, but it is the
/// lifecycle manager's job to prevent duplicate deposits by checking the
/// assignment's payment status before calling in.
pub struct EscrowLedger {
    transactions: TransactionStoreRef,
    users: UserStoreRef,
    gateway: PaymentGatewayRef,
    fee_rate: rust_decimal::Decimal,
}

impl EscrowLedger {
    pub fn new(
        transactions: TransactionStoreRef,
        users: UserStoreRef,
        gateway: PaymentGatewayRef,
        config: &PlatformConfig,
    ) -> Self {
        Self {
            transactions,
            users,
            gateway,
            fee_rate: config.fee_rate,
        }
    }

    /// Captures the student's budget into escrow.
    ///
    /// A gateway decline is recorded as a FAILED entry and surfaced as
    /// `PaymentFailed`; the caller must not mark the assignment as escrowed
    /// in that case.
    pub async fn deposit(&self, assignment_id: AssignmentId, amount: Amount) -> Result<Transaction> {
        if let Err(err) = self.gateway.charge(assignment_id, amount).await {
            let failed = Transaction::new(
                assignment_id,
                amount,
                TransactionKind::Payment,
                TransactionStatus::Failed,
            );
            self.transactions.append(failed).await?;
            tracing::warn!(assignment = %assignment_id, error = %err, "deposit declined");
            return Err(MarketError::PaymentFailed(format!(
                "deposit for assignment {assignment_id} declined: {err}"
            )));
        }

        let tx = Transaction::new(
            assignment_id,
            amount,
            TransactionKind::Payment,
            TransactionStatus::Success,
        );
        self.transactions.append(tx.clone()).await?;
        tracing::info!(assignment = %assignment_id, amount = %amount, "escrow deposit recorded");
        Ok(tx)
    }

    /// Releases escrow to the writer, minus the platform fee.
    ///
    /// Fails loudly when the writer account is missing; in that case no
    /// entry is appended and the assignment stays in escrow so the caller
    /// can retry. A second release for the same assignment is refused.
    pub async fn release(
        &self,
        assignment_id: AssignmentId,
        gross: Amount,
        writer_id: UserId,
    ) -> Result<Transaction> {
        let prior = self.transactions.by_assignment(assignment_id).await?;
        if prior.iter().any(Transaction::is_successful_payout) {
            return Err(MarketError::AlreadySettled(format!(
                "assignment {assignment_id} already has a payout"
            )));
        }

        let net = gross.net_of_fee(self.fee_rate)?;
        let balance = self.users.credit(writer_id, net).await?;

        let tx = Transaction::new(
            assignment_id,
            net,
            TransactionKind::Payout,
            TransactionStatus::Success,
        );
        self.transactions.append(tx.clone()).await?;
        tracing::info!(
            assignment = %assignment_id,
            writer = %writer_id,
            net = %net,
            balance = %balance,
            "escrow released"
        );
        Ok(tx)
    }

    /// Appends a compensating refund entry. Used by cancellation; the
    /// original payment entry is left untouched.
    pub async fn refund(&self, assignment_id: AssignmentId, amount: Amount) -> Result<Transaction> {
        let tx = Transaction::new(
            assignment_id,
            amount,
            TransactionKind::Refund,
            TransactionStatus::Success,
        );
        self.transactions.append(tx.clone()).await?;
        tracing::info!(assignment = %assignment_id, amount = %amount, "refund recorded");
        Ok(tx)
    }

    /// Admin ledger query: every entry, optionally narrowed to one
    /// assignment, newest first.
    pub async fn transactions(&self, assignment_id: Option<AssignmentId>) -> Result<Vec<Transaction>> {
        let mut entries = match assignment_id {
            Some(id) => self.transactions.by_assignment(id).await?,
            None => self.transactions.all().await?,
        };
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    pub async fn writer_balance(&self, writer_id: UserId) -> Result<Balance> {
        let user = self
            .users
            .get(writer_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("user {writer_id}")))?;
        Ok(user.balance)
    }
}
